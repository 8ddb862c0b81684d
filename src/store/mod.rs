// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-disk item directories.
//!
//! Each surviving item owns `<output>/<item path>/` containing
//! `description`, `authors`, `item.json`, the `updated` sentinel and its
//! media files.

mod item;

pub use item::{ItemOutcome, ItemRecord, ItemWriter, MediaFailure, MediaRecord};

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::StoreError;

pub const DESCRIPTION_FILE: &str = "description";
pub const AUTHORS_FILE: &str = "authors";
pub const SENTINEL_FILE: &str = "updated";
pub const RECORD_FILE: &str = "item.json";

/// Filesystem access for item directories; in dry-run mode every mutation
/// is a successful no-op
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    dry_run: bool,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            dry_run,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Directory for an item path relative to the output root
    pub fn item_dir(&self, item_path: &str) -> PathBuf {
        self.root.join(item_path)
    }

    /// Create a directory and its parents, ignoring "already exists"
    pub fn ensure_dir(&self, path: &Path) -> Result<(), StoreError> {
        if self.dry_run {
            return Ok(());
        }
        std::fs::create_dir_all(path).map_err(|e| StoreError::CreateDirectoryFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Whether `path` exists and holds exactly `content`
    pub fn file_matches(&self, path: &Path, content: &str) -> Result<bool, StoreError> {
        match std::fs::read(path) {
            Ok(existing) => Ok(existing == content.as_bytes()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Replace the file at `path` with `content`
    pub fn write_string(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        if self.dry_run {
            return Ok(());
        }
        std::fs::write(path, content).map_err(|e| StoreError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write `data` as pretty-printed JSON
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_string(path, &json)
    }

    /// Remove leftover `.partial` files from interrupted downloads
    pub fn clean_partials(&self, dir: &Path) -> Result<usize, StoreError> {
        if self.dry_run {
            return Ok(0);
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    path: dir.to_path_buf(),
                    source: e,
                });
            }
        };

        let mut cleaned = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".partial"));

            if is_partial && std::fs::remove_file(&path).is_ok() {
                cleaned += 1;
            }
        }

        Ok(cleaned)
    }
}

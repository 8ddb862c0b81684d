use std::collections::HashSet;

use caseless::Caseless;
use unicode_normalization::UnicodeNormalization;

/// Names already accepted during one run.
///
/// Comparison trims surrounding whitespace, applies NFC composition and
/// full Unicode case folding. Nothing is persisted between runs.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name`, returning true if an equivalent name was seen before
    pub fn seen(&mut self, name: &str) -> bool {
        !self.seen.insert(dedup_key(name))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Canonical comparison key for a name
fn dedup_key(name: &str) -> String {
    name.trim().nfd().default_case_fold().nfc().collect()
}

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::CommandError;
use crate::hooks::Transform;
use crate::item::Media;
use crate::mime::{FALLBACK_EXTENSION, MimeRegistry, essence, resolve_extension};

/// Name used when a URL has no usable last path segment
const FALLBACK_STEM: &str = "media";

/// Last path segment of a URL with any query and fragment dropped
pub fn url_filename(url: &str) -> String {
    let url = url.split(['#', '?']).next().unwrap_or_default();
    let name = url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();

    if name.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        name.to_string()
    }
}

/// Whether a file name already carries an extension
fn has_extension(name: &str) -> bool {
    Path::new(name).extension().is_some()
}

/// Registry extension for a content type, or the fallback with a warning
fn extension_for(registry: &dyn MimeRegistry, content_type: &str, item_name: &str) -> String {
    match resolve_extension(registry, content_type) {
        Some(ext) => ext.to_string(),
        None => {
            warn!(
                item = item_name,
                content_type = essence(content_type),
                "unexpected content type"
            );
            FALLBACK_EXTENSION.to_string()
        }
    }
}

/// Build the on-disk file name for one media reference.
///
/// Enclosures use their URL basename and only gain an extension when they
/// have none; videos use their title plus the format's extension.
pub async fn media_file_name(
    media: &Media,
    item_name: &str,
    sanitize: &dyn Transform,
    registry: &dyn MimeRegistry,
) -> Result<String, CommandError> {
    match media {
        Media::Enclosure(enclosure) => {
            let name = sanitize
                .transform(&url_filename(&enclosure.url), &[])
                .await?;
            if has_extension(&name) {
                Ok(name)
            } else {
                let ext = extension_for(registry, &enclosure.mime_type, item_name);
                Ok(format!("{name}.{ext}"))
            }
        }
        Media::Video { video, format } => {
            let name = sanitize.transform(&video.title, &[]).await?;
            let ext = extension_for(registry, &format.mime_type, item_name);
            Ok(format!("{name}.{ext}"))
        }
    }
}

/// Join a media file name onto its item directory, flattening separators
pub fn media_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name.replace('/', " "))
}

/// Temporary path a download is streamed to before verification
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

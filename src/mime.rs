use std::collections::HashMap;

/// Extension used when a content type has no known mapping
pub const FALLBACK_EXTENSION: &str = "bin";

/// Lookup from MIME type to preferred file extension
pub trait MimeRegistry: Send + Sync {
    /// Return the extension (without dot) for a bare MIME type
    fn extension(&self, mime_type: &str) -> Option<&str>;
}

/// Built-in table of common media and document types
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    exts: HashMap<String, String>,
}

const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/mp4", "m4a"),
    ("audio/m4a", "m4a"),
    ("audio/x-m4a", "m4a"),
    ("audio/aac", "aac"),
    ("audio/ogg", "ogg"),
    ("audio/opus", "opus"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("audio/flac", "flac"),
    ("audio/x-flac", "flac"),
    ("audio/webm", "weba"),
    ("video/mp4", "mp4"),
    ("video/x-m4v", "m4v"),
    ("video/webm", "webm"),
    ("video/3gpp", "3gp"),
    ("video/quicktime", "mov"),
    ("video/x-matroska", "mkv"),
    ("video/ogg", "ogv"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
    ("application/epub+zip", "epub"),
    ("application/zip", "zip"),
    ("text/plain", "txt"),
    ("text/html", "html"),
];

impl StaticRegistry {
    /// A registry with no entries
    pub fn empty() -> Self {
        Self {
            exts: HashMap::new(),
        }
    }

    /// Add or override the preferred extension for a type
    pub fn with(mut self, mime_type: &str, ext: &str) -> Self {
        self.exts
            .insert(mime_type.to_ascii_lowercase(), ext.to_string());
        self
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        DEFAULT_TYPES
            .iter()
            .fold(Self::empty(), |registry, (mime, ext)| registry.with(mime, ext))
    }
}

impl MimeRegistry for StaticRegistry {
    fn extension(&self, mime_type: &str) -> Option<&str> {
        self.exts
            .get(&mime_type.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Drop parameter data (everything from the first `;`) from a content type
pub fn essence(content_type: &str) -> &str {
    content_type
        .split_once(';')
        .map_or(content_type, |(essence, _)| essence)
        .trim()
}

/// Resolve a content type to an extension, ignoring parameters
pub fn resolve_extension<'a>(registry: &'a dyn MimeRegistry, content_type: &str) -> Option<&'a str> {
    registry.extension(essence(content_type))
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running a user-supplied shell hook
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to execute `{expr}`: {source}")]
    SpawnFailed {
        expr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{expr}` returned {code}: {stderr}")]
    Failed {
        expr: String,
        code: i32,
        stderr: String,
    },
}

/// Errors that can occur when fetching or parsing feed documents
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document is neither RSS ({rss}) nor Atom ({atom})")]
    ParseFailed {
        rss: rss::Error,
        atom: atom_syndication::Error,
    },
}

/// Errors reported by a video platform client
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Video {id} is not playable: {reason}")]
    NotPlayable { id: String, reason: String },

    #[error("Failed to resolve video {reference}: {reason}")]
    ResolveFailed { reference: String, reason: String },

    #[error("Failed to open stream for {id}: {reason}")]
    StreamFailed { id: String, reason: String },
}

impl VideoError {
    /// Whether the platform reported the video as currently unplayable
    pub fn is_not_playable(&self) -> bool {
        matches!(self, VideoError::NotPlayable { .. })
    }
}

/// Errors that can occur while downloading a single media file.
///
/// These are scoped to one item and never abort a run.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Zero content-length for {source_name}, possibly rate limited")]
    ZeroLength { source_name: String },

    #[error("Size mismatch for {path}: content-length={expected} written={written}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        written: u64,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {source_name}: {reason}")]
    StreamFailed { source_name: String, reason: String },

    #[error("Video stream unavailable: {0}")]
    Video(#[from] VideoError),

    #[error("Download cancelled")]
    Cancelled,
}

/// Errors that can occur when reading or writing item directories
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize item record: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Errors from the filter/transform stages. These indicate misconfiguration.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Error normalizing item name: {0}")]
    Normalize(#[source] CommandError),

    #[error("Error during positive filter: {0}")]
    Include(#[source] CommandError),

    #[error("Error during negative filter: {0}")]
    Exclude(#[source] CommandError),

    #[error("Error formatting item path: {0}")]
    ItemPath(#[source] CommandError),

    #[error("Error sanitizing path: {0}")]
    Sanitize(#[source] CommandError),
}

/// Top-level errors for a sync run. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Error getting video: {0}")]
    Video(#[from] VideoError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync cancelled")]
    Cancelled,
}

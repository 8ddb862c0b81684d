pub mod dedup;
pub mod download;
pub mod error;
pub mod feed;
pub mod hooks;
pub mod http;
pub mod item;
pub mod mime;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod sync;
pub mod throttle;
pub mod video;

// Re-export main types for convenience
pub use error::{
    CommandError, DownloadError, FeedError, PipelineError, StoreError, SyncError, VideoError,
};
pub use feed::{FeedDocument, FeedEntry, is_url, load_feed, parse_feed};
pub use hooks::{HookConfig, Hooks, Predicate, ShellCommand, Transform};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use item::{Item, Media, Source};
pub use mime::{MimeRegistry, StaticRegistry};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, SkipReason,
};
pub use store::MediaFailure;
pub use sync::{SyncContext, SyncOptions, SyncResult, load_sources, process_feeds, sync_feeds};
pub use video::{DisabledVideoClient, VideoClient, is_playlist_url};

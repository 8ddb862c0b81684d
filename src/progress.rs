use std::sync::Arc;

/// Why the pipeline dropped an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An equivalent name was already accepted this run
    Duplicate,
    /// The positive filter did not match
    NotIncluded,
    /// The negative filter matched
    Excluded,
    /// Formatting and sanitizing produced an empty directory name
    EmptyPath,
}

/// Events emitted during synchronization for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A feed source is being fetched or read
    FetchingFeed { source: String },

    /// All sources were converted to items
    ItemsUnified { total_items: usize },

    /// An item was dropped by the pipeline
    ItemSkipped { name: String, reason: SkipReason },

    /// An item's sentinel matched; nothing was written
    ItemUpToDate { name: String },

    /// An item passed the pipeline and is being written
    ItemStarting {
        /// Survival index of this item
        index: usize,
        name: String,
        media_count: usize,
    },

    /// A media download is starting
    DownloadStarting {
        item_name: String,
        file_name: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        file_name: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A media download completed and was verified
    DownloadCompleted {
        file_name: String,
        bytes_downloaded: u64,
    },

    /// A media download failed; the item will be retried next run
    DownloadFailed { file_name: String, error: String },

    /// An item finished; `complete` is false when any media failed
    ItemFinished { name: String, complete: bool },

    /// Sync operation completed
    SyncCompleted {
        written_count: usize,
        up_to_date_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during synchronization.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::FetchingFeed {
            source: "https://example.com/feed.xml".to_string(),
        });
        reporter.report(ProgressEvent::ItemSkipped {
            name: "Episode 1".to_string(),
            reason: SkipReason::Duplicate,
        });
        reporter.report(ProgressEvent::DownloadFailed {
            file_name: "ep.mp3".to_string(),
            error: "Connection timeout".to_string(),
        });
        reporter.report(ProgressEvent::SyncCompleted {
            written_count: 4,
            up_to_date_count: 5,
            skipped_count: 1,
            failed_count: 0,
        });
    }

    #[test]
    fn recording_reporter_collects_skips() {
        let reporter = RecordingReporter::default();
        reporter.report(ProgressEvent::ItemUpToDate {
            name: "a".to_string(),
        });
        reporter.report(ProgressEvent::ItemSkipped {
            name: "b".to_string(),
            reason: SkipReason::Excluded,
        });

        assert_eq!(
            reporter.skipped(),
            vec![("b".to_string(), SkipReason::Excluded)]
        );
    }
}

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::download::{Downloader, media_file_name, media_path};
use crate::error::{DownloadError, PipelineError, SyncError};
use crate::hooks::Transform;
use crate::item::{Item, Media};
use crate::mime::MimeRegistry;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::throttle::Throttle;

use super::{AUTHORS_FILE, DESCRIPTION_FILE, RECORD_FILE, SENTINEL_FILE, Store};

/// Serializable summary of an item, written to `item.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub uid: String,
    pub name: String,
    pub authors: String,
    pub feed_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    pub media: Vec<MediaRecord>,
    pub synced_at: String,
}

/// One media reference as recorded in `item.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaRecord {
    Enclosure {
        url: String,
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        length: Option<u64>,
        file_name: String,
    },
    Video {
        id: String,
        title: String,
        itag: u32,
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        quality_label: Option<String>,
        file_name: String,
    },
}

impl ItemRecord {
    /// Build a record from an item and the file names chosen for its media
    pub fn from_item(item: &Item, file_names: &[String]) -> Self {
        let media = item
            .media
            .iter()
            .zip(file_names)
            .map(|(media, file_name)| match media {
                Media::Enclosure(enclosure) => MediaRecord::Enclosure {
                    url: enclosure.url.clone(),
                    mime_type: enclosure.mime_type.clone(),
                    length: enclosure.length,
                    file_name: file_name.clone(),
                },
                Media::Video { video, format } => MediaRecord::Video {
                    id: video.id.clone(),
                    title: video.title.clone(),
                    itag: format.itag,
                    mime_type: format.mime_type.clone(),
                    quality_label: format.quality_label.clone(),
                    file_name: file_name.clone(),
                },
            })
            .collect();

        Self {
            uid: item.uid.clone(),
            name: item.name.clone(),
            authors: item.authors.clone(),
            feed_name: item.feed_name.clone(),
            description: item.description.clone(),
            published: item.published.map(|dt| dt.to_rfc3339()),
            updated: item.updated.map(|dt| dt.to_rfc3339()),
            media,
            synced_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A media file that could not be downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFailure {
    pub item_name: String,
    pub file_name: String,
    pub error: String,
}

/// Terminal state of one item pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The sentinel matched; nothing was written
    UpToDate,
    /// Every media file was written and the sentinel updated
    Complete { bytes: u64 },
    /// Some media failed; the sentinel was left alone so the next run retries
    PartialFailure { failures: Vec<MediaFailure> },
}

/// Writes items into their directories.
///
/// The `updated` sentinel is always the last file written, so an
/// interrupted pass leaves the item eligible for a retry.
pub struct ItemWriter<'a> {
    store: &'a Store,
    downloader: &'a Downloader<'a>,
    sanitize: &'a dyn Transform,
    registry: &'a dyn MimeRegistry,
    throttle: &'a dyn Throttle,
    reporter: SharedProgressReporter,
    cancel: CancellationToken,
}

impl<'a> ItemWriter<'a> {
    pub fn new(
        store: &'a Store,
        downloader: &'a Downloader<'a>,
        sanitize: &'a dyn Transform,
        registry: &'a dyn MimeRegistry,
        throttle: &'a dyn Throttle,
        reporter: SharedProgressReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            downloader,
            sanitize,
            registry,
            throttle,
            reporter,
            cancel,
        }
    }

    /// Bring `<root>/<item_path>` up to date with `item`.
    ///
    /// Download failures are collected into the outcome. Sanitize hook
    /// errors, cancellation and filesystem errors are returned.
    pub async fn write(&self, item: &Item, item_path: &str) -> Result<ItemOutcome, SyncError> {
        let dir = self.store.item_dir(item_path);
        self.store.ensure_dir(&dir)?;

        let sentinel = dir.join(SENTINEL_FILE);
        let freshness = item.freshness();
        if self.store.file_matches(&sentinel, &freshness)? {
            debug!(item = %item.name, "up to date");
            return Ok(ItemOutcome::UpToDate);
        }

        let cleaned = self.store.clean_partials(&dir)?;
        if cleaned > 0 {
            debug!(item = %item.name, cleaned, "removed stale partial downloads");
        }

        let mut targets: Vec<PathBuf> = Vec::with_capacity(item.media.len());
        for media in &item.media {
            let name = media_file_name(media, &item.name, self.sanitize, self.registry)
                .await
                .map_err(PipelineError::Sanitize)?;
            targets.push(media_path(&dir, &name));
        }
        let file_names: Vec<String> = targets
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            })
            .collect();

        self.store
            .write_string(&dir.join(DESCRIPTION_FILE), &item.description)?;
        self.store
            .write_string(&dir.join(AUTHORS_FILE), &item.authors)?;
        self.store.write_json(
            &dir.join(RECORD_FILE),
            &ItemRecord::from_item(item, &file_names),
        )?;

        let mut failures = Vec::new();
        let mut bytes = 0;

        for ((media, path), file_name) in item.media.iter().zip(&targets).zip(&file_names) {
            match self.downloader.download(media, &item.name, path).await {
                Ok(written) => bytes += written,
                Err(DownloadError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    error!(item = %item.name, file = %file_name, error = %e, "download failed");
                    self.reporter.report(ProgressEvent::DownloadFailed {
                        file_name: file_name.clone(),
                        error: e.to_string(),
                    });
                    failures.push(MediaFailure {
                        item_name: item.name.clone(),
                        file_name: file_name.clone(),
                        error: e.to_string(),
                    });
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = self.throttle.pause() => {}
            }
        }

        if !failures.is_empty() {
            return Ok(ItemOutcome::PartialFailure { failures });
        }

        self.store.write_string(&sentinel, &freshness)?;
        Ok(ItemOutcome::Complete { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::tempdir;

    use crate::download::partial_path;
    use crate::download::testing::{Canned, MockHttpClient};
    use crate::error::CommandError;
    use crate::feed::Enclosure;
    use crate::hooks::Identity;
    use crate::item::RawRecord;
    use crate::mime::StaticRegistry;
    use crate::progress::NoopReporter;
    use crate::throttle::NoThrottle;
    use crate::video::DisabledVideoClient;

    struct FailingSanitize;

    /// Counts pauses instead of sleeping
    #[derive(Default)]
    struct CountingThrottle(AtomicUsize);

    impl CountingThrottle {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Throttle for CountingThrottle {
        async fn pause(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transform for FailingSanitize {
        async fn transform(
            &self,
            _input: &str,
            _env: &[(&str, &str)],
        ) -> Result<String, CommandError> {
            Err(CommandError::Failed {
                expr: "sanitize".to_string(),
                code: 2,
                stderr: "bad expression".to_string(),
            })
        }
    }

    fn enclosure(url: &str) -> Media {
        Media::Enclosure(Enclosure {
            url: url.to_string(),
            mime_type: "audio/mpeg".to_string(),
            length: None,
        })
    }

    fn make_item(media: Vec<Media>) -> Item {
        Item {
            uid: "guid-1".to_string(),
            name: "Episode".to_string(),
            authors: "Jane (jane@example.com)".to_string(),
            feed_name: "Feed".to_string(),
            description: "About things".to_string(),
            published: None,
            updated: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
            media,
            raw: RawRecord::Entry(Box::default()),
        }
    }

    async fn write_item(
        http: &MockHttpClient,
        store: &Store,
        sanitize: &dyn Transform,
        cancel: CancellationToken,
        item: &Item,
    ) -> Result<ItemOutcome, SyncError> {
        write_item_throttled(http, store, sanitize, &NoThrottle, cancel, item).await
    }

    async fn write_item_throttled(
        http: &MockHttpClient,
        store: &Store,
        sanitize: &dyn Transform,
        throttle: &dyn Throttle,
        cancel: CancellationToken,
        item: &Item,
    ) -> Result<ItemOutcome, SyncError> {
        let downloader = Downloader::new(
            http,
            &DisabledVideoClient,
            NoopReporter::shared(),
            cancel.clone(),
        )
        .dry_run(store.is_dry_run());
        let registry = StaticRegistry::default();
        let writer = ItemWriter::new(
            store,
            &downloader,
            sanitize,
            &registry,
            throttle,
            NoopReporter::shared(),
            cancel,
        );
        writer.write(item, "Episode").await
    }

    #[tokio::test]
    async fn complete_item_writes_everything_then_converges() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let http = MockHttpClient::default()
            .with("https://example.com/a.mp3", Canned::ok(b"aaaa"))
            .with("https://example.com/b", Canned::ok(b"bb"));
        let item = make_item(vec![
            enclosure("https://example.com/a.mp3"),
            enclosure("https://example.com/b"),
        ]);

        let outcome = write_item(&http, &store, &Identity, CancellationToken::new(), &item)
            .await
            .unwrap();
        assert_eq!(outcome, ItemOutcome::Complete { bytes: 6 });

        let item_dir = dir.path().join("Episode");
        assert_eq!(std::fs::read(item_dir.join("a.mp3")).unwrap(), b"aaaa");
        assert_eq!(std::fs::read(item_dir.join("b.mp3")).unwrap(), b"bb");
        assert_eq!(
            std::fs::read_to_string(item_dir.join(DESCRIPTION_FILE)).unwrap(),
            "About things"
        );
        assert_eq!(
            std::fs::read_to_string(item_dir.join(AUTHORS_FILE)).unwrap(),
            "Jane (jane@example.com)"
        );
        assert_eq!(
            std::fs::read_to_string(item_dir.join(SENTINEL_FILE)).unwrap(),
            "2024-03-01T08:00:00Z"
        );

        let record: ItemRecord =
            serde_json::from_str(&std::fs::read_to_string(item_dir.join(RECORD_FILE)).unwrap())
                .unwrap();
        assert_eq!(record.uid, "guid-1");
        assert_eq!(record.media.len(), 2);

        let requests = http.request_count();
        let again = write_item(&http, &store, &Identity, CancellationToken::new(), &item)
            .await
            .unwrap();
        assert_eq!(again, ItemOutcome::UpToDate);
        assert_eq!(http.request_count(), requests);
    }

    #[tokio::test]
    async fn failed_media_does_not_stop_the_rest() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let http = MockHttpClient::default()
            .with("https://example.com/1.mp3", Canned::ok(b"one"))
            .with("https://example.com/3.mp3", Canned::ok(b"three"));
        let item = make_item(vec![
            enclosure("https://example.com/1.mp3"),
            enclosure("https://example.com/2.mp3"),
            enclosure("https://example.com/3.mp3"),
        ]);

        let outcome = write_item(&http, &store, &Identity, CancellationToken::new(), &item)
            .await
            .unwrap();

        match outcome {
            ItemOutcome::PartialFailure { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].file_name, "2.mp3");
            }
            other => panic!("Expected PartialFailure, got {other:?}"),
        }

        let item_dir = dir.path().join("Episode");
        assert!(item_dir.join("1.mp3").exists());
        assert!(!item_dir.join("2.mp3").exists());
        assert!(item_dir.join("3.mp3").exists());
        assert!(item_dir.join(DESCRIPTION_FILE).exists());
        assert!(item_dir.join(AUTHORS_FILE).exists());
        assert!(!item_dir.join(SENTINEL_FILE).exists());
        assert_eq!(http.request_count(), 3);
    }

    #[tokio::test]
    async fn throttle_pauses_after_every_attempt() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let http = MockHttpClient::default()
            .with("https://example.com/1.mp3", Canned::ok(b"one"))
            .with("https://example.com/3.mp3", Canned::ok(b"three"));
        let throttle = CountingThrottle::default();
        let item = make_item(vec![
            enclosure("https://example.com/1.mp3"),
            enclosure("https://example.com/2.mp3"),
            enclosure("https://example.com/3.mp3"),
        ]);

        let outcome = write_item_throttled(
            &http,
            &store,
            &Identity,
            &throttle,
            CancellationToken::new(),
            &item,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ItemOutcome::PartialFailure { .. }));
        assert_eq!(throttle.count(), 3);
    }

    #[tokio::test]
    async fn up_to_date_item_is_not_throttled() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let http =
            MockHttpClient::default().with("https://example.com/a.mp3", Canned::ok(b"aaaa"));
        let item = make_item(vec![enclosure("https://example.com/a.mp3")]);
        write_item(&http, &store, &Identity, CancellationToken::new(), &item)
            .await
            .unwrap();

        let throttle = CountingThrottle::default();
        let outcome = write_item_throttled(
            &http,
            &store,
            &Identity,
            &throttle,
            CancellationToken::new(),
            &item,
        )
        .await
        .unwrap();

        assert_eq!(outcome, ItemOutcome::UpToDate);
        assert_eq!(throttle.count(), 0);
    }

    #[tokio::test]
    async fn changed_timestamp_rewrites_item() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let http =
            MockHttpClient::default().with("https://example.com/a.mp3", Canned::ok(b"aaaa"));
        let mut item = make_item(vec![enclosure("https://example.com/a.mp3")]);

        write_item(&http, &store, &Identity, CancellationToken::new(), &item)
            .await
            .unwrap();

        item.updated = Some(Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap());
        let outcome = write_item(&http, &store, &Identity, CancellationToken::new(), &item)
            .await
            .unwrap();

        assert_eq!(outcome, ItemOutcome::Complete { bytes: 4 });
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Episode").join(SENTINEL_FILE)).unwrap(),
            "2024-04-01T08:00:00Z"
        );
    }

    #[tokio::test]
    async fn dry_run_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), true);
        let http =
            MockHttpClient::default().with("https://example.com/a.mp3", Canned::ok(b"aaaa"));
        let item = make_item(vec![enclosure("https://example.com/a.mp3")]);

        let outcome = write_item(&http, &store, &Identity, CancellationToken::new(), &item)
            .await
            .unwrap();

        assert_eq!(outcome, ItemOutcome::Complete { bytes: 4 });
        assert!(!dir.path().join("Episode").exists());
    }

    #[tokio::test]
    async fn stale_partials_are_removed() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let item_dir = dir.path().join("Episode");
        std::fs::create_dir_all(&item_dir).unwrap();
        let stale = partial_path(&item_dir.join("old.mp3"));
        std::fs::write(&stale, b"half").unwrap();

        let http = MockHttpClient::default();
        write_item(
            &http,
            &store,
            &Identity,
            CancellationToken::new(),
            &make_item(vec![]),
        )
        .await
        .unwrap();

        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn sanitize_errors_abort() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let http = MockHttpClient::default();
        let item = make_item(vec![enclosure("https://example.com/a.mp3")]);

        let result =
            write_item(&http, &store, &FailingSanitize, CancellationToken::new(), &item).await;

        assert!(matches!(
            result,
            Err(SyncError::Pipeline(PipelineError::Sanitize(_)))
        ));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_skips_the_sentinel() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), false);
        let http =
            MockHttpClient::default().with("https://example.com/a.mp3", Canned::ok(b"aaaa"));
        let item = make_item(vec![enclosure("https://example.com/a.mp3")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = write_item(&http, &store, &Identity, cancel, &item).await;

        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(!dir.path().join("Episode").join(SENTINEL_FILE).exists());
    }
}

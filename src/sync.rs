// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::download::Downloader;
use crate::error::SyncError;
use crate::feed::load_feed;
use crate::hooks::Hooks;
use crate::http::HttpClient;
use crate::item::{Source, sort_items, unify};
use crate::mime::MimeRegistry;
use crate::pipeline::{Decision, Pipeline};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::store::{ItemOutcome, ItemWriter, MediaFailure, Store};
use crate::throttle::{NoThrottle, RandomThrottle, Throttle};
use crate::video::{VideoClient, is_playlist_url};

/// Options for feed synchronization
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Run every decision without touching the filesystem
    pub dry_run: bool,
    /// Pause a random 0.5 to 10 seconds after every media download
    pub rate_limit: bool,
}

/// Result of a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Items whose media were all written and whose sentinel was updated
    pub written: usize,
    /// Items whose sentinel already matched
    pub up_to_date: usize,
    /// Items dropped by dedup or filters
    pub skipped: usize,
    /// Items left for the next run because something failed
    pub partial: usize,
    /// Details of every failed media download
    pub failed_media: Vec<MediaFailure>,
}

/// Collaborators shared by every stage of a run
pub struct SyncContext<'a> {
    pub http: &'a dyn HttpClient,
    pub video: &'a dyn VideoClient,
    pub hooks: &'a Hooks,
    pub registry: &'a dyn MimeRegistry,
    pub reporter: SharedProgressReporter,
    /// Cancelled on interrupt; in-flight work stops at the next await
    pub cancel: CancellationToken,
}

/// Fetch or read every source.
///
/// Playlist URLs on the video platform are resolved through the video
/// client; everything else is loaded and parsed as a feed.
pub async fn load_sources(
    ctx: &SyncContext<'_>,
    feed_sources: &[String],
) -> Result<Vec<Source>, SyncError> {
    let mut sources = Vec::with_capacity(feed_sources.len());

    for feed_source in feed_sources {
        ctx.reporter.report(ProgressEvent::FetchingFeed {
            source: feed_source.clone(),
        });

        if is_playlist_url(feed_source) {
            let playlist = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(SyncError::Cancelled),
                playlist = ctx.video.resolve_playlist(feed_source) => playlist,
            };
            let playlist = playlist?;

            debug!(source = %feed_source, entries = playlist.entries.len(), "loaded playlist");
            sources.push(Source::Playlist(playlist));
            continue;
        }

        let feed = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(SyncError::Cancelled),
            feed = load_feed(ctx.http, feed_source) => feed,
        };
        let feed = feed?;

        debug!(source = %feed_source, entries = feed.entries.len(), "loaded feed");
        sources.push(Source::Feed(feed));
    }

    Ok(sources)
}

/// Synchronize already-loaded sources into `output_dir`.
///
/// This is the main entry point of the library. It:
/// 1. Converts every source record into items
/// 2. Sorts them into a stable order
/// 3. Runs each item through the filter and naming pipeline
/// 4. Writes surviving items, one at a time
///
/// Download failures are collected in the result; hook errors, video
/// resolution errors and failure to create `output_dir` abort the run.
pub async fn process_feeds(
    ctx: &SyncContext<'_>,
    sources: &[Source],
    output_dir: &Path,
    options: &SyncOptions,
) -> Result<SyncResult, SyncError> {
    let store = Store::new(output_dir, options.dry_run);
    store.ensure_dir(store.root())?;

    let mut items = unify(ctx.video, sources, &ctx.cancel).await?;
    sort_items(&mut items);

    ctx.reporter.report(ProgressEvent::ItemsUnified {
        total_items: items.len(),
    });

    let throttle: Box<dyn Throttle> = if options.rate_limit {
        Box::new(RandomThrottle::default())
    } else {
        Box::new(NoThrottle)
    };
    let downloader = Downloader::new(
        ctx.http,
        ctx.video,
        ctx.reporter.clone(),
        ctx.cancel.clone(),
    )
    .dry_run(options.dry_run);
    let writer = ItemWriter::new(
        &store,
        &downloader,
        ctx.hooks.sanitize.as_ref(),
        ctx.registry,
        throttle.as_ref(),
        ctx.reporter.clone(),
        ctx.cancel.clone(),
    );

    let mut pipeline = Pipeline::new(ctx.hooks);
    let mut result = SyncResult::default();

    for mut item in items {
        if ctx.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let (index, path) = match pipeline.evaluate(&mut item).await? {
            Decision::Skip(reason) => {
                result.skipped += 1;
                ctx.reporter.report(ProgressEvent::ItemSkipped {
                    name: item.name.clone(),
                    reason,
                });
                continue;
            }
            Decision::Keep { index, path } => (index, path),
        };

        ctx.reporter.report(ProgressEvent::ItemStarting {
            index,
            name: item.name.clone(),
            media_count: item.media.len(),
        });

        match writer.write(&item, &path).await {
            Ok(ItemOutcome::UpToDate) => {
                result.up_to_date += 1;
                ctx.reporter.report(ProgressEvent::ItemUpToDate {
                    name: item.name.clone(),
                });
            }
            Ok(ItemOutcome::Complete { .. }) => {
                result.written += 1;
                ctx.reporter.report(ProgressEvent::ItemFinished {
                    name: item.name.clone(),
                    complete: true,
                });
            }
            Ok(ItemOutcome::PartialFailure { failures }) => {
                result.partial += 1;
                result.failed_media.extend(failures);
                ctx.reporter.report(ProgressEvent::ItemFinished {
                    name: item.name.clone(),
                    complete: false,
                });
            }
            // The item stays stale and is retried next run
            Err(SyncError::Store(e)) => {
                error!(item = %item.name, error = %e, "error processing item");
                result.partial += 1;
                result.failed_media.push(MediaFailure {
                    item_name: item.name.clone(),
                    file_name: String::new(),
                    error: e.to_string(),
                });
                ctx.reporter.report(ProgressEvent::ItemFinished {
                    name: item.name.clone(),
                    complete: false,
                });
            }
            Err(e) => return Err(e),
        }
    }

    ctx.reporter.report(ProgressEvent::SyncCompleted {
        written_count: result.written,
        up_to_date_count: result.up_to_date,
        skipped_count: result.skipped,
        failed_count: result.partial,
    });

    Ok(result)
}

/// Load every feed source, then synchronize them into `output_dir`
pub async fn sync_feeds(
    ctx: &SyncContext<'_>,
    feed_sources: &[String],
    output_dir: &Path,
    options: &SyncOptions,
) -> Result<SyncResult, SyncError> {
    let sources = load_sources(ctx, feed_sources).await?;
    process_feeds(ctx, &sources, output_dir, options).await
}

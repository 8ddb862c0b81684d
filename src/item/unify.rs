// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{SyncError, VideoError};
use crate::feed::{FeedDocument, FeedEntry, Person};
use crate::video::{Playlist, VideoClient, VideoHandle, best_format, is_video_url};

use super::{Item, Media, RawRecord, item_name};

/// An already-fetched source collection
#[derive(Debug, Clone)]
pub enum Source {
    Feed(FeedDocument),
    Playlist(Playlist),
}

/// Convert every source record into items.
///
/// Unplayable videos are tolerated; any other video error aborts.
pub async fn unify<V: VideoClient + ?Sized>(
    video: &V,
    sources: &[Source],
    cancel: &CancellationToken,
) -> Result<Vec<Item>, SyncError> {
    let mut items = Vec::new();

    for source in sources {
        match source {
            Source::Feed(feed) => {
                for entry in &feed.entries {
                    items.push(feed_item(video, feed, entry, cancel).await?);
                }
            }
            Source::Playlist(playlist) => {
                for entry in &playlist.entries {
                    let resolved =
                        resolve(cancel, video.resolve_playlist_entry(entry), &entry.id).await?;
                    if let Some(handle) = resolved
                        && let Some(item) = video_item(video, playlist, handle)
                    {
                        items.push(item);
                    }
                }
            }
        }
    }

    Ok(items)
}

async fn feed_item<V: VideoClient + ?Sized>(
    video: &V,
    feed: &FeedDocument,
    entry: &FeedEntry,
    cancel: &CancellationToken,
) -> Result<Item, SyncError> {
    let updated = entry.updated.or(entry.published).map(|dt| dt.with_timezone(&Utc));

    let mut media: Vec<Media> = entry
        .enclosures
        .iter()
        .cloned()
        .map(Media::Enclosure)
        .collect();

    for link in entry.links.iter().filter(|l| is_video_url(l)) {
        let Some(handle) = resolve(cancel, video.resolve_video(link), link).await? else {
            continue;
        };

        match best_format(video, &handle.formats) {
            Some(format) => {
                let format = format.clone();
                media.push(Media::Video {
                    video: Arc::new(handle),
                    format,
                });
            }
            None => warn!(video = %handle.title, "no suitable audio/video format"),
        }
    }

    Ok(Item {
        uid: entry.guid.clone(),
        name: item_name(entry.title.as_deref(), &entry.guid),
        authors: authors_string(&entry.authors),
        feed_name: feed.title.clone(),
        description: entry.description.clone().unwrap_or_default(),
        published: entry.published.map(|dt| dt.with_timezone(&Utc)),
        updated,
        media,
        raw: RawRecord::Entry(Box::new(entry.clone())),
    })
}

fn video_item<V: VideoClient + ?Sized>(
    video: &V,
    playlist: &Playlist,
    handle: VideoHandle,
) -> Option<Item> {
    let Some(format) = best_format(video, &handle.formats).cloned() else {
        warn!(video = %handle.title, "no suitable audio/video format");
        return None;
    };

    let published: Option<DateTime<Utc>> = handle.published;
    let handle = Arc::new(handle);

    Some(Item {
        uid: handle.id.clone(),
        name: item_name(Some(&handle.title), &handle.id),
        authors: handle.author.clone(),
        feed_name: playlist.title.clone(),
        description: handle.description.clone(),
        published,
        updated: published,
        media: vec![Media::Video {
            video: handle.clone(),
            format,
        }],
        raw: RawRecord::Video(handle),
    })
}

/// Await a video resolution, mapping "not playable" to `None`
async fn resolve<F>(
    cancel: &CancellationToken,
    resolution: F,
    reference: &str,
) -> Result<Option<VideoHandle>, SyncError>
where
    F: Future<Output = Result<VideoHandle, VideoError>>,
{
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
        result = resolution => result,
    };

    match result {
        Ok(handle) => Ok(Some(handle)),
        Err(e) if e.is_not_playable() => {
            warn!(reference, error = %e, "skipping unplayable video");
            Ok(None)
        }
        Err(e) => Err(SyncError::Video(e)),
    }
}

/// Flatten authors into `Name (email), Name`
fn authors_string(authors: &[Person]) -> String {
    authors
        .iter()
        .map(|p| match &p.email {
            Some(email) if !email.is_empty() => format!("{} ({})", p.name, email),
            _ => p.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

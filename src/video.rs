// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::error::VideoError;
use crate::http::ByteStream;

/// Hosts recognized as the video platform, without any `www.` prefix
const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// One encoded rendition of a video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Format {
    pub itag: u32,
    pub mime_type: String,
    pub quality_label: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bitrate: u64,
    /// Frames per second, zero for audio-only renditions
    pub fps: u32,
    /// Audio channel count, zero for video-only renditions
    pub audio_channels: u32,
    pub content_length: Option<u64>,
}

impl Format {
    /// Whether the rendition carries both audio and video
    pub fn is_muxed(&self) -> bool {
        self.audio_channels > 0 && self.fps > 0
    }
}

/// A resolved video with its available formats
#[derive(Debug, Clone)]
pub struct VideoHandle {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub formats: Vec<Format>,
}

/// A video listed in a playlist, not yet resolved
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub author: String,
}

/// A playlist as returned by the platform
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub author: String,
    pub entries: Vec<PlaylistEntry>,
}

/// Video platform abstraction.
///
/// Implementations must report temporarily unplayable videos as
/// [`VideoError::NotPlayable`], which callers tolerate.
#[async_trait]
pub trait VideoClient: Send + Sync {
    /// Resolve a video page URL or id
    async fn resolve_video(&self, reference: &str) -> Result<VideoHandle, VideoError>;

    /// Resolve a playlist URL to its list of entries
    async fn resolve_playlist(&self, reference: &str) -> Result<Playlist, VideoError>;

    /// Resolve a playlist entry to a full video
    async fn resolve_playlist_entry(&self, entry: &PlaylistEntry)
    -> Result<VideoHandle, VideoError>;

    /// Open a byte stream for one format, returning it with its declared length
    async fn open_stream(
        &self,
        video: &VideoHandle,
        format: &Format,
    ) -> Result<(ByteStream, u64), VideoError>;

    /// Platform quality ordering; `Greater` means `a` is better
    fn compare_quality(&self, a: &Format, b: &Format) -> Ordering {
        a.height
            .cmp(&b.height)
            .then(a.fps.cmp(&b.fps))
            .then(a.bitrate.cmp(&b.bitrate))
            .then(a.audio_channels.cmp(&b.audio_channels))
    }
}

/// Pick the best format that carries both audio and video
pub fn best_format<'a, C: VideoClient + ?Sized>(
    client: &C,
    formats: &'a [Format],
) -> Option<&'a Format> {
    formats
        .iter()
        .filter(|f| f.is_muxed())
        .max_by(|a, b| client.compare_quality(a, b))
}

/// Parse a link that points at the video platform
fn platform_url(link: &str) -> Option<Url> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    VIDEO_HOSTS.contains(&host).then_some(url)
}

/// Whether a link points at the video platform
pub fn is_video_url(link: &str) -> bool {
    platform_url(link).is_some()
}

/// Whether a source URL names a playlist on the video platform
pub fn is_playlist_url(link: &str) -> bool {
    platform_url(link).is_some_and(|url| {
        url.query_pairs()
            .any(|(key, value)| key == "list" && !value.is_empty())
    })
}

/// A client for builds without video platform support.
///
/// Every video is reported as not playable, so feed items keep their other
/// media and playlist entries are skipped. Playlist sources fail to resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledVideoClient;

#[async_trait]
impl VideoClient for DisabledVideoClient {
    async fn resolve_video(&self, reference: &str) -> Result<VideoHandle, VideoError> {
        Err(VideoError::NotPlayable {
            id: reference.to_string(),
            reason: "video support is disabled".to_string(),
        })
    }

    async fn resolve_playlist(&self, reference: &str) -> Result<Playlist, VideoError> {
        Err(VideoError::ResolveFailed {
            reference: reference.to_string(),
            reason: "video support is disabled, playlists cannot be loaded".to_string(),
        })
    }

    async fn resolve_playlist_entry(
        &self,
        entry: &PlaylistEntry,
    ) -> Result<VideoHandle, VideoError> {
        Err(VideoError::NotPlayable {
            id: entry.id.clone(),
            reason: "video support is disabled".to_string(),
        })
    }

    async fn open_stream(
        &self,
        video: &VideoHandle,
        _format: &Format,
    ) -> Result<(ByteStream, u64), VideoError> {
        Err(VideoError::StreamFailed {
            id: video.id.clone(),
            reason: "video support is disabled".to_string(),
        })
    }
}

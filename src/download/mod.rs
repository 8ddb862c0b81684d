// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod filename;

pub use filename::{media_file_name, media_path, partial_path, url_filename};

use std::path::Path;

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::DownloadError;
use crate::feed::Enclosure;
use crate::http::{ByteStream, HttpClient};
use crate::item::Media;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::video::{Format, VideoClient, VideoHandle};

/// Fetches media references to disk with size verification.
///
/// Content is streamed to a `.partial` sibling and only renamed onto the
/// target once the byte count matches the declared length.
pub struct Downloader<'a> {
    http: &'a dyn HttpClient,
    video: &'a dyn VideoClient,
    reporter: SharedProgressReporter,
    cancel: CancellationToken,
    dry_run: bool,
}

impl<'a> Downloader<'a> {
    pub fn new(
        http: &'a dyn HttpClient,
        video: &'a dyn VideoClient,
        reporter: SharedProgressReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            video,
            reporter,
            cancel,
            dry_run: false,
        }
    }

    /// Resolve sources but never touch the filesystem
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Download one media reference to `path`, returning the bytes written
    pub async fn download(
        &self,
        media: &Media,
        item_name: &str,
        path: &Path,
    ) -> Result<u64, DownloadError> {
        match media {
            Media::Enclosure(enclosure) => self.download_enclosure(enclosure, item_name, path).await,
            Media::Video { video, format } => {
                self.download_video(video, format, item_name, path).await
            }
        }
    }

    async fn download_enclosure(
        &self,
        enclosure: &Enclosure,
        item_name: &str,
        path: &Path,
    ) -> Result<u64, DownloadError> {
        let url = enclosure.url.as_str();

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.http.get_stream(url) => response,
        };
        let response = response.map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

        if response.status != 200 {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        // Zero length usually means the server is throttling us
        if response.content_length == Some(0) {
            return Err(DownloadError::ZeroLength {
                source_name: url.to_string(),
            });
        }

        info!(path = %path.display(), "downloading enclosure");
        self.write_stream(response.body, response.content_length, url, item_name, path)
            .await
    }

    async fn download_video(
        &self,
        video: &VideoHandle,
        format: &Format,
        item_name: &str,
        path: &Path,
    ) -> Result<u64, DownloadError> {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            opened = self.video.open_stream(video, format) => opened,
        };
        let (stream, size) = opened?;

        if size == 0 {
            return Err(DownloadError::ZeroLength {
                source_name: video.title.clone(),
            });
        }

        info!(path = %path.display(), "downloading video");
        self.write_stream(stream, Some(size), &video.title, item_name, path)
            .await
    }

    /// Stream `body` to `path`, verifying the declared length.
    ///
    /// Any failure removes the partially written file.
    async fn write_stream(
        &self,
        body: ByteStream,
        declared: Option<u64>,
        source_name: &str,
        item_name: &str,
        path: &Path,
    ) -> Result<u64, DownloadError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        self.reporter.report(ProgressEvent::DownloadStarting {
            item_name: item_name.to_string(),
            file_name: file_name.clone(),
            content_length: declared,
        });

        if self.dry_run {
            return Ok(declared.unwrap_or(0));
        }

        let partial = partial_path(path);
        let result = self
            .stream_to_file(body, declared, source_name, &file_name, &partial)
            .await;

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DownloadError::FileWriteFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }

        self.reporter.report(ProgressEvent::DownloadCompleted {
            file_name,
            bytes_downloaded: written,
        });

        Ok(written)
    }

    async fn stream_to_file(
        &self,
        mut body: ByteStream,
        declared: Option<u64>,
        source_name: &str,
        file_name: &str,
        partial: &Path,
    ) -> Result<u64, DownloadError> {
        let mut file = File::create(partial)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: partial.to_path_buf(),
                source: e,
            })?;

        let mut bytes_downloaded: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = body.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };

            let chunk = chunk.map_err(|e| DownloadError::StreamFailed {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: partial.to_path_buf(),
                    source: e,
                })?;

            bytes_downloaded += chunk.len() as u64;

            self.reporter.report(ProgressEvent::DownloadProgress {
                file_name: file_name.to_string(),
                bytes_downloaded,
                total_bytes: declared,
            });
        }

        // Ensure all data is flushed to disk
        file.flush()
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial.to_path_buf(),
                source: e,
            })?;

        if let Some(expected) = declared
            && expected != bytes_downloaded
        {
            return Err(DownloadError::SizeMismatch {
                path: partial.to_path_buf(),
                expected,
                written: bytes_downloaded,
            });
        }

        Ok(bytes_downloaded)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::http::{ByteStream, HttpClient, HttpResponse};

    /// A canned response for one URL
    #[derive(Clone)]
    pub struct Canned {
        pub status: u16,
        pub body: Vec<u8>,
        /// Declared length; defaults to the body length when `None`
        pub declared: Option<Option<u64>>,
    }

    impl Canned {
        pub fn ok(body: &[u8]) -> Self {
            Self {
                status: 200,
                body: body.to_vec(),
                declared: None,
            }
        }
    }

    /// Serves canned responses by URL; unknown URLs return 404
    #[derive(Clone, Default)]
    pub struct MockHttpClient {
        pub responses: HashMap<String, Canned>,
        pub requests: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl MockHttpClient {
        pub fn with(mut self, url: &str, canned: Canned) -> Self {
            self.responses.insert(url.to_string(), canned);
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, url: &str) -> Result<(u16, Bytes), reqwest::Error> {
            self.requests.lock().unwrap().push(url.to_string());
            Ok(match self.responses.get(url) {
                Some(c) => (c.status, Bytes::from(c.body.clone())),
                None => (404, Bytes::new()),
            })
        }

        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.requests.lock().unwrap().push(url.to_string());
            let canned = self.responses.get(url).cloned().unwrap_or(Canned {
                status: 404,
                body: vec![],
                declared: None,
            });

            let content_length = canned
                .declared
                .unwrap_or(Some(canned.body.len() as u64));
            let data = Bytes::from(canned.body);
            let body: ByteStream = Box::pin(futures::stream::once(async move { Ok(data) }));

            Ok(HttpResponse {
                status: canned.status,
                content_length,
                body,
            })
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::Bytes;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{FeedDocument, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, FeedError> {
    let (status, bytes) = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if status >= 400 {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }

    Ok(bytes)
}

/// Read raw feed bytes from a local file (without parsing)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Fetch or read a feed source and parse it
pub async fn load_feed<C: HttpClient + ?Sized>(
    client: &C,
    source: &str,
) -> Result<FeedDocument, FeedError> {
    if is_url(source) {
        let bytes = fetch_feed_bytes(client, source).await?;
        parse_feed(&bytes)
    } else {
        let bytes = read_feed_file(Path::new(source))?;
        parse_feed(&bytes)
    }
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::http::{ByteStream, HttpResponse};
    use async_trait::async_trait;
    use tempfile::tempdir;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Remote</title><link>https://example.com</link>
<description>d</description><item><title>One</title></item></channel></rss>"#;

    struct MockHttpClient {
        status: u16,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<(u16, Bytes), reqwest::Error> {
            Ok((self.status, Bytes::from_static(FEED.as_bytes())))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let body: ByteStream = Box::pin(futures::stream::empty::<std::io::Result<Bytes>>());
            Ok(HttpResponse {
                status: self.status,
                content_length: Some(0),
                body,
            })
        }
    }

    #[test]
    fn is_url_detects_http() {
        assert!(is_url("http://example.com/feed.xml"));
        assert!(is_url("https://example.com/feed.xml"));
    }

    #[test]
    fn is_url_rejects_file_paths() {
        assert!(!is_url("/path/to/feed.xml"));
        assert!(!is_url("./feed.xml"));
        assert!(!is_url("feed.xml"));
    }

    #[tokio::test]
    async fn loads_remote_feed() {
        let client = MockHttpClient { status: 200 };
        let doc = load_feed(&client, "https://example.com/feed.xml")
            .await
            .unwrap();
        assert_eq!(doc.title, "Remote");
        assert_eq!(doc.entries.len(), 1);
    }

    #[tokio::test]
    async fn http_error_status_fails_fetch() {
        let client = MockHttpClient { status: 404 };
        let result = load_feed(&client, "https://example.com/feed.xml").await;
        assert!(matches!(
            result,
            Err(FeedError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn loads_local_feed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(&path, FEED).unwrap();

        let client = MockHttpClient { status: 500 };
        let doc = load_feed(&client, path.to_str().unwrap()).await.unwrap();
        assert_eq!(doc.title, "Remote");
    }

    #[tokio::test]
    async fn missing_local_file_is_an_error() {
        let client = MockHttpClient { status: 200 };
        let result = load_feed(&client, "/nonexistent/feed.xml").await;
        assert!(matches!(result, Err(FeedError::FileReadFailed { .. })));
    }
}

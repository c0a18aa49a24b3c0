//! FLV source variant
//!
//! Adapts an FLV byte-stream feed into the raw-unit sequence. Used for
//! `http(s)` `.flv` endpoints (with a transport-backed feed) and for
//! local captures via [`super::feed::FlvFileFeed`].

use crate::error::ConnectionError;

use super::feed::MediaFeed;
use super::{RawUnit, UnitSource};

/// FLV-over-HTTP (or local byte stream) source
pub struct FlvSource<F> {
    url: String,
    feed: F,
}

impl<F: MediaFeed> FlvSource<F> {
    /// Create a source for an FLV endpoint
    pub fn new(url: impl Into<String>, feed: F) -> Self {
        Self {
            url: url.into(),
            feed,
        }
    }
}

impl<F: MediaFeed> UnitSource for FlvSource<F> {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.url.starts_with("rtmp://") {
            return Err(ConnectionError::UnsupportedUrl(self.url.clone()));
        }
        self.feed.open(&self.url).await
    }

    async fn next_unit(&mut self) -> Result<Option<RawUnit>, ConnectionError> {
        self.feed.next().await
    }

    async fn close(&mut self) {
        self.feed.close().await;
    }
}

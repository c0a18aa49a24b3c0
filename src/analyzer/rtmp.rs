//! RTMP source variant
//!
//! Adapts an RTMP media feed into the raw-unit sequence. The RTMP
//! handshake and chunk protocol live inside the feed collaborator; this
//! variant only validates the URL form and forwards units.

use crate::error::ConnectionError;

use super::feed::MediaFeed;
use super::{RawUnit, UnitSource};

/// RTMP stream source
pub struct RtmpSource<F> {
    url: String,
    feed: F,
}

impl<F: MediaFeed> RtmpSource<F> {
    /// Create a source for an `rtmp://` URL
    pub fn new(url: impl Into<String>, feed: F) -> Self {
        Self {
            url: url.into(),
            feed,
        }
    }
}

impl<F: MediaFeed> UnitSource for RtmpSource<F> {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&mut self) -> Result<(), ConnectionError> {
        if !self.url.starts_with("rtmp://") {
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

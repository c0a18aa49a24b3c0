//! External collaborator seams
//!
//! Container demuxing/decoding and playlist fetching are supplied by
//! external libraries; this module defines the traits the variants
//! consume, plus the built-in [`FlvFileFeed`] for sources that are
//! already plain FLV byte streams (local captures, piped downloads).
//! HTTP and RTMP transports stay outside the crate: an embedder wraps
//! its transport in a [`MediaFeed`] and hands it to the variant.

use std::time::Duration;

use crate::error::ConnectionError;
use crate::media::flv::FlvReader;

use super::{DataUnit, RawUnit, VideoUnit};

/// Demuxed media supplier (the media I/O collaborator)
///
/// Implementations yield decoded video frames with their attached
/// side-channel bytes, and demuxed data-tag buffers, boundary-correct.
pub trait MediaFeed {
    /// Open the feed for a URL
    async fn open(&mut self, url: &str) -> Result<(), ConnectionError>;

    /// Pull the next demuxed unit; `Ok(None)` is a clean end of stream
    async fn next(&mut self) -> Result<Option<RawUnit>, ConnectionError>;

    /// Release the feed
    async fn close(&mut self);
}

/// One playlist entry
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Segment URI
    pub uri: String,
    /// Declared duration in seconds, if present
    pub duration: Option<f64>,
}

/// One playlist refresh result
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    /// Segments in playback order
    pub segments: Vec<Segment>,
    /// Whether the playlist is final (`#EXT-X-ENDLIST`)
    pub end_list: bool,
    /// Declared target duration between refreshes
    pub target_duration: Option<Duration>,
}

/// Playlist supplier (the playlist collaborator)
pub trait PlaylistFeed {
    /// Fetch the current playlist state
    async fn refresh(&mut self) -> Result<Playlist, ConnectionError>;
}

/// Built-in media feed for FLV byte streams on the local filesystem
///
/// Accepts `file://` URLs and plain paths. AVC video tags become video
/// units (pts derived from the tag timestamp plus the composition-time
/// offset); script tags become data units; audio and non-AVC video are
/// skipped.
#[derive(Debug, Default)]
pub struct FlvFileFeed {
    reader: Option<FlvReader<tokio::fs::File>>,
}

impl FlvFileFeed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaFeed for FlvFileFeed {
    async fn open(&mut self, url: &str) -> Result<(), ConnectionError> {
        let path = match url.strip_prefix("file://") {
            Some(p) => p,
            None if url.contains("://") => {
                return Err(ConnectionError::UnsupportedUrl(format!(
                    "{} (FlvFileFeed reads local byte streams; supply a transport-backed MediaFeed for remote URLs)",
                    url
                )));
            }
            None => url,
        };

        let file = tokio::fs::File::open(path).await?;
        self.reader = Some(FlvReader::new(file));
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<RawUnit>, ConnectionError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| ConnectionError::Transport("feed not open".to_string()))?;

        loop {
            let tag = reader
                .next_tag()
                .await
                .map_err(|e| ConnectionError::Transport(e.to_string()))?;

            let Some(tag) = tag else {
                return Ok(None);
            };

            if tag.is_script() {
                return Ok(Some(RawUnit::Data(DataUnit {
                    payload: tag.data,
                    timestamp_ms: Some(tag.timestamp),
                })));
            }

            if let Some((composition_time, nalus)) = tag.avc_nalus() {
                let dts = tag.timestamp as i64;
                return Ok(Some(RawUnit::Video(VideoUnit {
                    payload: nalus,
                    pts: Some(dts + composition_time as i64),
                    dts: Some(dts),
                    duration: None,
                })));
            }

            // Audio, sequence headers, non-AVC codecs: nothing for us.
        }
    }

    async fn close(&mut self) {
        self.reader = None;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::flv::{avc_video_body, write_flv, FlvTag};
    use bytes::Bytes;

    async fn temp_flv(tags: &[FlvTag], name: &str) -> String {
        let path = std::env::temp_dir().join(format!("stream-timing-feed-{}.flv", name));
        tokio::fs::write(&path, write_flv(tags)).await.unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_flv_file_feed_units() {
        let tags = vec![
            FlvTag::video(0, avc_video_body(40, &[0, 0, 0, 2, 0x41, 0x9A])),
            FlvTag::script(20, Bytes::from_static(&[0x05])),
            // Sequence header: skipped.
            FlvTag::video(40, Bytes::from_static(&[0x17, 0x00, 0x00, 0x00, 0x00, 0x01])),
            FlvTag::video(80, avc_video_body(0, &[0, 0, 0, 1, 0x41])),
        ];
        let path = temp_flv(&tags, "units").await;

        let mut feed = FlvFileFeed::new();
        feed.open(&path).await.unwrap();

        match feed.next().await.unwrap().unwrap() {
            RawUnit::Video(v) => {
                assert_eq!(v.dts, Some(0));
                assert_eq!(v.pts, Some(40));
                assert_eq!(&v.payload[..], &[0, 0, 0, 2, 0x41, 0x9A]);
            }
            other => panic!("expected video unit, got {:?}", other),
        }

        match feed.next().await.unwrap().unwrap() {
            RawUnit::Data(d) => {
                assert_eq!(d.timestamp_ms, Some(20));
                assert_eq!(&d.payload[..], &[0x05]);
            }
            other => panic!("expected data unit, got {:?}", other),
        }

        // The sequence header at ts=40 is skipped.
        match feed.next().await.unwrap().unwrap() {
            RawUnit::Video(v) => assert_eq!(v.dts, Some(80)),
            other => panic!("expected video unit, got {:?}", other),
        }

        assert!(feed.next().await.unwrap().is_none());
        feed.close().await;

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_flv_file_feed_rejects_remote_urls() {
        let mut feed = FlvFileFeed::new();
        let err = feed
            .open("https://cdn.example/live/stream.flv")
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_flv_file_feed_missing_file_is_transient() {
        let mut feed = FlvFileFeed::new();
        let err = feed.open("/nonexistent/capture.flv").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_flv_file_feed_next_before_open() {
        let mut feed = FlvFileFeed::new();
        assert!(feed.next().await.is_err());
    }

    #[tokio::test]
    async fn test_flv_file_feed_file_url() {
        let path = temp_flv(&[], "fileurl").await;
        let mut feed = FlvFileFeed::new();
        feed.open(&format!("file://{}", path)).await.unwrap();
        assert!(feed.next().await.unwrap().is_none());
        let _ = tokio::fs::remove_file(&path).await;
    }
}

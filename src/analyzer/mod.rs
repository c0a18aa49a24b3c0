//! Per-stream analysis
//!
//! A stream analysis is one [`UnitSource`] (the variant adapting an
//! external media source into raw units) driven by the shared pipeline
//! in [`pipeline`], which dispatches each unit to the SEI or AMF parser
//! and emits the resulting timing records.
//!
//! ```text
//!   rtmp://...  ─► RtmpSource ─┐
//!   http .flv   ─► FlvSource  ─┼─► run_pipeline ─► SEI/AMF parsers ─► TimingRecord
//!   http .m3u8  ─► HlsSource  ─┘
//! ```
//!
//! Variants implement only source adaptation; parser dispatch, record
//! emission, and reconnect backoff live once, in the pipeline.

pub mod feed;
pub mod flv;
pub mod hls;
pub mod pipeline;
pub mod rtmp;

pub use feed::{MediaFeed, Playlist, PlaylistFeed, Segment};
pub use flv::FlvSource;
pub use hls::HlsSource;
pub use pipeline::{run_pipeline, BackoffConfig, ParserConfig, PipelineEvent, PipelineStats};
pub use rtmp::RtmpSource;

use bytes::Bytes;

use crate::error::ConnectionError;

/// Stream source variant, chosen from the URL form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// `rtmp://` sources
    Rtmp,
    /// HLS playlists (`.m3u8`)
    Hls,
    /// FLV over HTTP (or a local byte stream)
    Flv,
}

impl Variant {
    /// Classify a stream URL
    ///
    /// `rtmp://` scheme selects RTMP; a path ending in a playlist
    /// extension (query strings ignored) selects HLS; anything else is
    /// treated as FLV over HTTP.
    pub fn from_url(url: &str) -> Variant {
        if url.starts_with("rtmp://") {
            return Variant::Rtmp;
        }
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".m3u8") {
            return Variant::Hls;
        }
        Variant::Flv
    }
}

/// One transient unit of raw stream data
///
/// Produced by a source variant and consumed exactly once by the
/// pipeline's parser dispatch.
#[derive(Debug, Clone)]
pub enum RawUnit {
    /// A video frame's attached side-channel bytes (coded NAL buffer)
    Video(VideoUnit),
    /// A data-tag byte buffer
    Data(DataUnit),
}

/// Video frame payload plus its container timestamps
#[derive(Debug, Clone)]
pub struct VideoUnit {
    /// NAL unit buffer (AVCC or Annex-B framing)
    pub payload: Bytes,
    /// Presentation timestamp, if the container carried one
    pub pts: Option<i64>,
    /// Decoding timestamp, if the container carried one
    pub dts: Option<i64>,
    /// Frame duration, if the container carried one
    pub duration: Option<i64>,
}

/// Data-tag payload
#[derive(Debug, Clone)]
pub struct DataUnit {
    /// Tag bytes (AMF value sequence)
    pub payload: Bytes,
    /// Container timestamp in milliseconds, if carried
    pub timestamp_ms: Option<u32>,
}

/// Capability set of a stream source variant
///
/// `next_unit` may block on the external source's I/O; `Ok(None)` is a
/// clean end of stream. Transient failures are reported as
/// [`ConnectionError`] and retried by the pipeline with backoff.
pub trait UnitSource {
    /// The stream URL this source was built for
    fn url(&self) -> &str;

    /// Establish (or re-establish) the connection
    async fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Pull the next raw unit
    async fn next_unit(&mut self) -> Result<Option<RawUnit>, ConnectionError>;

    /// Release the connection
    async fn close(&mut self);
}

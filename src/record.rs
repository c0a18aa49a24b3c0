//! Timing records
//!
//! The unified output entity shared by the SEI and AMF parsers. A record
//! is created once per decoded message and never mutated afterwards;
//! consumers receive owned copies, and the record crosses process
//! boundaries by value through the worker channel schema.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Which decoder produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingSource {
    /// H.264 SEI user-data message
    Sei,
    /// AMF `onFI` metadata tag
    Amf,
}

impl std::fmt::Display for TimingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingSource::Sei => write!(f, "sei"),
            TimingSource::Amf => write!(f, "amf"),
        }
    }
}

/// Structured timing information extracted from one stream message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Origin stream URL
    pub stream_url: String,

    /// Capture-time system clock, seconds since the Unix epoch
    pub timestamp: f64,

    /// Normalized media time in seconds (value / timescale)
    pub stream_time: f64,

    /// Presentation timestamp, if the source message carried one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pts: Option<i64>,

    /// Decoding timestamp, if the source message carried one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dts: Option<i64>,

    /// Message duration, if the source message carried one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<i64>,

    /// Decoder that produced this record
    pub source: TimingSource,

    /// Source-specific fields not promoted to named attributes
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extra_data: Option<BTreeMap<String, serde_json::Value>>,
}

impl TimingRecord {
    /// Current system clock as seconds since the Unix epoch
    pub fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

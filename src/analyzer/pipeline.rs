//! Shared analysis pipeline
//!
//! All source variants feed the same loop: pull a raw unit, dispatch it
//! to the matching parser (SEI for video units, AMF for data units),
//! emit the resulting timing records in source order. Parse failures
//! are contained to the offending unit; connection failures trigger a
//! bounded exponential-backoff reconnect, and exhausting the retries is
//! the only way the loop fails.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::amf::onfi::{self, OnFiConfig};
use crate::error::{AmfError, WorkerError};
use crate::media::nal::{split_nal_units, NaluType};
use crate::media::sei::{self, SeiConfig};
use crate::record::{TimingRecord, TimingSource};

use super::{RawUnit, UnitSource};

/// Parser configuration shared by every variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    /// SEI vendor UUID
    pub sei: SeiConfig,
    /// `onFI` field mapping
    pub onfi: OnFiConfig,
}

/// Reconnect policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the second attempt; doubles per attempt
    pub base_delay: Duration,
    /// Upper bound on the per-attempt delay
    pub max_delay: Duration,
    /// Connection attempts before giving up
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    /// Delay to apply after the given failed attempt (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Pipeline output event
#[derive(Debug)]
pub enum PipelineEvent {
    /// A decoded timing record
    Record(TimingRecord),
    /// Connection established (initial connect or after a reconnect)
    Connected,
    /// Connection lost; a retry is scheduled
    Degraded { attempt: u32, delay: Duration },
}

/// Analysis counters, reported with the worker's final status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Raw units pulled from the source
    pub units: u64,
    /// Timing records emitted
    pub records: u64,
    /// Units dropped to a parse failure
    pub parse_errors: u64,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "units={} records={} parse_errors={}",
            self.units, self.records, self.parse_errors
        )
    }
}

/// Dispatch one raw unit to the matching parser
///
/// Video units go to the SEI parser (zero or more records: one per
/// matching SEI message across all SEI NAL units in the buffer); data
/// units go to the AMF parser (at most one record). SEI parsing never
/// fails; an AMF decode failure is returned for the caller to count
/// and skip.
pub fn dispatch_unit(
    parser: &ParserConfig,
    stream_url: &str,
    unit: &RawUnit,
) -> Result<Vec<TimingRecord>, AmfError> {
    match unit {
        RawUnit::Video(video) => {
            let mut records = Vec::new();
            for nal in split_nal_units(&video.payload) {
                if NaluType::from_byte(nal[0]) != Some(NaluType::Sei) {
                    continue;
                }
                for timing in sei::extract_timings(&parser.sei, nal) {
                    let extra_data = if timing.trailing.is_empty() {
                        None
                    } else {
                        let mut extra = std::collections::BTreeMap::new();
                        extra.insert(
                            "trailing".to_string(),
                            serde_json::Value::String(hex(timing.trailing)),
                        );
                        Some(extra)
                    };

                    records.push(TimingRecord {
                        stream_url: stream_url.to_string(),
                        timestamp: TimingRecord::now(),
                        stream_time: timing.stream_time(),
                        pts: video.pts,
                        dts: video.dts,
                        duration: video.duration,
                        source: TimingSource::Sei,
                        extra_data,
                    });
                }
            }
            Ok(records)
        }
        RawUnit::Data(data) => {
            let record = onfi::extract_record(&parser.onfi, stream_url, &data.payload)?;
            Ok(record.into_iter().collect())
        }
    }
}

/// Run the analysis loop until end-of-stream, stop, or a fatal failure
///
/// Emits [`PipelineEvent`]s on `events` and returns the final counters.
/// Stream time is expected to be monotonically non-decreasing within
/// one connection; regressions are logged, never corrected.
pub async fn run_pipeline<S: UnitSource>(
    source: &mut S,
    parser: &ParserConfig,
    backoff: &BackoffConfig,
    events: &mpsc::Sender<PipelineEvent>,
    stop: &mut watch::Receiver<bool>,
) -> Result<PipelineStats, WorkerError> {
    let mut stats = PipelineStats::default();
    let mut last_stream_time = f64::NEG_INFINITY;

    if !connect_with_backoff(source, backoff, events, stop).await? {
        source.close().await;
        return Ok(stats);
    }

    loop {
        if *stop.borrow() {
            tracing::info!(url = %source.url(), "stop requested");
            break;
        }

        let pulled = tokio::select! {
            result = source.next_unit() => result,
            _ = stop.changed() => continue,
        };

        match pulled {
            Ok(Some(unit)) => {
                stats.units += 1;
                match dispatch_unit(parser, source.url(), &unit) {
                    Ok(records) => {
                        for record in records {
                            if record.stream_time < last_stream_time {
                                tracing::debug!(
                                    url = %source.url(),
                                    stream_time = record.stream_time,
                                    previous = last_stream_time,
                                    "stream time regressed"
                                );
                            } else {
                                last_stream_time = record.stream_time;
                            }
                            stats.records += 1;
                            events
                                .send(PipelineEvent::Record(record))
                                .await
                                .map_err(|_| WorkerError::ChannelClosed)?;
                        }
                    }
                    Err(e) => {
                        stats.parse_errors += 1;
                        tracing::debug!(
                            url = %source.url(),
                            error = %e,
                            "skipping malformed data tag"
                        );
                    }
                }
            }
            Ok(None) => {
                tracing::info!(url = %source.url(), "end of stream");
                break;
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(url = %source.url(), error = %e, "connection lost");
                source.close().await;
                if !connect_with_backoff(source, backoff, events, stop).await? {
                    break;
                }
                // A reconnect starts a new session; stream time may reset.
                last_stream_time = f64::NEG_INFINITY;
            }
            Err(e) => {
                source.close().await;
                return Err(WorkerError::Fatal(e));
            }
        }
    }

    source.close().await;
    Ok(stats)
}

/// Connect with bounded exponential backoff
///
/// Returns `Ok(false)` when a stop request interrupted the attempts.
async fn connect_with_backoff<S: UnitSource>(
    source: &mut S,
    backoff: &BackoffConfig,
    events: &mpsc::Sender<PipelineEvent>,
    stop: &mut watch::Receiver<bool>,
) -> Result<bool, WorkerError> {
    let mut attempt: u32 = 0;

    loop {
        if *stop.borrow() {
            return Ok(false);
        }

        match source.connect().await {
            Ok(()) => {
                events
                    .send(PipelineEvent::Connected)
                    .await
                    .map_err(|_| WorkerError::ChannelClosed)?;
                return Ok(true);
            }
            Err(e) if !e.is_transient() => {
                return Err(WorkerError::Fatal(e));
            }
            Err(e) => {
                attempt += 1;
                if attempt >= backoff.max_attempts {
                    return Err(WorkerError::RetriesExhausted { attempts: attempt, last: e });
                }

                let delay = backoff.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    url = %source.url(),
                    attempt,
                    max_attempts = backoff.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "connect failed, retrying"
                );
                events
                    .send(PipelineEvent::Degraded { attempt, delay })
                    .await
                    .map_err(|_| WorkerError::ChannelClosed)?;

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop.changed() => {}
                }
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

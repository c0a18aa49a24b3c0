//! Cross-stream correlation
//!
//! The correlator keeps a bounded recent history of timing records per
//! stream (keyed by source type) and pairs each incoming record with
//! the most recent record of every other stream whose capture timestamp
//! falls inside the tolerance window. Each pairing yields a skew: the
//! difference of the two records' normalized stream times. Records with
//! no partner in the window are simply not paired; they are never
//! matched to a distant record.
//!
//! The correlator is single-owner and fed from one multiplexed record
//! stream, so it needs no internal locking.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

use crate::record::{TimingRecord, TimingSource};

/// Correlator configuration
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Maximum capture-timestamp distance for a pairing
    pub tolerance: Duration,

    /// Records kept per stream and source type
    pub history: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            tolerance: Duration::from_millis(100),
            history: 32,
        }
    }
}

impl CorrelatorConfig {
    /// Set the pairing tolerance window
    pub fn tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the per-stream history bound
    pub fn history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }
}

/// One cross-stream pairing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkewReport {
    /// Stream of the incoming record
    pub stream_a: String,
    /// Stream of the paired record
    pub stream_b: String,
    /// Source of the incoming record
    pub source_a: TimingSource,
    /// Source of the paired record
    pub source_b: TimingSource,
    /// `stream_time` difference, a minus b, in seconds
    pub skew: f64,
    /// Capture-timestamp difference, a minus b, in seconds
    pub timestamp_delta: f64,
}

/// Cross-stream correlator
#[derive(Debug, Default)]
pub struct Correlator {
    config: CorrelatorConfig,
    history: HashMap<String, StreamHistory>,
}

#[derive(Debug, Default)]
struct StreamHistory {
    by_source: HashMap<TimingSource, VecDeque<TimingRecord>>,
}

impl StreamHistory {
    /// Most recent record within `tolerance` seconds of `timestamp`
    fn best_match(&self, timestamp: f64, tolerance: f64) -> Option<&TimingRecord> {
        let mut best: Option<&TimingRecord> = None;
        for buffer in self.by_source.values() {
            // Buffers are in arrival order; scan from the newest end.
            for record in buffer.iter().rev() {
                if (record.timestamp - timestamp).abs() <= tolerance {
                    if best.map_or(true, |b| record.timestamp > b.timestamp) {
                        best = Some(record);
                    }
                    break;
                }
                // Older records only get further away once we are past
                // the window on the old side.
                if record.timestamp < timestamp - tolerance {
                    break;
                }
            }
        }
        best
    }

    fn push(&mut self, record: TimingRecord, bound: usize) {
        let buffer = self.by_source.entry(record.source).or_default();
        buffer.push_back(record);
        while buffer.len() > bound {
            buffer.pop_front();
        }
    }
}

impl Correlator {
    /// Create a correlator
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
        }
    }

    /// Ingest one record, returning any pairings it produced
    pub fn ingest(&mut self, record: &TimingRecord) -> Vec<SkewReport> {
        let tolerance = self.config.tolerance.as_secs_f64();
        let mut reports = Vec::new();

        for (url, history) in &self.history {
            if url == &record.stream_url {
                continue;
            }
            if let Some(partner) = history.best_match(record.timestamp, tolerance) {
                reports.push(SkewReport {
                    stream_a: record.stream_url.clone(),
                    stream_b: url.clone(),
                    source_a: record.source,
                    source_b: partner.source,
                    skew: record.stream_time - partner.stream_time,
                    timestamp_delta: record.timestamp - partner.timestamp,
                });
            }
        }

        self.history
            .entry(record.stream_url.clone())
            .or_default()
            .push(record.clone(), self.config.history);

        reports
    }

    /// Number of streams with buffered history
    pub fn tracked_streams(&self) -> usize {
        self.history.len()
    }
}

//! Worker channel schema
//!
//! Workers and the supervisor exchange line-delimited JSON: worker
//! output on stdout, control messages on stdin. The schema is explicit
//! and versioned; a worker announces its protocol version first, and
//! the supervisor rejects versions it does not speak. Nothing else
//! crosses the process boundary.

use serde::{Deserialize, Serialize};

use crate::record::TimingRecord;

use super::state::WorkerState;

/// Version announced in the [`WorkerMessage::Hello`] envelope
pub const PROTOCOL_VERSION: u32 = 1;

/// Worker → supervisor message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// First message on the channel
    Hello { version: u32 },

    /// A decoded timing record
    Record { record: TimingRecord },

    /// Worker state change
    Status {
        state: WorkerState,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        detail: Option<String>,
    },
}

/// Supervisor → worker message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Cooperative stop: finish the current unit, close, exit
    Stop,
}

impl WorkerMessage {
    /// Serialize to one channel line (no trailing newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse one channel line
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

impl ControlMessage {
    /// Serialize to one channel line (no trailing newline)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse one channel line
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

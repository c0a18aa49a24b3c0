//! Worker state machine
//!
//! Tracks the lifecycle of one stream worker from spawn to exit.
//! Transitions are driven by I/O outcomes (connect, reconnect, fatal
//! failure) and supervisor signals (stop).

use serde::{Deserialize, Serialize};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Process spawned, connection not yet established
    Starting,
    /// Connected and analyzing
    Running,
    /// Connection lost, reconnecting with backoff
    Degraded,
    /// Retries exhausted or unrecoverable fault; terminal
    Crashed,
    /// Clean exit after end-of-stream or a stop request; terminal
    Stopped,
}

impl WorkerState {
    /// Whether this state ends the worker
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Crashed | WorkerState::Stopped)
    }

    /// Whether a transition to `next` is meaningful
    ///
    /// Terminal states accept no further transitions, and a self
    /// transition is a no-op.
    pub fn can_transition(self, next: WorkerState) -> bool {
        !self.is_terminal() && self != next && next != WorkerState::Starting
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Degraded => "degraded",
            WorkerState::Crashed => "crashed",
            WorkerState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

//! Stream worker
//!
//! One worker process analyzes one stream. This module provides the
//! worker's state machine, the versioned stdin/stdout channel schema,
//! and the runner driving the analysis pipeline inside the process.

pub mod message;
pub mod runner;
pub mod state;

pub use message::{ControlMessage, WorkerMessage, PROTOCOL_VERSION};
pub use runner::{run_worker, WorkerConfig, WorkerOptions, EXIT_CRASHED, EXIT_OK, EXIT_USAGE};
pub use state::WorkerState;

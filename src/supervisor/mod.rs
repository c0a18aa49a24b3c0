//! Multi-stream process supervision
//!
//! ```text
//!                         Supervisor
//!               ┌───────────────────────────┐
//!               │ workers: one process/URL  │
//!               │ restart budget per worker │
//!               │ correlator (optional)     │
//!               └──────┬──────────┬─────────┘
//!        spawn/stop    │          │   multiplexed events
//!            ┌─────────┘          └──────────┐
//!            ▼                               │
//!      [worker 0]  [worker 1]  [worker N] ───┘
//!      stdin: control (stop)
//!      stdout: Hello / Record / Status
//! ```
//!
//! Analysis runs in separate processes, not threads: the external
//! decode dependency may block non-cooperatively or be unsafe to share,
//! and process isolation keeps one stream's fault from touching the
//! others.

pub mod config;
pub mod process;
pub mod restart;
#[allow(clippy::module_inception)]
pub mod supervisor;

pub use config::SupervisorConfig;
pub use process::{WorkerEvent, WorkerProcess, WorkerSpawnSpec};
pub use restart::RestartTracker;
pub use supervisor::{Output, RunSummary, Supervisor};

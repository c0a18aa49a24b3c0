//! Supervisor configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::analyzer::pipeline::{BackoffConfig, ParserConfig};
use crate::correlate::CorrelatorConfig;

/// Supervisor configuration options
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Restarts allowed per worker within the sliding window
    pub max_restarts: u32,

    /// Sliding window for the restart budget
    pub restart_window: Duration,

    /// Grace period between the stop request and force-termination
    pub shutdown_deadline: Duration,

    /// Interval of the periodic health check
    pub health_interval: Duration,

    /// Base port for debug attach hints; worker `i` gets `base + i`.
    /// `None` disables the hint entirely.
    pub debug_base_port: Option<u16>,

    /// Worker executable; defaults to the current executable
    pub worker_command: Option<PathBuf>,

    /// Parser configuration shipped to every worker
    pub parser: ParserConfig,

    /// Reconnect policy shipped to every worker
    pub backoff: BackoffConfig,

    /// Cross-stream correlation; `None` forwards records unpaired
    pub correlator: Option<CorrelatorConfig>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            restart_window: Duration::from_secs(60),
            shutdown_deadline: Duration::from_secs(5),
            health_interval: Duration::from_secs(1),
            debug_base_port: None,
            worker_command: None,
            parser: ParserConfig::default(),
            backoff: BackoffConfig::default(),
            correlator: Some(CorrelatorConfig::default()),
        }
    }
}

impl SupervisorConfig {
    /// Set the per-worker restart budget
    pub fn max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = max;
        self
    }

    /// Set the restart budget window
    pub fn restart_window(mut self, window: Duration) -> Self {
        self.restart_window = window;
        self
    }

    /// Set the shutdown deadline
    pub fn shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.shutdown_deadline = deadline;
        self
    }

    /// Enable debug attach hints starting at `base`
    pub fn debug_base_port(mut self, base: u16) -> Self {
        self.debug_base_port = Some(base);
        self
    }

    /// Override the worker executable
    pub fn worker_command(mut self, command: PathBuf) -> Self {
        self.worker_command = Some(command);
        self
    }

    /// Set the correlator configuration
    pub fn correlator(mut self, config: CorrelatorConfig) -> Self {
        self.correlator = Some(config);
        self
    }

    /// Disable cross-stream correlation
    pub fn without_correlation(mut self) -> Self {
        self.correlator = None;
        self
    }
}

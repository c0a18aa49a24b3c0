//! Stream supervision
//!
//! One isolated worker process per stream URL. The supervisor spawns
//! workers, multiplexes their output channels into a single event feed,
//! forwards timing records to the correlator and the consumer, restarts
//! crashed workers within a sliding-window budget, and enforces a hard
//! deadline on graceful shutdown.
//!
//! Worker faults never cross process boundaries: a crashing worker
//! (including faults inside its external decode dependency) surfaces
//! here only as a structured status and an exit code.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::correlate::{Correlator, SkewReport};
use crate::error::Result;
use crate::record::TimingRecord;
use crate::worker::message::{ControlMessage, WorkerMessage, PROTOCOL_VERSION};
use crate::worker::runner::{WorkerConfig, EXIT_OK};
use crate::worker::state::WorkerState;

use super::config::SupervisorConfig;
use super::process::{WorkerEvent, WorkerProcess, WorkerSpawnSpec};
use super::restart::RestartTracker;

/// Placeholder timeout for the unarmed shutdown deadline
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Consumer-facing supervisor output
#[derive(Debug)]
pub enum Output {
    /// A timing record from one worker
    Record(TimingRecord),
    /// A cross-stream pairing
    Skew(SkewReport),
    /// A worker ended crashed with its restart budget exhausted
    WorkerFailed { url: String },
}

/// Final result of a supervision run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// URLs whose workers ended crashed
    pub crashed: Vec<String>,
}

impl RunSummary {
    /// Process exit code: 0 on a clean run, nonzero if any worker
    /// ended crashed
    pub fn exit_code(&self) -> i32 {
        if self.crashed.is_empty() {
            0
        } else {
            2
        }
    }
}

/// Multi-stream process supervisor
pub struct Supervisor {
    config: SupervisorConfig,
    urls: Vec<String>,
    workers: HashMap<usize, WorkerProcess>,
    trackers: HashMap<usize, RestartTracker>,
    correlator: Option<Correlator>,
    events_tx: mpsc::Sender<WorkerEvent>,
    events_rx: mpsc::Receiver<WorkerEvent>,
    output: mpsc::Sender<Output>,
    summary: RunSummary,
    stopping: bool,
}

impl Supervisor {
    /// Create a supervisor for a set of stream URLs
    ///
    /// Returns the supervisor and the consumer's output receiver.
    pub fn new(config: SupervisorConfig, urls: Vec<String>) -> (Self, mpsc::Receiver<Output>) {
        let (events_tx, events_rx) = mpsc::channel(1024);
        let (output_tx, output_rx) = mpsc::channel(1024);
        let correlator = config.correlator.clone().map(Correlator::new);

        (
            Self {
                config,
                urls,
                workers: HashMap::new(),
                trackers: HashMap::new(),
                correlator,
                events_tx,
                events_rx,
                output: output_tx,
                summary: RunSummary::default(),
                stopping: false,
            },
            output_rx,
        )
    }

    /// Run until every worker has finished or `shutdown` resolves
    ///
    /// On shutdown, every worker gets a graceful stop; workers still
    /// alive after the shutdown deadline are force-terminated.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<RunSummary> {
        let command = match &self.config.worker_command {
            Some(command) => command.clone(),
            None => std::env::current_exe()?,
        };

        for index in 0..self.urls.len() {
            let worker = self.spawn_worker(&command, index).await?;
            self.workers.insert(index, worker);
            self.trackers.insert(
                index,
                RestartTracker::new(self.config.max_restarts, self.config.restart_window),
            );
        }

        let mut health = tokio::time::interval(self.config.health_interval);
        health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        // Armed with the real deadline once a stop begins.
        let deadline = tokio::time::sleep(FAR_FUTURE);
        tokio::pin!(deadline);

        loop {
            if self.workers.is_empty() {
                break;
            }

            tokio::select! {
                _ = &mut shutdown, if !self.stopping => {
                    self.begin_stop().await;
                    deadline
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.config.shutdown_deadline);
                }
                _ = &mut deadline, if self.stopping => {
                    self.kill_stragglers().await;
                    break;
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(&command, event).await;
                }
                _ = health.tick() => {
                    self.health_check();
                }
            }
        }

        Ok(self.summary)
    }

    async fn spawn_worker(&self, command: &Path, index: usize) -> std::io::Result<WorkerProcess> {
        let spec = WorkerSpawnSpec {
            url: self.urls[index].clone(),
            index,
            debug_port: self
                .config
                .debug_base_port
                .map(|base| base.wrapping_add(index as u16)),
            config: WorkerConfig {
                parser: self.config.parser.clone(),
                backoff: self.config.backoff.clone(),
            },
        };
        WorkerProcess::spawn(command, &spec, self.events_tx.clone()).await
    }

    async fn handle_event(&mut self, command: &Path, event: WorkerEvent) {
        match event {
            WorkerEvent::Message { index, message } => {
                self.handle_message(index, message).await;
            }
            WorkerEvent::ProtocolError { index, line } => {
                tracing::warn!(index, line = %line, "unparseable worker output");
            }
            WorkerEvent::Eof { index } => {
                self.handle_exit(command, index).await;
            }
        }
    }

    async fn handle_message(&mut self, index: usize, message: WorkerMessage) {
        match message {
            WorkerMessage::Hello { version } => {
                if version != PROTOCOL_VERSION {
                    tracing::error!(
                        index,
                        version,
                        expected = PROTOCOL_VERSION,
                        "worker speaks an unknown protocol version"
                    );
                    if let Some(mut worker) = self.workers.remove(&index) {
                        worker.force_kill().await;
                        self.summary.crashed.push(worker.url.clone());
                        let _ = self
                            .output
                            .send(Output::WorkerFailed { url: worker.url })
                            .await;
                    }
                }
            }
            WorkerMessage::Status { state, detail } => {
                let Some(worker) = self.workers.get_mut(&index) else {
                    return;
                };
                if worker.state == state || worker.state.can_transition(state) {
                    tracing::debug!(
                        index,
                        url = %worker.url,
                        state = %state,
                        detail = detail.as_deref().unwrap_or(""),
                        "worker status"
                    );
                    worker.state = state;
                } else {
                    tracing::debug!(
                        index,
                        from = %worker.state,
                        to = %state,
                        "ignoring invalid state transition"
                    );
                }
            }
            WorkerMessage::Record { record } => {
                let mut skews = Vec::new();
                if let Some(correlator) = &mut self.correlator {
                    skews = correlator.ingest(&record);
                }
                let _ = self.output.send(Output::Record(record)).await;
                for skew in skews {
                    let _ = self.output.send(Output::Skew(skew)).await;
                }
            }
        }
    }

    async fn handle_exit(&mut self, command: &Path, index: usize) {
        let Some(mut worker) = self.workers.remove(&index) else {
            return;
        };
        let code = worker.wait().await.ok().flatten();
        let clean = worker.state == WorkerState::Stopped && code == Some(EXIT_OK);

        if self.stopping {
            if worker.state == WorkerState::Crashed {
                self.summary.crashed.push(worker.url.clone());
            }
            tracing::info!(index, url = %worker.url, ?code, "worker exited during shutdown");
            return;
        }

        if clean {
            tracing::info!(index, url = %worker.url, "worker finished");
            return;
        }

        tracing::warn!(
            index,
            url = %worker.url,
            ?code,
            state = %worker.state,
            "worker crashed"
        );

        let allowed = self
            .trackers
            .get_mut(&index)
            .map(|tracker| tracker.allow(Instant::now()))
            .unwrap_or(false);

        if !allowed {
            tracing::error!(
                index,
                url = %worker.url,
                "restart budget exhausted; leaving worker crashed"
            );
            self.summary.crashed.push(worker.url.clone());
            let _ = self
                .output
                .send(Output::WorkerFailed { url: worker.url })
                .await;
            return;
        }

        match self.spawn_worker(command, index).await {
            Ok(restarted) => {
                let used = self.trackers.get(&index).map(RestartTracker::used).unwrap_or(0);
                tracing::info!(index, url = %restarted.url, restarts = used, "worker restarted");
                self.workers.insert(index, restarted);
            }
            Err(e) => {
                tracing::error!(index, url = %worker.url, error = %e, "worker respawn failed");
                self.summary.crashed.push(worker.url.clone());
                let _ = self
                    .output
                    .send(Output::WorkerFailed { url: worker.url })
                    .await;
            }
        }
    }

    async fn begin_stop(&mut self) {
        tracing::info!(workers = self.workers.len(), "stop requested");
        self.stopping = true;
        for worker in self.workers.values_mut() {
            if let Err(e) = worker.send_control(&ControlMessage::Stop).await {
                tracing::debug!(index = worker.index, error = %e, "stop delivery failed");
            }
        }
    }

    async fn kill_stragglers(&mut self) {
        for (index, mut worker) in self.workers.drain() {
            // A worker that ignored the graceful stop is an anomaly.
            tracing::warn!(
                index,
                url = %worker.url,
                "shutdown deadline exceeded; force-terminating"
            );
            worker.force_kill().await;
        }
    }

    fn health_check(&mut self) {
        for worker in self.workers.values_mut() {
            if !worker.is_alive() {
                tracing::debug!(
                    index = worker.index,
                    url = %worker.url,
                    "worker process exited; draining its channel"
                );
            }
        }
    }
}

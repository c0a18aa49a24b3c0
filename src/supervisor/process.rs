//! Worker process handles
//!
//! Spawns one OS process per stream and pumps its stdout lines into the
//! supervisor's multiplexed event channel. The worker is the current
//! executable re-invoked in worker mode; embedders can point the
//! supervisor at a different binary that speaks the same channel
//! schema.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::worker::message::{ControlMessage, WorkerMessage};
use crate::worker::runner::WorkerConfig;
use crate::worker::state::WorkerState;

/// Everything needed to spawn one worker
#[derive(Debug, Clone)]
pub struct WorkerSpawnSpec {
    /// Stream URL
    pub url: String,
    /// Worker index (stable across restarts)
    pub index: usize,
    /// Debug attach port, if enabled
    pub debug_port: Option<u16>,
    /// Parser and backoff configuration
    pub config: WorkerConfig,
}

/// Supervisor-side event from one worker
#[derive(Debug)]
pub enum WorkerEvent {
    /// A parsed channel message
    Message { index: usize, message: WorkerMessage },
    /// A line that did not parse as the channel schema
    ProtocolError { index: usize, line: String },
    /// Worker stdout closed; the process is exiting
    Eof { index: usize },
}

/// Handle to one running worker process
pub struct WorkerProcess {
    /// Stream URL this worker analyzes
    pub url: String,
    /// Worker index
    pub index: usize,
    /// Last state reported on the channel
    pub state: WorkerState,
    child: Child,
    stdin: ChildStdin,
    pump: JoinHandle<()>,
}

impl WorkerProcess {
    /// Spawn a worker process and start pumping its output
    pub async fn spawn(
        command: &Path,
        spec: &WorkerSpawnSpec,
        events: mpsc::Sender<WorkerEvent>,
    ) -> std::io::Result<WorkerProcess> {
        let config = serde_json::to_string(&spec.config).map_err(std::io::Error::other)?;

        let mut cmd = Command::new(command);
        cmd.arg("--worker")
            .arg("--url")
            .arg(&spec.url)
            .arg("--index")
            .arg(spec.index.to_string())
            .arg("--config")
            .arg(config);
        if let Some(port) = spec.debug_port {
            cmd.arg("--debug-port").arg(port.to_string());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdout unavailable"))?;

        tracing::info!(index = spec.index, url = %spec.url, "worker spawned");

        let pump = tokio::spawn(pump_lines(spec.index, stdout, events));

        Ok(WorkerProcess {
            url: spec.url.clone(),
            index: spec.index,
            state: WorkerState::Starting,
            child,
            stdin,
            pump,
        })
    }

    /// Send a control message on the worker's stdin
    pub async fn send_control(&mut self, message: &ControlMessage) -> std::io::Result<()> {
        let line = message.to_line().map_err(std::io::Error::other)?;
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    /// Whether the process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait for the process to exit and return its code
    pub async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    /// Force-terminate the process
    pub async fn force_kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(index = self.index, error = %e, "kill failed (already exited?)");
        }
        let _ = self.child.wait().await;
        self.pump.abort();
    }
}

/// Pump newline-delimited channel messages into the event feed
async fn pump_lines<R: AsyncRead + Unpin>(
    index: usize,
    reader: R,
    events: mpsc::Sender<WorkerEvent>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let event = match WorkerMessage::from_line(line) {
                    Ok(message) => WorkerEvent::Message { index, message },
                    Err(_) => WorkerEvent::ProtocolError {
                        index,
                        line: line.to_string(),
                    },
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    let _ = events.send(WorkerEvent::Eof { index }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::message::PROTOCOL_VERSION;

    #[tokio::test]
    async fn test_pump_parses_messages() {
        let input = format!(
            "{}\n\n{}\nnot-a-message\n",
            WorkerMessage::Hello {
                version: PROTOCOL_VERSION
            }
            .to_line()
            .unwrap(),
            WorkerMessage::Status {
                state: WorkerState::Running,
                detail: None
            }
            .to_line()
            .unwrap(),
        );

        let (tx, mut rx) = mpsc::channel(16);
        pump_lines(7, std::io::Cursor::new(input.into_bytes()), tx).await;

        match rx.recv().await.unwrap() {
            WorkerEvent::Message { index, message } => {
                assert_eq!(index, 7);
                assert_eq!(
                    message,
                    WorkerMessage::Hello {
                        version: PROTOCOL_VERSION
                    }
                );
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkerEvent::Message { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkerEvent::ProtocolError { .. }
        ));
        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Eof { index: 7 }));
        assert!(rx.recv().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_pumps_and_reports_eof() {
        // Any executable works for exercising the spawn/pump plumbing;
        // `echo` prints our arguments (not valid channel messages) and
        // exits, so we expect a protocol error followed by EOF.
        let spec = WorkerSpawnSpec {
            url: "rtmp://example/live/a".into(),
            index: 0,
            debug_port: None,
            config: WorkerConfig::default(),
        };

        let (tx, mut rx) = mpsc::channel(16);
        let mut worker = WorkerProcess::spawn(Path::new("/bin/echo"), &spec, tx)
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkerEvent::ProtocolError { index: 0, .. }
        ));
        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Eof { index: 0 }));

        let code = worker.wait().await.unwrap();
        assert_eq!(code, Some(0));
        assert!(!worker.is_alive());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_force_kill() {
        let spec = WorkerSpawnSpec {
            url: "rtmp://example/live/a".into(),
            index: 1,
            debug_port: Some(5679),
            config: WorkerConfig::default(),
        };

        let (tx, mut rx) = mpsc::channel(16);
        // `yes` repeats our arguments forever; it only dies when killed.
        let mut worker = WorkerProcess::spawn(Path::new("yes"), &spec, tx)
            .await
            .unwrap();
        assert!(worker.is_alive());

        worker.force_kill().await;
        assert!(!worker.is_alive());

        // Drain whatever the pump captured before the kill.
        loop {
            match rx.recv().await {
                Some(WorkerEvent::Eof { .. }) | None => break,
                Some(_) => continue,
            }
        }
    }
}

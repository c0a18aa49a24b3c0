//! Worker process entry point
//!
//! A worker owns exactly one stream source and runs the shared analysis
//! pipeline over it, speaking the channel schema on stdin/stdout:
//! `Hello` first, then `Record` and `Status` messages, and a final
//! terminal `Status` before exit. Control messages (stop) arrive on
//! stdin; EOF on stdin means the supervisor is gone, and the worker
//! stops rather than run orphaned.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::analyzer::pipeline::{
    run_pipeline, BackoffConfig, ParserConfig, PipelineEvent, PipelineStats,
};
use crate::analyzer::UnitSource;
use crate::error::WorkerError;

use super::message::{ControlMessage, WorkerMessage, PROTOCOL_VERSION};
use super::state::WorkerState;

/// Clean shutdown
pub const EXIT_OK: i32 = 0;
/// Bad invocation (unknown URL form, missing backend)
pub const EXIT_USAGE: i32 = 1;
/// Worker ended crashed
pub const EXIT_CRASHED: i32 = 2;

/// Configuration shipped to a worker at spawn time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Parser configuration (SEI UUID, `onFI` field mapping)
    pub parser: ParserConfig,
    /// Reconnect policy
    pub backoff: BackoffConfig,
}

/// Options for one worker run
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Stream URL this worker analyzes
    pub url: String,
    /// Worker index assigned by the supervisor
    pub index: usize,
    /// Debug-attach port (base port + index), if debugging is enabled
    pub debug_port: Option<u16>,
    /// Parser and backoff configuration
    pub config: WorkerConfig,
}

/// Run a worker over the process stdio channels
pub async fn run_worker<S: UnitSource>(options: WorkerOptions, source: S) -> i32 {
    run_worker_io(options, source, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Run a worker over explicit control/output channels
pub async fn run_worker_io<S, R, W>(options: WorkerOptions, mut source: S, control: R, mut output: W) -> i32
where
    S: UnitSource,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let control_task = tokio::spawn(read_control(control, stop_tx));

    let hello = WorkerMessage::Hello {
        version: PROTOCOL_VERSION,
    };
    if emit(&mut output, &hello).await.is_err() {
        control_task.abort();
        return EXIT_CRASHED;
    }
    let starting = WorkerMessage::Status {
        state: WorkerState::Starting,
        detail: None,
    };
    let _ = emit(&mut output, &starting).await;

    // The attach point must exist before the analysis loop starts.
    if let Some(port) = options.debug_port {
        debug_attach_hook(options.index, port);
    }

    let (events_tx, mut events_rx) = mpsc::channel(256);
    let pipeline = run_pipeline(
        &mut source,
        &options.config.parser,
        &options.config.backoff,
        &events_tx,
        &mut stop_rx,
    );
    tokio::pin!(pipeline);

    let result = loop {
        tokio::select! {
            res = &mut pipeline => break res,
            Some(event) = events_rx.recv() => {
                if let Some(message) = message_for_event(event) {
                    let _ = emit(&mut output, &message).await;
                }
            }
        }
    };

    // Flush records buffered behind the pipeline's completion.
    while let Ok(event) = events_rx.try_recv() {
        if let Some(message) = message_for_event(event) {
            let _ = emit(&mut output, &message).await;
        }
    }

    control_task.abort();

    let (message, code) = final_status(&result);
    let _ = emit(&mut output, &message).await;
    code
}

/// Map a pipeline event onto the channel schema
fn message_for_event(event: PipelineEvent) -> Option<WorkerMessage> {
    match event {
        PipelineEvent::Record(record) => Some(WorkerMessage::Record { record }),
        PipelineEvent::Connected => Some(WorkerMessage::Status {
            state: WorkerState::Running,
            detail: None,
        }),
        PipelineEvent::Degraded { attempt, delay } => Some(WorkerMessage::Status {
            state: WorkerState::Degraded,
            detail: Some(format!(
                "reconnect attempt {} in {}ms",
                attempt,
                delay.as_millis()
            )),
        }),
    }
}

/// Terminal status and exit code for a finished pipeline
fn final_status(result: &Result<PipelineStats, WorkerError>) -> (WorkerMessage, i32) {
    match result {
        Ok(stats) => (
            WorkerMessage::Status {
                state: WorkerState::Stopped,
                detail: Some(stats.to_string()),
            },
            EXIT_OK,
        ),
        Err(e) => (
            WorkerMessage::Status {
                state: WorkerState::Crashed,
                detail: Some(e.to_string()),
            },
            EXIT_CRASHED,
        ),
    }
}

/// Remote-debugger attach point
///
/// The debug protocol itself is out of scope; this is the hook invoked
/// with the worker's assigned port before the analysis loop starts.
fn debug_attach_hook(index: usize, port: u16) {
    tracing::info!(index, port, "debug attach point ready");
}

async fn read_control<R: AsyncRead + Unpin>(control: R, stop: watch::Sender<bool>) {
    let mut lines = BufReader::new(control).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match ControlMessage::from_line(line) {
                    Ok(ControlMessage::Stop) => {
                        tracing::info!("stop control received");
                        let _ = stop.send(true);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring malformed control message");
                    }
                }
            }
            // EOF or read failure: supervisor gone.
            Ok(None) | Err(_) => {
                let _ = stop.send(true);
                break;
            }
        }
    }
}

async fn emit<W: AsyncWrite + Unpin>(
    output: &mut W,
    message: &WorkerMessage,
) -> std::io::Result<()> {
    let line = message.to_line().map_err(std::io::Error::other)?;
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

//! Stream timing probe
//!
//! Supervises one worker process per stream URL and prints timing
//! records and cross-stream skew reports as JSON lines on stdout.
//! Logs go to stderr (`RUST_LOG` controls verbosity).
//!
//! Run with: stream-timing [OPTIONS] URL [URL...]
//!
//! Examples:
//!   stream-timing rtmp://localhost/live/a
//!   stream-timing --max-restarts 5 rtmp://host/live/a https://cdn/live/b.m3u8
//!   stream-timing --debug-base-port 5678 file:///tmp/capture.flv
//!
//! Options:
//!   --max-restarts N       restart budget per worker (default 3)
//!   --debug-base-port N    enable debug attach hints; worker i gets N+i
//!   --no-correlation       forward records without cross-stream pairing
//!
//! The same binary doubles as the worker process: the supervisor
//! re-invokes it with `--worker` and the spawn-time configuration. The
//! built-in worker handles FLV byte-stream sources (local captures,
//! `file://`); RTMP and HLS need transport-backed feeds supplied by an
//! embedder through the library API.

use stream_timing::analyzer::feed::FlvFileFeed;
use stream_timing::analyzer::{FlvSource, Variant};
use stream_timing::supervisor::{Output, Supervisor, SupervisorConfig};
use stream_timing::worker::{run_worker, WorkerConfig, WorkerOptions, EXIT_USAGE};

#[tokio::main]
async fn main() {
    // Worker stdout is the record channel; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = if args.iter().any(|arg| arg == "--worker") {
        worker_main(&args).await
    } else {
        supervisor_main(&args).await
    };
    std::process::exit(code);
}

async fn worker_main(args: &[String]) -> i32 {
    let mut url = None;
    let mut index = 0usize;
    let mut debug_port = None;
    let mut config = WorkerConfig::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--worker" => {}
            "--url" => url = iter.next().cloned(),
            "--index" => index = iter.next().and_then(|v| v.parse().ok()).unwrap_or(0),
            "--debug-port" => debug_port = iter.next().and_then(|v| v.parse().ok()),
            "--config" => match iter.next().map(|v| serde_json::from_str(v)) {
                Some(Ok(parsed)) => config = parsed,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "malformed --config");
                    return EXIT_USAGE;
                }
                None => return EXIT_USAGE,
            },
            other => {
                tracing::warn!(arg = other, "ignoring unknown worker argument");
            }
        }
    }

    let Some(url) = url else {
        eprintln!("--worker requires --url");
        return EXIT_USAGE;
    };

    let options = WorkerOptions {
        url: url.clone(),
        index,
        debug_port,
        config,
    };

    match Variant::from_url(&url) {
        Variant::Flv => run_worker(options, FlvSource::new(url, FlvFileFeed::new())).await,
        Variant::Rtmp | Variant::Hls => {
            tracing::error!(
                url = %url,
                "no built-in media feed for this URL; embed the library and supply a transport-backed feed"
            );
            EXIT_USAGE
        }
    }
}

async fn supervisor_main(args: &[String]) -> i32 {
    let mut urls = Vec::new();
    let mut config = SupervisorConfig::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--max-restarts" => {
                match iter.next().and_then(|v| v.parse().ok()) {
                    Some(max) => config = config.max_restarts(max),
                    None => return usage(),
                }
            }
            "--debug-base-port" => {
                match iter.next().and_then(|v| v.parse().ok()) {
                    Some(base) => config = config.debug_base_port(base),
                    None => return usage(),
                }
            }
            "--no-correlation" => config = config.without_correlation(),
            other if other.starts_with("--") => return usage(),
            other => urls.push(other.to_string()),
        }
    }

    if urls.is_empty() {
        return usage();
    }

    let (supervisor, mut output) = Supervisor::new(config, urls);

    let printer = tokio::spawn(async move {
        while let Some(out) = output.recv().await {
            match out {
                Output::Record(record) => print_json(&record),
                Output::Skew(skew) => print_json(&skew),
                Output::WorkerFailed { url } => {
                    tracing::error!(url = %url, "stream analysis failed permanently");
                }
            }
        }
    });

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    match supervisor.run(shutdown).await {
        Ok(summary) => {
            let _ = printer.await;
            summary.exit_code()
        }
        Err(e) => {
            tracing::error!(error = %e, "supervisor failed");
            1
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!(error = %e, "output serialization failed"),
    }
}

fn usage() -> i32 {
    eprintln!(
        "usage: stream-timing [--max-restarts N] [--debug-base-port N] [--no-correlation] URL [URL...]"
    );
    EXIT_USAGE
}

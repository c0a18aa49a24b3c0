//! Live stream timing extraction and cross-stream correlation
//!
//! This crate pulls precise timing out of running media streams (H.264
//! SEI user-data messages carried in video frames, AMF `onFI` tags
//! carried in data channels) and aligns that timing across concurrently
//! monitored streams.
//!
//! ```text
//! external source ─► UnitSource variant ─► shared pipeline
//!                                            │ SEI / AMF parsers
//!                                            ▼
//!                                        TimingRecord
//!                                            │ worker channel (JSON lines)
//!                                            ▼
//!                                        Supervisor ─► Correlator ─► consumer
//! ```
//!
//! Each monitored stream runs in its own worker process (the external
//! demux/decode collaborator may block or be unsafe to share), and the
//! supervisor restarts crashed workers within a sliding-window budget.
//!
//! # Example
//! ```no_run
//! use stream_timing::supervisor::{Output, Supervisor, SupervisorConfig};
//!
//! # async fn example() -> stream_timing::Result<()> {
//! let urls = vec!["rtmp://localhost/live/a".to_string()];
//! let (supervisor, mut output) = Supervisor::new(SupervisorConfig::default(), urls);
//!
//! tokio::spawn(async move {
//!     while let Some(out) = output.recv().await {
//!         if let Output::Skew(skew) = out {
//!             println!("{} vs {}: {:+.3}s", skew.stream_a, skew.stream_b, skew.skew);
//!         }
//!     }
//! });
//!
//! let shutdown = async {
//!     let _ = tokio::signal::ctrl_c().await;
//! };
//! let summary = supervisor.run(shutdown).await?;
//! std::process::exit(summary.exit_code());
//! # }
//! ```

pub mod amf;
pub mod analyzer;
pub mod correlate;
pub mod error;
pub mod media;
pub mod record;
pub mod supervisor;
pub mod worker;

pub use correlate::{Correlator, CorrelatorConfig, SkewReport};
pub use error::{Error, Result};
pub use record::{TimingRecord, TimingSource};
pub use supervisor::{Supervisor, SupervisorConfig};

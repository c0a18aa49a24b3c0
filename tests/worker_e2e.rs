//! End-to-end worker test
//!
//! Builds a synthetic FLV byte stream carrying SEI timing messages and
//! AMF `onFI` tags, runs it through one worker, and checks the channel
//! output: one record per message, in source-arrival order, tagged with
//! the decoder that produced it.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use stream_timing::amf::amf0::encode_all;
use stream_timing::amf::AmfValue;
use stream_timing::analyzer::feed::FlvFileFeed;
use stream_timing::analyzer::pipeline::{BackoffConfig, ParserConfig};
use stream_timing::analyzer::FlvSource;
use stream_timing::media::sei::DEFAULT_VENDOR_UUID;
use stream_timing::record::TimingSource;
use stream_timing::worker::runner::{run_worker_io, WorkerConfig, WorkerOptions, EXIT_OK};
use stream_timing::worker::{WorkerMessage, WorkerState, PROTOCOL_VERSION};

/// SEI NAL unit carrying one user-data-unregistered timing message
fn sei_nal(timescale: u32, value: u64) -> Vec<u8> {
    let mut nal = vec![0x06]; // SEI NAL header
    nal.push(0x05); // user data unregistered
    nal.push(28); // uuid + timescale + value
    nal.extend_from_slice(&DEFAULT_VENDOR_UUID);
    nal.extend_from_slice(&timescale.to_be_bytes());
    nal.extend_from_slice(&value.to_be_bytes());
    nal.push(0x80); // RBSP trailing bits
    nal
}

/// FLV video tag body: AVC NALU packet wrapping the SEI NAL in AVCC framing
fn video_body(nal: &[u8]) -> Vec<u8> {
    let mut body = vec![0x27, 0x01, 0x00, 0x00, 0x00]; // inter+AVC, NALU, cts 0
    body.extend_from_slice(&(nal.len() as u32).to_be_bytes());
    body.extend_from_slice(nal);
    body
}

/// FLV script tag body: `onFI` + payload object
fn onfi_body(ticks: f64) -> Vec<u8> {
    let mut payload = HashMap::new();
    payload.insert("ts".to_string(), AmfValue::Number(ticks));
    encode_all(&[AmfValue::String("onFI".into()), AmfValue::Object(payload)]).to_vec()
}

fn push_tag(out: &mut Vec<u8>, tag_type: u8, timestamp: u32, body: &[u8]) {
    out.push(tag_type);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(&timestamp.to_be_bytes()[1..]);
    out.push((timestamp >> 24) as u8);
    out.extend_from_slice(&[0, 0, 0]); // stream id
    out.extend_from_slice(body);
    out.extend_from_slice(&((11 + body.len()) as u32).to_be_bytes());
}

/// Three SEI messages and two AMF tags, interleaved
fn synthetic_flv() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"FLV");
    out.push(1); // version
    out.push(0x05); // audio + video flags
    out.extend_from_slice(&9u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // prev tag size 0

    push_tag(&mut out, 9, 0, &video_body(&sei_nal(1000, 1000)));
    push_tag(&mut out, 9, 40, &video_body(&sei_nal(1000, 1040)));
    push_tag(&mut out, 18, 80, &onfi_body(1080.0));
    push_tag(&mut out, 9, 120, &video_body(&sei_nal(1000, 1120)));
    push_tag(&mut out, 18, 160, &onfi_body(1160.0));

    out
}

#[tokio::test]
async fn five_messages_yield_five_records_in_order() {
    let path = std::env::temp_dir().join("stream-timing-e2e.flv");
    tokio::fs::write(&path, synthetic_flv()).await.unwrap();
    let url = format!("file://{}", path.display());

    let options = WorkerOptions {
        url: url.clone(),
        index: 0,
        debug_port: None,
        config: WorkerConfig {
            parser: ParserConfig::default(),
            backoff: BackoffConfig {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                max_attempts: 2,
            },
        },
    };
    let source = FlvSource::new(url.clone(), FlvFileFeed::new());

    // Keep the control write end open; the worker must finish on
    // end-of-stream, not on a stop signal.
    let (_control_tx, control_rx) = tokio::io::duplex(1024);
    let (output_tx, mut output_rx) = tokio::io::duplex(1 << 20);

    let code = run_worker_io(options, source, control_rx, output_tx).await;
    assert_eq!(code, EXIT_OK);

    let mut messages = Vec::new();
    let mut lines = BufReader::new(&mut output_rx).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        messages.push(WorkerMessage::from_line(&line).unwrap());
    }

    assert_eq!(
        messages.first().unwrap(),
        &WorkerMessage::Hello {
            version: PROTOCOL_VERSION
        }
    );

    let records: Vec<_> = messages
        .iter()
        .filter_map(|m| match m {
            WorkerMessage::Record { record } => Some(record),
            _ => None,
        })
        .collect();

    assert_eq!(records.len(), 5);

    let sources: Vec<TimingSource> = records.iter().map(|r| r.source).collect();
    assert_eq!(
        sources,
        vec![
            TimingSource::Sei,
            TimingSource::Sei,
            TimingSource::Amf,
            TimingSource::Sei,
            TimingSource::Amf,
        ]
    );

    let times: Vec<f64> = records.iter().map(|r| r.stream_time).collect();
    for (actual, expected) in times.iter().zip([1.0, 1.04, 1.08, 1.12, 1.16]) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    // Every record carries the origin URL, and stream time never
    // regresses within the session.
    assert!(records.iter().all(|r| r.stream_url == url));
    assert!(times.windows(2).all(|w| w[0] <= w[1]));

    match messages.last().unwrap() {
        WorkerMessage::Status {
            state: WorkerState::Stopped,
            detail: Some(detail),
        } => {
            assert!(detail.contains("records=5"), "detail: {}", detail);
        }
        other => panic!("expected final stopped status, got {:?}", other),
    }

    let _ = tokio::fs::remove_file(&path).await;
}

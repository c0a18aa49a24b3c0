//! `onFI` timing extraction
//!
//! Data-channel tags carry AMF0 value sequences; encoders that embed
//! timing publish an `onFI` event followed by a payload object. The
//! event name and the field names inside the payload are not
//! standardized across vendors, so both are configurable; the defaults
//! match the most common encoder output (millisecond tick in `ts`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::amf0::Amf0Decoder;
use super::value::AmfValue;
use crate::error::AmfError;
use crate::record::{TimingRecord, TimingSource};

/// Field mapping for `onFI` payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnFiConfig {
    /// Event name preceding the payload object
    pub event_name: String,

    /// Payload key holding the stream-time tick value
    pub stream_time_key: String,

    /// Payload key holding the presentation timestamp, if present
    pub pts_key: String,

    /// Payload key holding the decoding timestamp, if present
    pub dts_key: String,

    /// Ticks per second for the stream-time value
    pub timescale: f64,
}

impl Default for OnFiConfig {
    fn default() -> Self {
        Self {
            event_name: "onFI".to_string(),
            stream_time_key: "ts".to_string(),
            pts_key: "pts".to_string(),
            dts_key: "dts".to_string(),
            timescale: 1000.0,
        }
    }
}

impl OnFiConfig {
    /// Set the event name
    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    /// Set the stream-time field key
    pub fn stream_time_key(mut self, key: impl Into<String>) -> Self {
        self.stream_time_key = key.into();
        self
    }

    /// Set the timescale (ticks per second)
    pub fn timescale(mut self, timescale: f64) -> Self {
        self.timescale = timescale;
        self
    }
}

/// Extract a timing record from an AMF0 data-tag buffer
///
/// Scans the tag's value sequence for the configured event name and
/// decodes the value that follows it. Returns `Ok(None)` when the tag
/// holds no matching event, or when the payload lacks the stream-time
/// field; both are normal for tags like `onMetaData`. A decode failure
/// is reported with its byte offset and is local to this tag.
pub fn extract_record(
    config: &OnFiConfig,
    stream_url: &str,
    data: &[u8],
) -> Result<Option<TimingRecord>, AmfError> {
    let mut decoder = Amf0Decoder::new(bytes::Bytes::copy_from_slice(data));

    while decoder.has_remaining() {
        let value = decoder.decode_value()?;
        if value.as_str() == Some(config.event_name.as_str()) {
            if !decoder.has_remaining() {
                return Ok(None);
            }
            let payload = decoder.decode_value()?;
            return Ok(record_from_payload(config, stream_url, &payload));
        }
    }

    Ok(None)
}

fn record_from_payload(
    config: &OnFiConfig,
    stream_url: &str,
    payload: &AmfValue,
) -> Option<TimingRecord> {
    let fields = payload.as_object()?;

    let ticks = payload.get_number(&config.stream_time_key)?;
    if config.timescale <= 0.0 {
        return None;
    }
    let stream_time = ticks / config.timescale;

    let pts = payload.get_number(&config.pts_key).map(|n| n as i64);
    let dts = payload.get_number(&config.dts_key).map(|n| n as i64);

    let mut extra: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    for (key, value) in fields {
        if key == &config.stream_time_key || key == &config.pts_key || key == &config.dts_key {
            continue;
        }
        extra.insert(key.clone(), value.to_json());
    }

    Some(TimingRecord {
        stream_url: stream_url.to_string(),
        timestamp: TimingRecord::now(),
        stream_time,
        pts,
        dts,
        duration: None,
        source: TimingSource::Amf,
        extra_data: if extra.is_empty() { None } else { Some(extra) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::amf0::encode_all;
    use std::collections::HashMap;

    const URL: &str = "rtmp://example/live/a";

    fn onfi_tag(fields: Vec<(&str, AmfValue)>) -> Vec<u8> {
        let mut payload = HashMap::new();
        for (k, v) in fields {
            payload.insert(k.to_string(), v);
        }
        encode_all(&[
            AmfValue::String("onFI".into()),
            AmfValue::Object(payload),
        ])
        .to_vec()
    }

    #[test]
    fn test_extract_basic() {
        let tag = onfi_tag(vec![("ts", AmfValue::Number(12_500.0))]);
        let record = extract_record(&OnFiConfig::default(), URL, &tag)
            .unwrap()
            .unwrap();

        assert_eq!(record.source, TimingSource::Amf);
        assert_eq!(record.stream_url, URL);
        assert!((record.stream_time - 12.5).abs() < 1e-9);
        assert_eq!(record.pts, None);
        assert_eq!(record.extra_data, None);
    }

    #[test]
    fn test_extract_with_pts_dts_and_extra() {
        let tag = onfi_tag(vec![
            ("ts", AmfValue::Number(1000.0)),
            ("pts", AmfValue::Number(40_040.0)),
            ("dts", AmfValue::Number(40_000.0)),
            ("sd", AmfValue::String("2026-08-08".into())),
            ("st", AmfValue::String("12:00:00.000".into())),
        ]);
        let record = extract_record(&OnFiConfig::default(), URL, &tag)
            .unwrap()
            .unwrap();

        assert_eq!(record.pts, Some(40_040));
        assert_eq!(record.dts, Some(40_000));
        let extra = record.extra_data.unwrap();
        assert_eq!(extra.len(), 2);
        assert_eq!(extra["sd"], serde_json::json!("2026-08-08"));
        assert_eq!(extra["st"], serde_json::json!("12:00:00.000"));
    }

    #[test]
    fn test_ecma_array_payload() {
        let mut payload = HashMap::new();
        payload.insert("ts".to_string(), AmfValue::Number(500.0));
        let tag = encode_all(&[
            AmfValue::String("onFI".into()),
            AmfValue::EcmaArray(payload),
        ]);

        let record = extract_record(&OnFiConfig::default(), URL, &tag)
            .unwrap()
            .unwrap();
        assert!((record.stream_time - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_timing_field_yields_no_record() {
        let tag = onfi_tag(vec![("sd", AmfValue::String("2026-08-08".into()))]);
        let result = extract_record(&OnFiConfig::default(), URL, &tag).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_other_events_skipped() {
        let mut meta = HashMap::new();
        meta.insert("width".to_string(), AmfValue::Number(1920.0));
        let tag = encode_all(&[
            AmfValue::String("onMetaData".into()),
            AmfValue::EcmaArray(meta),
        ]);

        let result = extract_record(&OnFiConfig::default(), URL, &tag).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_event_scanned_past_leading_values() {
        // Some encoders prefix data tags with extra values.
        let mut payload = HashMap::new();
        payload.insert("ts".to_string(), AmfValue::Number(2000.0));
        let tag = encode_all(&[
            AmfValue::Number(0.0),
            AmfValue::Null,
            AmfValue::String("onFI".into()),
            AmfValue::Object(payload),
        ]);

        let record = extract_record(&OnFiConfig::default(), URL, &tag)
            .unwrap()
            .unwrap();
        assert!((record.stream_time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_payload_is_error_with_offset() {
        let mut tag = onfi_tag(vec![("ts", AmfValue::Number(1000.0))]);
        tag.truncate(10); // cut into the payload object
        let err = extract_record(&OnFiConfig::default(), URL, &tag).unwrap_err();
        assert!(err.offset() <= 10);
    }

    #[test]
    fn test_event_with_nothing_following() {
        let tag = encode_all(&[AmfValue::String("onFI".into())]);
        let result = extract_record(&OnFiConfig::default(), URL, &tag).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_custom_field_mapping() {
        let config = OnFiConfig::default()
            .event_name("onTimeSync")
            .stream_time_key("mediaTime")
            .timescale(90_000.0);

        let mut payload = HashMap::new();
        payload.insert("mediaTime".to_string(), AmfValue::Number(90_000.0));
        let tag = encode_all(&[
            AmfValue::String("onTimeSync".into()),
            AmfValue::Object(payload),
        ]);

        let record = extract_record(&config, URL, &tag).unwrap().unwrap();
        assert!((record.stream_time - 1.0).abs() < 1e-9);
    }
}

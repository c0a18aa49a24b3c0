//! SEI message parsing
//!
//! SEI (Supplemental Enhancement Information) NAL units hold a sequence
//! of messages, each framed as:
//!
//! ```text
//! | payload_type (0xFF-escaped) | payload_size (0xFF-escaped) | payload |
//! ```
//!
//! where the escape encoding accumulates 255 per leading `0xFF` byte and
//! terminates on a byte below 255, independently for type and size.
//!
//! Only `user_data_unregistered` (type 5) payloads are considered. Those
//! open with a 16-byte vendor UUID; payloads carrying our timing format
//! follow the UUID with a 32-bit timescale and a 64-bit tick value, both
//! big-endian. Any trailing bytes are vendor extensions and are passed
//! through to the record's `extra_data`.
//!
//! Truncated or malformed buffers are a "not found" outcome here, never
//! an error; the caller simply moves on to the next raw unit.

use serde::{Deserialize, Serialize};

use super::nal::NaluType;

/// SEI payload type for user data unregistered
pub const PAYLOAD_TYPE_USER_DATA_UNREGISTERED: u32 = 5;

/// Vendor UUID accepted by default
///
/// The 16-byte identifier is not standardized; deployments tag their
/// encoder output with their own UUID and configure it here.
pub const DEFAULT_VENDOR_UUID: [u8; 16] = *b"stream-timing/01";

/// SEI parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeiConfig {
    /// Expected vendor UUID in user-data-unregistered payloads
    pub uuid: [u8; 16],
}

impl Default for SeiConfig {
    fn default() -> Self {
        Self {
            uuid: DEFAULT_VENDOR_UUID,
        }
    }
}

impl SeiConfig {
    /// Set the expected vendor UUID
    pub fn uuid(mut self, uuid: [u8; 16]) -> Self {
        self.uuid = uuid;
        self
    }
}

/// One SEI message inside a NAL unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeiMessage<'a> {
    /// Payload type (0xFF-escape decoded)
    pub payload_type: u32,
    /// Payload bytes
    pub payload: &'a [u8],
}

/// Decoded timing payload from a user-data-unregistered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeiTiming<'a> {
    /// Tick value
    pub value: u64,
    /// Ticks per second
    pub timescale: u32,
    /// Vendor extension bytes after the timing fields
    pub trailing: &'a [u8],
}

impl SeiTiming<'_> {
    /// Normalized stream time in seconds
    pub fn stream_time(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }
}

/// Parse the SEI messages contained in one NAL unit
///
/// Returns an empty list for non-SEI NAL units and for buffers that
/// truncate mid-message; whatever parsed cleanly before the truncation
/// is still returned.
pub fn sei_messages(nal: &[u8]) -> Vec<SeiMessage<'_>> {
    let mut messages = Vec::new();

    if nal.is_empty() || NaluType::from_byte(nal[0]) != Some(NaluType::Sei) {
        return messages;
    }

    let mut pos = 1; // skip NAL header byte
    while pos < nal.len() {
        // The final RBSP stop bit lives in a 0x80 trailing byte; an
        // escape run cannot start there.
        let Some((payload_type, next)) = read_escaped(nal, pos) else {
            break;
        };
        let Some((payload_size, next)) = read_escaped(nal, next) else {
            break;
        };

        let size = payload_size as usize;
        if next + size > nal.len() {
            break;
        }

        messages.push(SeiMessage {
            payload_type,
            payload: &nal[next..next + size],
        });
        pos = next + size;
    }

    messages
}

/// Decode the timing payload of a user-data-unregistered message
///
/// Returns `None` on UUID mismatch or an undersized payload.
pub fn user_data_timing<'a>(config: &SeiConfig, payload: &'a [u8]) -> Option<SeiTiming<'a>> {
    if payload.len() < 16 + 4 + 8 {
        return None;
    }
    if payload[..16] != config.uuid {
        return None;
    }

    let timescale = u32::from_be_bytes(payload[16..20].try_into().ok()?);
    if timescale == 0 {
        return None;
    }
    let value = u64::from_be_bytes(payload[20..28].try_into().ok()?);

    Some(SeiTiming {
        value,
        timescale,
        trailing: &payload[28..],
    })
}

/// Extract every matching timing payload from one NAL unit
pub fn extract_timings<'a>(config: &SeiConfig, nal: &'a [u8]) -> Vec<SeiTiming<'a>> {
    sei_messages(nal)
        .into_iter()
        .filter(|m| m.payload_type == PAYLOAD_TYPE_USER_DATA_UNREGISTERED)
        .filter_map(|m| user_data_timing(config, m.payload))
        .collect()
}

/// Read one 0xFF-escape accumulated value
fn read_escaped(data: &[u8], mut pos: usize) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    while pos < data.len() && data[pos] == 0xFF {
        value += 0xFF;
        pos += 1;
    }
    if pos >= data.len() {
        return None;
    }
    value += data[pos] as u32;
    Some((value, pos + 1))
}

/// Build a user-data-unregistered SEI NAL unit (test fixtures)
#[cfg(test)]
pub fn build_timing_nal(uuid: &[u8; 16], timescale: u32, value: u64, count: usize) -> Vec<u8> {
    let mut nal = vec![0x06]; // SEI NAL header
    for _ in 0..count {
        nal.push(PAYLOAD_TYPE_USER_DATA_UNREGISTERED as u8);
        nal.push(28); // uuid + timescale + value
        nal.extend_from_slice(uuid);
        nal.extend_from_slice(&timescale.to_be_bytes());
        nal.extend_from_slice(&value.to_be_bytes());
    }
    nal.push(0x80); // RBSP trailing bits
    nal
}

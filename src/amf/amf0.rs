//! AMF0 encoder and decoder
//!
//! AMF0 is the original Action Message Format used in Flash-era
//! streaming metadata. Data-channel tags (`onFI`, `onMetaData`) are a
//! sequence of AMF0 values.
//!
//! Type Markers:
//! ```text
//! 0x00 - Number (IEEE 754 double)
//! 0x01 - Boolean
//! 0x02 - String (UTF-8, 16-bit length prefix)
//! 0x03 - Object (key-value pairs until 0x000009)
//! 0x05 - Null
//! 0x06 - Undefined
//! 0x08 - ECMA Array (associative array, 32-bit count hint)
//! 0x09 - Object End (0x000009 sequence)
//! 0x0A - Strict Array (dense array)
//! 0x0B - Date (double + timezone)
//! 0x0C - Long String (UTF-8, 32-bit length prefix)
//! ```
//!
//! The decoder tracks the byte offset of every failure so a malformed
//! tag can be reported precisely and then skipped; a decode error never
//! outlives the tag that produced it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use super::value::AmfValue;
use crate::error::AmfError;

// AMF0 type markers
const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;

/// Maximum nesting depth for objects/arrays (prevent stack overflow)
const MAX_NESTING_DEPTH: usize = 64;

/// AMF0 decoder over a single tag buffer
///
/// Consumes values front to back; [`Amf0Decoder::offset`] reports how
/// many bytes have been consumed so far, and every [`AmfError`] carries
/// the offset at which decoding failed.
pub struct Amf0Decoder {
    buf: Bytes,
    total: usize,
    depth: usize,
}

impl Amf0Decoder {
    /// Create a decoder over a tag buffer
    pub fn new(data: impl Into<Bytes>) -> Self {
        let buf = data.into();
        let total = buf.len();
        Self {
            buf,
            total,
            depth: 0,
        }
    }

    /// Byte offset of the next unread byte
    pub fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    /// Whether any bytes remain
    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    /// Decode the next AMF0 value
    pub fn decode_value(&mut self) -> Result<AmfValue, AmfError> {
        self.need(1)?;
        let marker_offset = self.offset();
        let marker = self.buf.get_u8();

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(AmfError::NestingTooDeep {
                offset: marker_offset,
            });
        }

        let result = match marker {
            MARKER_NUMBER => self.decode_number(),
            MARKER_BOOLEAN => self.decode_boolean(),
            MARKER_STRING => self.decode_string(false),
            MARKER_LONG_STRING => self.decode_string(true),
            MARKER_OBJECT => self.decode_object().map(AmfValue::Object),
            MARKER_NULL => Ok(AmfValue::Null),
            MARKER_UNDEFINED => Ok(AmfValue::Undefined),
            MARKER_ECMA_ARRAY => self.decode_ecma_array(),
            MARKER_STRICT_ARRAY => self.decode_strict_array(),
            MARKER_DATE => self.decode_date(),
            _ => Err(AmfError::UnknownMarker {
                marker,
                offset: marker_offset,
            }),
        };

        self.depth -= 1;
        result
    }

    /// Decode all remaining values in the buffer
    pub fn decode_all(&mut self) -> Result<Vec<AmfValue>, AmfError> {
        let mut values = Vec::new();
        while self.has_remaining() {
            values.push(self.decode_value()?);
        }
        Ok(values)
    }

    fn need(&self, n: usize) -> Result<(), AmfError> {
        if self.buf.remaining() < n {
            Err(AmfError::UnexpectedEof {
                offset: self.offset(),
            })
        } else {
            Ok(())
        }
    }

    fn decode_number(&mut self) -> Result<AmfValue, AmfError> {
        self.need(8)?;
        Ok(AmfValue::Number(self.buf.get_f64()))
    }

    fn decode_boolean(&mut self) -> Result<AmfValue, AmfError> {
        self.need(1)?;
        Ok(AmfValue::Boolean(self.buf.get_u8() != 0))
    }

    fn decode_string(&mut self, long: bool) -> Result<AmfValue, AmfError> {
        let s = self.read_utf8(long)?;
        Ok(AmfValue::String(s))
    }

    fn decode_object(&mut self) -> Result<HashMap<String, AmfValue>, AmfError> {
        let mut properties = HashMap::new();

        loop {
            let key = self.read_utf8(false)?;

            // An empty key must be followed by the object-end marker.
            if key.is_empty() {
                self.need(1)?;
                let end_offset = self.offset();
                let end_marker = self.buf.get_u8();
                if end_marker == MARKER_OBJECT_END {
                    return Ok(properties);
                }
                return Err(AmfError::InvalidObjectEnd { offset: end_offset });
            }

            let value = self.decode_value()?;
            properties.insert(key, value);
        }
    }

    fn decode_ecma_array(&mut self) -> Result<AmfValue, AmfError> {
        // The count is a hint only; keys are read until the end marker.
        self.need(4)?;
        let _count = self.buf.get_u32();
        self.decode_object().map(AmfValue::EcmaArray)
    }

    fn decode_strict_array(&mut self) -> Result<AmfValue, AmfError> {
        self.need(4)?;
        let count = self.buf.get_u32() as usize;

        let mut elements = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            elements.push(self.decode_value()?);
        }
        Ok(AmfValue::Array(elements))
    }

    fn decode_date(&mut self) -> Result<AmfValue, AmfError> {
        self.need(10)?;
        let timestamp = self.buf.get_f64();
        let _timezone = self.buf.get_i16(); // deprecated, usually 0
        Ok(AmfValue::Date(timestamp))
    }

    /// Read a UTF-8 string with a 16-bit (or 32-bit for long) length prefix
    fn read_utf8(&mut self, long: bool) -> Result<String, AmfError> {
        let len = if long {
            self.need(4)?;
            self.buf.get_u32() as usize
        } else {
            self.need(2)?;
            self.buf.get_u16() as usize
        };

        let data_offset = self.offset();
        self.need(len)?;
        let bytes = self.buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8 {
            offset: data_offset,
        })
    }
}

/// AMF0 encoder
pub struct Amf0Encoder {
    buf: BytesMut,
}

impl Amf0Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Get the encoded bytes and reset the encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Get the current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a single AMF0 value
    pub fn encode(&mut self, value: &AmfValue) {
        match value {
            AmfValue::Null => {
                self.buf.put_u8(MARKER_NULL);
            }
            AmfValue::Undefined => {
                self.buf.put_u8(MARKER_UNDEFINED);
            }
            AmfValue::Boolean(b) => {
                self.buf.put_u8(MARKER_BOOLEAN);
                self.buf.put_u8(if *b { 1 } else { 0 });
            }
            AmfValue::Number(n) => {
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*n);
            }
            AmfValue::String(s) => {
                if s.len() > 0xFFFF {
                    self.buf.put_u8(MARKER_LONG_STRING);
                    self.buf.put_u32(s.len() as u32);
                } else {
                    self.buf.put_u8(MARKER_STRING);
                    self.buf.put_u16(s.len() as u16);
                }
                self.buf.put_slice(s.as_bytes());
            }
            AmfValue::Object(props) => {
                self.buf.put_u8(MARKER_OBJECT);
                for (key, val) in props {
                    self.write_utf8(key);
                    self.encode(val);
                }
                // Object end marker: empty key + 0x09
                self.buf.put_u16(0);
                self.buf.put_u8(MARKER_OBJECT_END);
            }
            AmfValue::EcmaArray(props) => {
                self.buf.put_u8(MARKER_ECMA_ARRAY);
                self.buf.put_u32(props.len() as u32);
                for (key, val) in props {
                    self.write_utf8(key);
                    self.encode(val);
                }
                self.buf.put_u16(0);
                self.buf.put_u8(MARKER_OBJECT_END);
            }
            AmfValue::Array(elements) => {
                self.buf.put_u8(MARKER_STRICT_ARRAY);
                self.buf.put_u32(elements.len() as u32);
                for elem in elements {
                    self.encode(elem);
                }
            }
            AmfValue::Date(timestamp) => {
                self.buf.put_u8(MARKER_DATE);
                self.buf.put_f64(*timestamp);
                self.buf.put_i16(0); // timezone (deprecated)
            }
        }
    }

    /// Encode multiple values
    pub fn encode_all(&mut self, values: &[AmfValue]) {
        for value in values {
            self.encode(value);
        }
    }

    /// Write a UTF-8 string with a 16-bit length prefix (no type marker)
    fn write_utf8(&mut self, s: &str) {
        let len = s.len().min(0xFFFF);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&s.as_bytes()[..len]);
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single value
pub fn encode(value: &AmfValue) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(value);
    encoder.finish()
}

/// Convenience function to encode multiple values
pub fn encode_all(values: &[AmfValue]) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode_all(values);
    encoder.finish()
}

/// Convenience function to decode a single value
pub fn decode(data: &[u8]) -> Result<AmfValue, AmfError> {
    Amf0Decoder::new(Bytes::copy_from_slice(data)).decode_value()
}

/// Convenience function to decode all values
pub fn decode_all(data: &[u8]) -> Result<Vec<AmfValue>, AmfError> {
    Amf0Decoder::new(Bytes::copy_from_slice(data)).decode_all()
}

//! FLV tag framing
//!
//! FLV is the container carried over RTMP and over plain HTTP for
//! `.flv` endpoints. The file form is a 9-byte header followed by
//! back-pointer/tag pairs:
//!
//! ```text
//! | 'F' 'L' 'V' | version(1) | flags(1) | data_offset(4) |
//! | prev_tag_size(4) | tag | prev_tag_size(4) | tag | ...
//!
//! Tag: | type(1) | data_size(3) | ts(3) | ts_ext(1) | stream_id(3) | data |
//! ```
//!
//! Video tag data opens with a frame/codec byte; for AVC it continues
//! with a packet type and a signed 24-bit composition-time offset:
//!
//! ```text
//! | FrameType(4b) CodecID(4b) | AVCPacketType(1) | CompositionTime(3, SI24) | NALUs |
//! ```
//!
//! [`FlvReader`] frames tags incrementally from any byte stream; it
//! performs no codec decoding.

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::MediaError;

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    /// Audio data (8)
    Audio,
    /// Video data (9)
    Video,
    /// Script/data tag, AMF-encoded (18)
    Script,
}

impl FlvTagType {
    /// Decode from the tag-type byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            8 => Some(FlvTagType::Audio),
            9 => Some(FlvTagType::Video),
            18 => Some(FlvTagType::Script),
            _ => None,
        }
    }
}

/// AVC packet type inside a video tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcPacketType {
    /// Sequence header (AVCDecoderConfigurationRecord)
    SequenceHeader = 0,
    /// One or more NAL units
    Nalu = 1,
    /// End of sequence
    EndOfSequence = 2,
}

impl AvcPacketType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(AvcPacketType::SequenceHeader),
            1 => Some(AvcPacketType::Nalu),
            2 => Some(AvcPacketType::EndOfSequence),
            _ => None,
        }
    }
}

/// Video codec ID for AVC (lower 4 bits of the frame/codec byte)
pub const VIDEO_CODEC_AVC: u8 = 7;

/// Parsed FLV tag
#[derive(Debug, Clone)]
pub struct FlvTag {
    /// Tag type
    pub tag_type: FlvTagType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Raw tag data (including codec headers)
    pub data: Bytes,
}

impl FlvTag {
    /// Create a new video tag
    pub fn video(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Video,
            timestamp,
            data,
        }
    }

    /// Create a new script tag
    pub fn script(timestamp: u32, data: Bytes) -> Self {
        Self {
            tag_type: FlvTagType::Script,
            timestamp,
            data,
        }
    }

    /// Check if this is a video tag
    pub fn is_video(&self) -> bool {
        self.tag_type == FlvTagType::Video
    }

    /// Check if this is a script/data tag
    pub fn is_script(&self) -> bool {
        self.tag_type == FlvTagType::Script
    }

    /// For video tags, the codec ID nibble
    pub fn video_codec_id(&self) -> Option<u8> {
        if self.is_video() && !self.data.is_empty() {
            Some(self.data[0] & 0x0F)
        } else {
            None
        }
    }

    /// For AVC video tags carrying NAL units, the composition-time
    /// offset and the length-prefixed NALU buffer
    ///
    /// Sequence headers, end-of-sequence markers, and non-AVC codecs
    /// return `None`.
    pub fn avc_nalus(&self) -> Option<(i32, Bytes)> {
        if self.video_codec_id() != Some(VIDEO_CODEC_AVC) || self.data.len() < 5 {
            return None;
        }
        if AvcPacketType::from_byte(self.data[1]) != Some(AvcPacketType::Nalu) {
            return None;
        }

        // Composition time is a signed 24-bit big-endian offset.
        let raw =
            ((self.data[2] as i32) << 16) | ((self.data[3] as i32) << 8) | (self.data[4] as i32);
        let composition_time = if raw & 0x80_0000 != 0 {
            raw | !0xFF_FFFF
        } else {
            raw
        };

        Some((composition_time, self.data.slice(5..)))
    }

    /// Get the size of the tag data
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Incremental FLV tag reader over a byte stream
///
/// Unknown tag types are skipped, not errored, so streams with
/// extension tags keep flowing.
#[derive(Debug)]
pub struct FlvReader<R> {
    reader: R,
    header_read: bool,
}

impl<R: AsyncRead + Unpin> FlvReader<R> {
    /// Create a reader over a byte stream positioned at the FLV header
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            header_read: false,
        }
    }

    /// Read the next tag, skipping unknown tag types
    ///
    /// Returns `Ok(None)` at a clean end of stream (between tags);
    /// a stream that ends mid-tag is a [`MediaError::TruncatedTag`].
    pub async fn next_tag(&mut self) -> Result<Option<FlvTag>, crate::error::Error> {
        if !self.header_read {
            self.read_header().await?;
            self.header_read = true;
        }

        loop {
            let mut tag_header = [0u8; 11];
            if !self.read_or_eof(&mut tag_header).await? {
                return Ok(None);
            }

            let mut buf = &tag_header[..];
            let type_byte = buf.get_u8();
            let data_size = buf.get_uint(3) as usize;
            let ts_low = buf.get_uint(3) as u32;
            let ts_ext = buf.get_u8() as u32;
            let _stream_id = buf.get_uint(3);
            let timestamp = (ts_ext << 24) | ts_low;

            let mut data = vec![0u8; data_size];
            self.read_exact_tag(&mut data).await?;

            // Back-pointer after every tag.
            let mut prev = [0u8; 4];
            self.read_exact_tag(&mut prev).await?;

            match FlvTagType::from_byte(type_byte) {
                Some(tag_type) => {
                    return Ok(Some(FlvTag {
                        tag_type,
                        timestamp,
                        data: Bytes::from(data),
                    }));
                }
                None => {
                    tracing::debug!(tag_type = type_byte, "skipping unknown FLV tag type");
                    continue;
                }
            }
        }
    }

    async fn read_header(&mut self) -> Result<(), crate::error::Error> {
        let mut header = [0u8; 9];
        self.reader
            .read_exact(&mut header)
            .await
            .map_err(|_| MediaError::InvalidFlvHeader)?;

        if &header[0..3] != b"FLV" {
            return Err(MediaError::InvalidFlvHeader.into());
        }

        let data_offset = u32::from_be_bytes([header[5], header[6], header[7], header[8]]);
        if data_offset < 9 {
            return Err(MediaError::InvalidFlvHeader.into());
        }

        // Skip any header extension, then the zero back-pointer.
        let skip = (data_offset - 9) as usize + 4;
        let mut remaining = skip;
        let mut scratch = [0u8; 16];
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            self.reader
                .read_exact(&mut scratch[..n])
                .await
                .map_err(|_| MediaError::InvalidFlvHeader)?;
            remaining -= n;
        }

        Ok(())
    }

    /// Fill `buf` completely, or report a clean EOF at the first byte
    async fn read_or_eof(&mut self, buf: &mut [u8]) -> Result<bool, crate::error::Error> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(MediaError::TruncatedTag.into());
            }
            filled += n;
        }
        Ok(true)
    }

    async fn read_exact_tag(&mut self, buf: &mut [u8]) -> Result<(), crate::error::Error> {
        self.reader
            .read_exact(buf)
            .await
            .map_err(|_| crate::error::Error::from(MediaError::TruncatedTag))?;
        Ok(())
    }
}

/// Serialize tags into an FLV byte stream (test fixtures)
#[cfg(test)]
pub fn write_flv(tags: &[FlvTag]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"FLV");
    out.push(1); // version
    out.push(0x05); // audio + video flags
    out.extend_from_slice(&9u32.to_be_bytes()); // data offset
    out.extend_from_slice(&0u32.to_be_bytes()); // prev tag size 0

    for tag in tags {
        let type_byte = match tag.tag_type {
            FlvTagType::Audio => 8,
            FlvTagType::Video => 9,
            FlvTagType::Script => 18,
        };
        out.push(type_byte);
        out.extend_from_slice(&(tag.data.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(&tag.timestamp.to_be_bytes()[1..]);
        out.push((tag.timestamp >> 24) as u8);
        out.extend_from_slice(&[0, 0, 0]); // stream id
        out.extend_from_slice(&tag.data);
        out.extend_from_slice(&((11 + tag.data.len()) as u32).to_be_bytes());
    }

    out
}

/// Wrap AVCC NALUs into a video tag body (test fixtures)
#[cfg(test)]
pub fn avc_video_body(composition_time: i32, nalus: &[u8]) -> Bytes {
    let mut body = vec![0x27, 0x01]; // inter frame + AVC, NALU packet
    body.extend_from_slice(&composition_time.to_be_bytes()[1..]);
    body.extend_from_slice(nalus);
    Bytes::from(body)
}

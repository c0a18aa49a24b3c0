//! Error types
//!
//! Each concern has its own error enum; everything converts into the
//! crate-level [`Error`] for `?` propagation at the boundaries.
//!
//! Containment policy:
//! - [`AmfError`] and malformed SEI payloads are local to one raw unit.
//! - [`ConnectionError`] is local to one worker and retried with backoff.
//! - [`WorkerError`] ends one worker; sibling workers are unaffected.

use std::fmt;

/// Crate-level result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// AMF decode failure
    Amf(AmfError),
    /// Media container/bitstream failure
    Media(MediaError),
    /// Stream source connection failure
    Connection(ConnectionError),
    /// Worker lifecycle failure
    Worker(WorkerError),
    /// Channel message encode/decode failure
    Json(serde_json::Error),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Media(e) => write!(f, "media error: {}", e),
            Error::Connection(e) => write!(f, "connection error: {}", e),
            Error::Worker(e) => write!(f, "worker error: {}", e),
            Error::Json(e) => write!(f, "message codec error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<AmfError> for Error {
    fn from(e: AmfError) -> Self {
        Error::Amf(e)
    }
}

impl From<MediaError> for Error {
    fn from(e: MediaError) -> Self {
        Error::Media(e)
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}

impl From<WorkerError> for Error {
    fn from(e: WorkerError) -> Self {
        Error::Worker(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// AMF0 decode error
///
/// Every variant carries the byte offset (into the tag buffer) at which
/// decoding failed. A decode error is local to the current tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmfError {
    /// Buffer ended before the value was complete
    UnexpectedEof { offset: usize },
    /// Type marker is not a known AMF0 marker
    UnknownMarker { marker: u8, offset: usize },
    /// String bytes were not valid UTF-8
    InvalidUtf8 { offset: usize },
    /// Object/array nesting exceeded the depth cap
    NestingTooDeep { offset: usize },
    /// Empty object key not followed by the object-end marker
    InvalidObjectEnd { offset: usize },
}

impl AmfError {
    /// Byte offset at which decoding failed
    pub fn offset(&self) -> usize {
        match self {
            AmfError::UnexpectedEof { offset }
            | AmfError::UnknownMarker { offset, .. }
            | AmfError::InvalidUtf8 { offset }
            | AmfError::NestingTooDeep { offset }
            | AmfError::InvalidObjectEnd { offset } => *offset,
        }
    }
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::UnexpectedEof { offset } => {
                write!(f, "unexpected end of buffer at offset {}", offset)
            }
            AmfError::UnknownMarker { marker, offset } => {
                write!(f, "unknown type marker 0x{:02x} at offset {}", marker, offset)
            }
            AmfError::InvalidUtf8 { offset } => {
                write!(f, "invalid UTF-8 string at offset {}", offset)
            }
            AmfError::NestingTooDeep { offset } => {
                write!(f, "nesting too deep at offset {}", offset)
            }
            AmfError::InvalidObjectEnd { offset } => {
                write!(f, "missing object end marker at offset {}", offset)
            }
        }
    }
}

impl std::error::Error for AmfError {}

/// Media container/bitstream error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// FLV file header is missing or malformed
    InvalidFlvHeader,
    /// FLV tag header declared more data than the stream holds
    TruncatedTag,
    /// AVC video packet is malformed
    InvalidAvcPacket,
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::InvalidFlvHeader => write!(f, "invalid FLV header"),
            MediaError::TruncatedTag => write!(f, "truncated FLV tag"),
            MediaError::InvalidAvcPacket => write!(f, "invalid AVC packet"),
        }
    }
}

impl std::error::Error for MediaError {}

/// Stream source connection error
#[derive(Debug)]
pub enum ConnectionError {
    /// URL form is not supported by this source variant
    UnsupportedUrl(String),
    /// Transport-level failure (socket, file, playlist fetch)
    Transport(String),
    /// Underlying I/O failure
    Io(std::io::Error),
}

impl ConnectionError {
    /// Whether retrying can possibly succeed
    ///
    /// An unsupported URL never becomes supported; transport and I/O
    /// failures are treated as transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ConnectionError::UnsupportedUrl(_))
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::UnsupportedUrl(url) => write!(f, "unsupported URL: {}", url),
            ConnectionError::Transport(msg) => write!(f, "transport failure: {}", msg),
            ConnectionError::Io(e) => write!(f, "I/O failure: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

/// Worker lifecycle error
#[derive(Debug)]
pub enum WorkerError {
    /// Reconnect attempts exhausted
    RetriesExhausted {
        attempts: u32,
        last: ConnectionError,
    },
    /// Non-retryable source fault
    Fatal(ConnectionError),
    /// Output channel closed while records were pending
    ChannelClosed,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::RetriesExhausted { attempts, last } => {
                write!(f, "retries exhausted after {} attempts: {}", attempts, last)
            }
            WorkerError::Fatal(e) => write!(f, "fatal source fault: {}", e),
            WorkerError::ChannelClosed => write!(f, "output channel closed"),
        }
    }
}

impl std::error::Error for WorkerError {}

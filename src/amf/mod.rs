//! AMF parsing
//!
//! This module provides:
//! - AMF0 value decoding and encoding
//! - `onFI` timing extraction from data-tag buffers

pub mod amf0;
pub mod onfi;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use onfi::OnFiConfig;
pub use value::AmfValue;

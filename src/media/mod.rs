//! Media bitstream handling
//!
//! This module provides:
//! - NAL unit framing (AVCC and Annex-B)
//! - SEI message parsing and timing extraction
//! - FLV tag framing for byte-stream sources

pub mod flv;
pub mod nal;
pub mod sei;

pub use flv::{FlvReader, FlvTag, FlvTagType};
pub use nal::{split_nal_units, NaluType};
pub use sei::{SeiConfig, SeiMessage, SeiTiming};

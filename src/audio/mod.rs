//! Audio module - turns audio files into raw PCM bytes
//!
//! This module provides:
//! - File decoding to interleaved s16le bytes
//! - Lock-free byte ring for decoding on a background thread

mod buffer;
mod file;

pub use buffer::{spawn_decoder, PcmConsumer, PcmProducer, PcmRing};
pub use file::{FileError, PcmFormat, PcmReader};

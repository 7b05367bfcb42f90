//! scope-peaks - waveform peak extraction
//!
//! Reduces 16-bit little-endian PCM to a sequence of per-window signed maxima
//! for drawing a waveform overview. The [`peaks`] module is the core; the
//! rest reads audio files into PCM and drives the extractor over a track.

pub mod audio;
pub mod overview;
pub mod peaks;
pub mod settings;

pub use overview::{
    build_overview, compare_strategies, Alignment, Overview, OverviewError, OverviewOptions,
};
pub use peaks::{find_peaks, DecodeStrategy, PeakBuffer, PeakError, PeakExtractor, PeakStream};

//! Peak extraction - reduce 16-bit PCM bytes to per-window maxima
//!
//! This module provides:
//! - [`PeakExtractor`] for one-shot extraction over a byte buffer
//! - [`PeakBuffer`], a caller-owned arena reused across calls
//! - [`PeakStream`] for extraction that stays aligned across chunks
//!
//! Peaks are signed maxima. Every window starts from `i16::MIN`, so a window
//! of only negative samples reports its real maximum instead of 0.

mod decode;
mod stream;

pub use decode::{compose, DecodeStrategy, BYTES_PER_SAMPLE};
pub use stream::PeakStream;

use thiserror::Error;

/// Contract violations of a peak extraction call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeakError {
    #[error("byte count {byte_count} exceeds buffer length {available}")]
    ShortBuffer { byte_count: usize, available: usize },

    #[error("samples per peak must be at least 1")]
    ZeroSamplesPerPeak,
}

/// Number of peaks produced for `byte_count` bytes
#[inline]
pub fn peak_count(byte_count: usize, samples_per_peak: usize) -> usize {
    if samples_per_peak == 0 {
        return 0;
    }
    (byte_count / BYTES_PER_SAMPLE) / samples_per_peak
}

/// Extract peaks with the default strategy into a new vector
pub fn find_peaks(
    samples: &[u8],
    byte_count: usize,
    samples_per_peak: usize,
) -> Result<Vec<i16>, PeakError> {
    PeakExtractor::default().find_peaks(samples, byte_count, samples_per_peak)
}

/// Running maximum over fixed-size windows
#[derive(Debug, Clone)]
pub(crate) struct WindowMax {
    samples_per_peak: usize,
    current: i16,
    filled: usize,
}

impl WindowMax {
    pub(crate) fn new(samples_per_peak: usize) -> Self {
        Self {
            samples_per_peak,
            current: i16::MIN,
            filled: 0,
        }
    }

    /// Fold one sample in; returns the peak when the window completes
    #[inline(always)]
    pub(crate) fn push(&mut self, sample: i16) -> Option<i16> {
        self.current = self.current.max(sample);
        self.filled += 1;
        if self.filled == self.samples_per_peak {
            let peak = self.current;
            self.current = i16::MIN;
            self.filled = 0;
            Some(peak)
        } else {
            None
        }
    }

    pub(crate) fn filled(&self) -> usize {
        self.filled
    }
}

/// Reusable output arena for [`PeakExtractor::find_peaks_into`]
///
/// Holds the peak vector and the decode scratch between calls. The vector is
/// only resized when the byte count or decimation factor changes.
#[derive(Debug, Default)]
pub struct PeakBuffer {
    peaks: Vec<i16>,
    scratch: Vec<i16>,
    /// `(byte_count, samples_per_peak)` of the last call
    shape: Option<(usize, usize)>,
}

impl PeakBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peaks written by the last call
    pub fn peaks(&self) -> &[i16] {
        &self.peaks
    }

    fn prepare(&mut self, byte_count: usize, samples_per_peak: usize) {
        let shape = (byte_count, samples_per_peak);
        if self.shape != Some(shape) {
            self.peaks.resize(peak_count(byte_count, samples_per_peak), i16::MIN);
            self.shape = Some(shape);
        }
    }
}

/// Stateless peak extractor
///
/// Cheap to copy; each caller (or thread) owns its own [`PeakBuffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeakExtractor {
    strategy: DecodeStrategy,
}

impl PeakExtractor {
    pub fn new(strategy: DecodeStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> DecodeStrategy {
        self.strategy
    }

    /// Extract peaks from the first `byte_count` bytes of `samples`
    pub fn find_peaks(
        &self,
        samples: &[u8],
        byte_count: usize,
        samples_per_peak: usize,
    ) -> Result<Vec<i16>, PeakError> {
        let mut buffer = PeakBuffer::new();
        self.find_peaks_into(samples, byte_count, samples_per_peak, &mut buffer)?;
        Ok(buffer.peaks)
    }

    /// Extract peaks into a reused arena.
    ///
    /// The returned slice has exactly `peak_count(byte_count, samples_per_peak)`
    /// entries and is fully overwritten on every call.
    pub fn find_peaks_into<'a>(
        &self,
        samples: &[u8],
        byte_count: usize,
        samples_per_peak: usize,
        buffer: &'a mut PeakBuffer,
    ) -> Result<&'a [i16], PeakError> {
        if samples_per_peak == 0 {
            return Err(PeakError::ZeroSamplesPerPeak);
        }
        let bytes = samples.get(..byte_count).ok_or(PeakError::ShortBuffer {
            byte_count,
            available: samples.len(),
        })?;

        buffer.prepare(byte_count, samples_per_peak);

        // Only whole windows are decoded; the trailing partial one is dropped
        let used = buffer.peaks.len() * samples_per_peak * BYTES_PER_SAMPLE;
        let mut window = WindowMax::new(samples_per_peak);
        let mut slots = buffer.peaks.iter_mut();
        self.strategy
            .decode_with(&bytes[..used], &mut buffer.scratch, |sample| {
                if let Some(peak) = window.push(sample) {
                    if let Some(slot) = slots.next() {
                        *slot = peak;
                    }
                }
            });

        Ok(buffer.peaks.as_slice())
    }
}

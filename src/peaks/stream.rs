//! Streaming peak extraction
//!
//! [`PeakExtractor`](super::PeakExtractor) restarts window alignment at the
//! start of every buffer it is given. When a track is read in chunks whose
//! sample count is not a multiple of the decimation factor, that shifts the
//! windows at every chunk boundary. `PeakStream` carries the partial window
//! (and an unpaired odd byte) over to the next chunk instead, so windows stay
//! aligned to absolute sample position.

use super::{DecodeStrategy, PeakError, WindowMax};

/// Peak extractor that keeps window alignment across chunks
#[derive(Debug)]
pub struct PeakStream {
    strategy: DecodeStrategy,
    window: WindowMax,
    /// Low byte of a sample split across two chunks
    carry: Option<u8>,
    scratch: Vec<i16>,
    samples_seen: u64,
}

impl PeakStream {
    pub fn new(samples_per_peak: usize, strategy: DecodeStrategy) -> Result<Self, PeakError> {
        if samples_per_peak == 0 {
            return Err(PeakError::ZeroSamplesPerPeak);
        }
        Ok(Self {
            strategy,
            window: WindowMax::new(samples_per_peak),
            carry: None,
            scratch: Vec::new(),
            samples_seen: 0,
        })
    }

    /// Feed the next chunk, appending every completed peak to `peaks`
    pub fn push(&mut self, bytes: &[u8], peaks: &mut Vec<i16>) {
        let mut bytes = bytes;

        if let Some(low) = self.carry {
            let Some((&high, rest)) = bytes.split_first() else {
                return;
            };
            self.carry = None;
            self.samples_seen += 1;
            if let Some(peak) = self.window.push(super::compose(low, high)) {
                peaks.push(peak);
            }
            bytes = rest;
        }

        if bytes.len() % 2 == 1 {
            self.carry = bytes.last().copied();
        }

        let window = &mut self.window;
        let mut decoded = 0u64;
        self.strategy.decode_with(bytes, &mut self.scratch, |sample| {
            decoded += 1;
            if let Some(peak) = window.push(sample) {
                peaks.push(peak);
            }
        });
        self.samples_seen += decoded;
    }

    /// Samples folded into the current, incomplete window
    pub fn pending_samples(&self) -> usize {
        self.window.filled()
    }

    /// Total samples decoded so far
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }
}

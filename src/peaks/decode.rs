//! PCM byte decoding
//!
//! Turns raw 16-bit little-endian bytes into signed samples. There are three
//! ways of doing this that all produce the same numbers; they only differ in
//! how much work happens per sample and whether a scratch buffer is needed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bytes per decoded sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// How PCM bytes are turned into `i16` samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// Compose each sample from its two bytes with shifts
    #[default]
    BitManipulation,
    /// `i16::from_le_bytes` on each byte pair
    FromLeBytes,
    /// Copy the whole buffer into an `i16` scratch slice, then fix byte order
    BulkCast,
}

impl DecodeStrategy {
    pub const ALL: &[DecodeStrategy] = &[Self::BitManipulation, Self::FromLeBytes, Self::BulkCast];

    pub fn name(&self) -> &'static str {
        match self {
            Self::BitManipulation => "bit_manipulation",
            Self::FromLeBytes => "from_le_bytes",
            Self::BulkCast => "bulk_cast",
        }
    }

    /// Decode `bytes` and feed every sample to `f` in order.
    ///
    /// A trailing odd byte is ignored. `scratch` is only touched by
    /// [`DecodeStrategy::BulkCast`].
    #[inline]
    pub fn decode_with<F>(self, bytes: &[u8], scratch: &mut Vec<i16>, mut f: F)
    where
        F: FnMut(i16),
    {
        match self {
            Self::BitManipulation => {
                for pair in bytes.chunks_exact(BYTES_PER_SAMPLE) {
                    f(compose(pair[0], pair[1]));
                }
            }
            Self::FromLeBytes => {
                for pair in bytes.chunks_exact(BYTES_PER_SAMPLE) {
                    f(i16::from_le_bytes([pair[0], pair[1]]));
                }
            }
            Self::BulkCast => {
                for &sample in bulk_cast(bytes, scratch).iter() {
                    f(sample);
                }
            }
        }
    }

    /// Decode into a fresh vector
    pub fn decode(self, bytes: &[u8]) -> Vec<i16> {
        let mut samples = Vec::with_capacity(bytes.len() / BYTES_PER_SAMPLE);
        let mut scratch = Vec::new();
        self.decode_with(bytes, &mut scratch, |s| samples.push(s));
        samples
    }
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DecodeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|s| s.name()).collect();
                format!("unknown strategy '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Sign-extending composition of a little-endian byte pair
#[inline(always)]
pub fn compose(low: u8, high: u8) -> i16 {
    (low as u16 | (high as u16) << 8) as i16
}

/// Reinterpret `bytes` as native `i16`s in `scratch`, then convert from
/// little-endian. Returns the decoded slice.
fn bulk_cast<'a>(bytes: &[u8], scratch: &'a mut Vec<i16>) -> &'a [i16] {
    let count = bytes.len() / BYTES_PER_SAMPLE;
    scratch.clear();
    scratch.resize(count, 0);

    let raw: &mut [u8] = bytemuck::cast_slice_mut(scratch.as_mut_slice());
    raw.copy_from_slice(&bytes[..count * BYTES_PER_SAMPLE]);

    // No-op on little-endian targets
    for sample in scratch.iter_mut() {
        *sample = i16::from_le(*sample);
    }

    scratch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_round_trips_extremes() {
        for value in [1234i16, -1234, i16::MAX, i16::MIN, 0, -1] {
            let b = value.to_le_bytes();
            assert_eq!(compose(b[0], b[1]), value);
        }
    }

    #[test]
    fn test_strategies_decode_identically() {
        // Deterministic byte pattern covering every high byte
        let bytes: Vec<u8> = (0..4097u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect();

        let reference = DecodeStrategy::BitManipulation.decode(&bytes);
        assert_eq!(reference.len(), 2048);
        for strategy in DecodeStrategy::ALL {
            assert_eq!(strategy.decode(&bytes), reference, "{} differs", strategy);
        }
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let bytes = [0x01, 0x80, 0xff];
        for strategy in DecodeStrategy::ALL {
            assert_eq!(strategy.decode(&bytes), vec![-32767]);
        }
    }

    #[test]
    fn test_bulk_cast_reuses_scratch() {
        let mut scratch = vec![7i16; 16];
        let mut out = Vec::new();
        DecodeStrategy::BulkCast.decode_with(&[0x00, 0x80], &mut scratch, |s| out.push(s));
        assert_eq!(out, vec![i16::MIN]);
        assert_eq!(scratch.len(), 1);
    }

    #[test]
    fn test_parse_names() {
        for strategy in DecodeStrategy::ALL {
            assert_eq!(strategy.name().parse::<DecodeStrategy>(), Ok(*strategy));
        }
        assert!("block_copy".parse::<DecodeStrategy>().is_err());
    }
}

//! Waveform overview - peaks for a whole track, read chunk by chunk

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::peaks::{DecodeStrategy, PeakBuffer, PeakError, PeakExtractor, PeakStream};

/// Errors that can occur while building an overview
#[derive(Error, Debug)]
pub enum OverviewError {
    #[error("Failed to read PCM: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Peak(#[from] PeakError),

    #[error("Chunk size must be a positive number of bytes")]
    InvalidChunkSize,
}

/// How peak windows line up across chunk boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Windows restart at the start of every chunk; the partial window at
    /// the end of each chunk is dropped
    #[default]
    PerChunk,
    /// Windows follow absolute sample position across chunks
    Continuous,
}

impl Alignment {
    pub const ALL: &[Alignment] = &[Self::PerChunk, Self::Continuous];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PerChunk => "per_chunk",
            Self::Continuous => "continuous",
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|alignment| alignment.name() == s)
            .ok_or_else(|| format!("unknown alignment '{}' (expected per_chunk or continuous)", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverviewOptions {
    /// Bytes requested from the source per read
    pub chunk_bytes: usize,
    pub samples_per_peak: usize,
    pub strategy: DecodeStrategy,
    pub alignment: Alignment,
}

/// Peaks of a whole track plus read statistics
#[derive(Debug, Clone, Default)]
pub struct Overview {
    pub peaks: Vec<i16>,
    pub chunks: usize,
    pub bytes_read: u64,
    /// Time spent inside peak extraction only
    pub extract_time: Duration,
}

/// Read `source` to the end in chunks and collect its peaks
pub fn build_overview<R: Read>(
    mut source: R,
    options: &OverviewOptions,
) -> Result<Overview, OverviewError> {
    if options.chunk_bytes == 0 {
        return Err(OverviewError::InvalidChunkSize);
    }
    if options.samples_per_peak == 0 {
        return Err(PeakError::ZeroSamplesPerPeak.into());
    }

    let extractor = PeakExtractor::new(options.strategy);
    let mut stream = match options.alignment {
        Alignment::Continuous => Some(PeakStream::new(options.samples_per_peak, options.strategy)?),
        Alignment::PerChunk => None,
    };
    let mut arena = PeakBuffer::new();
    let mut read_buffer = vec![0u8; options.chunk_bytes];
    let mut overview = Overview::default();

    loop {
        let read = read_chunk(&mut source, &mut read_buffer)?;
        if read == 0 {
            break;
        }

        let started = Instant::now();
        match stream.as_mut() {
            Some(stream) => stream.push(&read_buffer[..read], &mut overview.peaks),
            None => {
                let peaks = extractor.find_peaks_into(
                    &read_buffer,
                    read,
                    options.samples_per_peak,
                    &mut arena,
                )?;
                overview.peaks.extend_from_slice(peaks);
            }
        }
        let elapsed = started.elapsed();

        overview.extract_time += elapsed;
        overview.chunks += 1;
        overview.bytes_read += read as u64;
        log::debug!("Chunk {}: {} bytes in {:?}", overview.chunks, read, elapsed);
    }

    log::info!(
        "{} peaks from {} bytes in {} chunk(s) ({}), {} took {}ms",
        overview.peaks.len(),
        overview.bytes_read,
        overview.chunks,
        options.alignment.name(),
        extractor.strategy(),
        overview.extract_time.as_millis()
    );

    Ok(overview)
}

/// Fill `buf` as far as the source allows; short only at end of stream
pub fn read_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Run every strategy over the same bytes.
///
/// Returns the first strategy whose peaks differ from
/// [`DecodeStrategy::BitManipulation`], or `None` if all agree.
pub fn compare_strategies(
    samples: &[u8],
    byte_count: usize,
    samples_per_peak: usize,
) -> Result<Option<DecodeStrategy>, PeakError> {
    let reference = PeakExtractor::new(DecodeStrategy::BitManipulation).find_peaks(
        samples,
        byte_count,
        samples_per_peak,
    )?;

    for &strategy in DecodeStrategy::ALL {
        let peaks = PeakExtractor::new(strategy).find_peaks(samples, byte_count, samples_per_peak)?;
        if peaks != reference {
            log::warn!("{} peaks don't match {}", strategy, DecodeStrategy::BitManipulation);
            return Ok(Some(strategy));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn options(chunk_bytes: usize, samples_per_peak: usize, alignment: Alignment) -> OverviewOptions {
        OverviewOptions {
            chunk_bytes,
            samples_per_peak,
            strategy: DecodeStrategy::default(),
            alignment,
        }
    }

    #[test]
    fn test_per_chunk_restarts_alignment() {
        // Chunks of 3 samples with 2 samples per peak: the third sample of
        // every chunk is dropped
        let bytes = to_bytes(&[1, 2, 30, 4, 5, 60, 7]);
        let overview =
            build_overview(Cursor::new(bytes), &options(6, 2, Alignment::PerChunk)).unwrap();
        assert_eq!(overview.peaks, vec![2, 5]);
        assert_eq!(overview.chunks, 3);
        assert_eq!(overview.bytes_read, 14);
    }

    #[test]
    fn test_continuous_keeps_alignment() {
        let bytes = to_bytes(&[1, 2, 30, 4, 5, 60, 7]);
        let overview =
            build_overview(Cursor::new(bytes), &options(6, 2, Alignment::Continuous)).unwrap();
        assert_eq!(overview.peaks, vec![2, 30, 60]);
    }

    #[test]
    fn test_aligned_chunks_agree() {
        let samples: Vec<i16> = (0..4410).map(|i| ((i * 7919) % 2001 - 1000) as i16).collect();
        let bytes = to_bytes(&samples);
        // 441 samples per chunk, a multiple of 21
        let per_chunk =
            build_overview(Cursor::new(bytes.clone()), &options(882, 21, Alignment::PerChunk))
                .unwrap();
        let continuous =
            build_overview(Cursor::new(bytes), &options(882, 21, Alignment::Continuous)).unwrap();
        assert_eq!(per_chunk.peaks, continuous.peaks);
        assert_eq!(per_chunk.peaks.len(), 210);
    }

    #[test]
    fn test_empty_source() {
        let overview =
            build_overview(Cursor::new(Vec::new()), &options(64, 4, Alignment::PerChunk)).unwrap();
        assert!(overview.peaks.is_empty());
        assert_eq!(overview.chunks, 0);
    }

    #[test]
    fn test_invalid_options() {
        let err = build_overview(Cursor::new(vec![0u8; 4]), &options(0, 4, Alignment::PerChunk));
        assert!(matches!(err, Err(OverviewError::InvalidChunkSize)));

        let err = build_overview(Cursor::new(vec![0u8; 4]), &options(4, 0, Alignment::PerChunk));
        assert!(matches!(err, Err(OverviewError::Peak(PeakError::ZeroSamplesPerPeak))));

        let err = build_overview(Cursor::new(vec![0u8; 4]), &options(4, 0, Alignment::Continuous));
        assert!(matches!(err, Err(OverviewError::Peak(PeakError::ZeroSamplesPerPeak))));
    }

    #[test]
    fn test_zero_samples_per_peak_rejected_without_input() {
        for alignment in Alignment::ALL {
            let err = build_overview(Cursor::new(Vec::new()), &options(64, 0, *alignment));
            assert!(
                matches!(err, Err(OverviewError::Peak(PeakError::ZeroSamplesPerPeak))),
                "{} accepted zero samples per peak",
                alignment
            );
        }
    }

    #[test]
    fn test_alignment_names_parse() {
        for alignment in Alignment::ALL {
            assert_eq!(alignment.name().parse::<Alignment>(), Ok(*alignment));
        }
        assert!("global".parse::<Alignment>().is_err());
    }

    #[test]
    fn test_compare_strategies_agree() {
        let bytes: Vec<u8> = (0..8821u32).map(|i| (i.wrapping_mul(97) ^ (i >> 3)) as u8).collect();
        assert_eq!(compare_strategies(&bytes, bytes.len(), 4410 / 10), Ok(None));
    }
}

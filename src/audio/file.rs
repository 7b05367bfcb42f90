//! Audio file decoding to raw PCM
//!
//! This module decodes audio files with symphonia and hands the result out as
//! interleaved 16-bit little-endian bytes through `std::io::Read`.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::peaks::BYTES_PER_SAMPLE;

/// Errors that can occur during audio file operations
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to open file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to probe audio format: {0}")]
    ProbeError(String),

    #[error("No audio tracks found")]
    NoTracks,

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Decoder error: {0}")]
    DecoderError(String),
}

/// Shape of the PCM stream produced by a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u32,
}

impl PcmFormat {
    /// Bytes of interleaved s16le audio per second
    pub fn average_bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * BYTES_PER_SAMPLE
    }
}

/// Decodes an audio file into interleaved s16le bytes
///
/// `read` fills as much of the caller's buffer as the file allows and
/// returns 0 once the stream is exhausted.
pub struct PcmReader {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    pcm_format: PcmFormat,
    /// Interleaved samples of the last decoded packet
    samples: Option<SampleBuffer<i16>>,
    /// `(frames, channels)` the sample buffer was sized for
    samples_shape: (u64, usize),
    /// Decoded bytes not yet handed out
    pending: Vec<u8>,
    pending_pos: usize,
    finished: bool,
}

impl PcmReader {
    /// Open and probe an audio file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        let file = File::open(path)?;

        // Create media source stream
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint from file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| FileError::ProbeError(e.to_string()))?;

        let format = probed.format;

        // Get the default track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(FileError::NoTracks)?;

        let codec_params = &track.codec_params;
        let pcm_format = PcmFormat {
            sample_rate: codec_params.sample_rate.unwrap_or(44100),
            channels: codec_params.channels.map(|c| c.count() as u32).unwrap_or(2),
        };
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => FileError::UnsupportedCodec(what.to_string()),
                other => FileError::DecoderError(other.to_string()),
            })?;

        log::info!(
            "Opened {:?}: {} Hz, {} channel(s)",
            path,
            pcm_format.sample_rate,
            pcm_format.channels
        );

        Ok(Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            pcm_format,
            samples: None,
            samples_shape: (0, 0),
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.pcm_format
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns false at end of stream.
    fn decode_next(&mut self) -> Result<bool, FileError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    log::warn!("Stream reset required in {:?}, stopping", self.path);
                    return Ok(false);
                }
                Err(e) => return Err(FileError::DecoderError(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(FileError::DecoderError(e.to_string())),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let shape = (decoded.capacity() as u64, spec.channels.count());
            if self.samples.is_none() || shape != self.samples_shape {
                self.samples = Some(SampleBuffer::new(shape.0, spec));
                self.samples_shape = shape;
            }

            if let Some(buf) = self.samples.as_mut() {
                buf.copy_interleaved_ref(decoded);
                self.pending.clear();
                self.pending_pos = 0;
                self.pending
                    .extend(buf.samples().iter().flat_map(|s| s.to_le_bytes()));
            }
            return Ok(true);
        }
    }
}

impl Read for PcmReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.pending_pos == self.pending.len() {
                if self.finished {
                    break;
                }
                match self.decode_next() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.finished = true;
                        break;
                    }
                    Err(FileError::IoError(e)) => return Err(e),
                    Err(e) => return Err(io::Error::other(e)),
                }
                continue;
            }

            let available = &self.pending[self.pending_pos..];
            let n = available.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&available[..n]);
            self.pending_pos += n;
            written += n;
        }
        Ok(written)
    }
}

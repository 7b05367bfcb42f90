//! Lock-free PCM byte ring between a decoder thread and the peak extractor
//!
//! Decoding compressed audio is usually slower than extracting peaks from it,
//! so the decoder can run on its own thread and push raw s16le bytes into a
//! SPSC ring buffer from the `ringbuf` crate. The extractor side reads whole
//! chunks out of the ring through `std::io::Read`.
//!
//! ## Design
//!
//! - The decoder thread is the single producer (pushes bytes)
//! - The overview builder is the single consumer (reads chunks)
//!
//! Two shared flags coordinate shutdown: `finished` is raised by the producer
//! after its last push, `running` is cleared when the consumer goes away so
//! the producer stops decoding.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

use super::file::{FileError, PcmReader};

/// Back-off while the ring is full or empty
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Size of the staging buffer the decoder thread reads into
const STAGING_BYTES: usize = 16 * 1024;

#[derive(Debug, Default)]
struct Shared {
    finished: AtomicBool,
    running: AtomicBool,
    bytes_written: AtomicU64,
}

/// Producer half of the ring (owned by the decoder thread)
pub struct PcmProducer {
    producer: ringbuf::HeapProd<u8>,
    shared: Arc<Shared>,
}

impl PcmProducer {
    /// Push all of `bytes`, waiting while the ring is full.
    ///
    /// Returns false if the consumer has gone away.
    pub fn push_all(&mut self, mut bytes: &[u8]) -> bool {
        while !bytes.is_empty() {
            if !self.shared.running.load(Ordering::Relaxed) {
                return false;
            }
            let n = self.producer.push_slice(bytes);
            if n == 0 {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            self.shared.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
            bytes = &bytes[n..];
        }
        true
    }

    /// Mark the stream complete; the consumer drains what is left and stops
    pub fn finish(&self) {
        self.shared.finished.store(true, Ordering::Release);
    }
}

impl Drop for PcmProducer {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Consumer half of the ring
pub struct PcmConsumer {
    consumer: ringbuf::HeapCons<u8>,
    shared: Arc<Shared>,
}

impl PcmConsumer {
    /// Total bytes pushed by the producer so far (for statistics)
    pub fn bytes_written(&self) -> u64 {
        self.shared.bytes_written.load(Ordering::Relaxed)
    }
}

impl Read for PcmConsumer {
    /// Blocks until `buf` is full or the producer has finished
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        loop {
            filled += self.consumer.pop_slice(&mut buf[filled..]);
            if filled == buf.len() {
                break;
            }
            if self.shared.finished.load(Ordering::Acquire) {
                // Anything pushed before `finish` is visible now
                filled += self.consumer.pop_slice(&mut buf[filled..]);
                if filled == buf.len() || self.consumer.is_empty() {
                    break;
                }
                continue;
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(filled)
    }
}

impl Drop for PcmConsumer {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
    }
}

/// Bounded byte ring split into producer and consumer halves
pub struct PcmRing;

impl PcmRing {
    /// Create a ring holding up to `capacity` bytes
    pub fn new(capacity: usize) -> (PcmProducer, PcmConsumer) {
        let rb = HeapRb::<u8>::new(capacity.max(1));
        let (prod, cons) = rb.split();

        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            ..Default::default()
        });

        (
            PcmProducer {
                producer: prod,
                shared: Arc::clone(&shared),
            },
            PcmConsumer {
                consumer: cons,
                shared,
            },
        )
    }
}

/// Decode `reader` on a background thread into a ring of `capacity` bytes.
///
/// The join handle yields the number of bytes decoded.
pub fn spawn_decoder(
    mut reader: PcmReader,
    capacity: usize,
) -> (PcmConsumer, thread::JoinHandle<Result<u64, FileError>>) {
    let (mut producer, consumer) = PcmRing::new(capacity);

    let handle = thread::spawn(move || -> Result<u64, FileError> {
        let mut staging = vec![0u8; STAGING_BYTES];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut staging)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if !producer.push_all(&staging[..n]) {
                log::debug!("Consumer dropped, stopping decoder after {} bytes", total);
                break;
            }
        }
        producer.finish();
        log::debug!("Decoder thread finished: {} bytes", total);
        Ok(total)
    });

    (consumer, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfers_all_bytes_in_order() {
        let (mut producer, mut consumer) = PcmRing::new(7);
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();

        let handle = thread::spawn(move || {
            for piece in data.chunks(33) {
                assert!(producer.push_all(piece));
            }
        });

        let mut received = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            let n = consumer.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&chunk[..n]);
        }
        handle.join().unwrap();

        assert_eq!(received, expected);
        assert_eq!(consumer.bytes_written(), 10_000);
    }

    #[test]
    fn test_short_final_read() {
        let (mut producer, mut consumer) = PcmRing::new(16);
        assert!(producer.push_all(&[1, 2, 3]));
        producer.finish();

        let mut chunk = [0u8; 8];
        assert_eq!(consumer.read(&mut chunk).unwrap(), 3);
        assert_eq!(&chunk[..3], &[1, 2, 3]);
        assert_eq!(consumer.read(&mut chunk).unwrap(), 0);
    }

    #[test]
    fn test_spawn_decoder_streams_file() {
        let path = std::env::temp_dir().join(format!("scope-peaks-{}-threaded.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 11025,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples: Vec<i16> = (0..20_000).map(|i| ((i * 131) % 4001 - 2000) as i16).collect();
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &s in &samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let reader = PcmReader::open(&path).unwrap();
        let (mut consumer, handle) = spawn_decoder(reader, 1000);
        let mut bytes = Vec::new();
        consumer.read_to_end(&mut bytes).unwrap();

        assert_eq!(handle.join().unwrap().unwrap(), 40_000);
        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(bytes, expected);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_dropped_consumer_stops_producer() {
        let (mut producer, consumer) = PcmRing::new(4);
        drop(consumer);
        assert!(!producer.push_all(&[0; 32]));
    }
}

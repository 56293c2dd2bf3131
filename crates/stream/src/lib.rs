//! Shared audio stream handle for wake-word observers.
//!
//! The capture engine pushes fixed-size chunks into a bounded rolling
//! window; keyword observers receive the handle on detection and snapshot
//! the most recent audio from it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Standard audio sample rate for detection and STT (16kHz).
pub const SAMPLE_RATE: u32 = 16000;

/// Duration of each audio chunk in milliseconds.
pub const CHUNK_DURATION_MS: u32 = 50;

/// Number of samples per chunk at the standard sample rate.
pub const CHUNK_SAMPLES: usize = (SAMPLE_RATE as usize * CHUNK_DURATION_MS as usize) / 1000;

/// Default rolling window in milliseconds.
pub const DEFAULT_WINDOW_MS: u32 = 1500;

/// Audio chunk with timestamp and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Monotonic sequence number for ordering.
    pub seq: u64,
    /// Timestamp in milliseconds (wall clock when chunk was captured).
    pub ts_ms: i64,
    /// Sample rate of the audio data.
    pub sample_rate: u32,
    /// Audio samples (shared ownership for zero-copy).
    pub samples: Arc<[f32]>,
}

impl AudioChunk {
    /// Duration of this chunk in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

struct Window {
    chunks: VecDeque<AudioChunk>,
    next_seq: u64,
    evicted: u64,
}

/// Bounded rolling window of recent audio, shared between the capture
/// engine and any number of observers.
pub struct AudioStream {
    window: Mutex<Window>,
    capacity: usize,
}

impl AudioStream {
    /// Stream with the default rolling window.
    pub fn new() -> Self {
        Self::with_window_ms(DEFAULT_WINDOW_MS)
    }

    /// Stream sized to hold roughly `window_ms` of chunked audio.
    pub fn with_window_ms(window_ms: u32) -> Self {
        let capacity = ((window_ms / CHUNK_DURATION_MS) as usize).max(8);
        Self {
            window: Mutex::new(Window {
                chunks: VecDeque::with_capacity(capacity),
                next_seq: 0,
                evicted: 0,
            }),
            capacity,
        }
    }

    /// Append samples as one chunk, evicting the oldest chunk when the
    /// window is full. Returns the assigned sequence number.
    pub fn push(&self, ts_ms: i64, sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> u64 {
        let mut window = self.window.lock().expect("audio stream mutex poisoned");
        let seq = window.next_seq;
        window.next_seq += 1;

        if window.chunks.len() >= self.capacity {
            window.chunks.pop_front();
            window.evicted += 1;
            // Rate-limit logging: eviction is the steady state once full.
            if window.evicted % 1000 == 1 {
                tracing::trace!(evicted = window.evicted, "audio window rolling");
            }
        }
        window.chunks.push_back(AudioChunk {
            seq,
            ts_ms,
            sample_rate,
            samples: samples.into(),
        });
        seq
    }

    /// Sequence number of the most recent chunk, if any.
    pub fn latest_seq(&self) -> Option<u64> {
        self.window
            .lock()
            .expect("audio stream mutex poisoned")
            .chunks
            .back()
            .map(|c| c.seq)
    }

    /// Copy of every chunk currently in the window, oldest first.
    pub fn snapshot(&self) -> Vec<AudioChunk> {
        self.window
            .lock()
            .expect("audio stream mutex poisoned")
            .chunks
            .iter()
            .cloned()
            .collect()
    }

    /// Chunks with `seq >= from_seq`, oldest first. Chunks already
    /// evicted from the window are gone; callers detect the gap by
    /// comparing the first returned seq against `from_seq`.
    pub fn snapshot_from(&self, from_seq: u64) -> Vec<AudioChunk> {
        self.window
            .lock()
            .expect("audio stream mutex poisoned")
            .chunks
            .iter()
            .filter(|c| c.seq >= from_seq)
            .cloned()
            .collect()
    }

    /// Number of chunks currently buffered.
    pub fn len(&self) -> usize {
        self.window
            .lock()
            .expect("audio stream mutex poisoned")
            .chunks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total chunks evicted from the window since creation.
    pub fn evicted(&self) -> u64 {
        self.window
            .lock()
            .expect("audio stream mutex poisoned")
            .evicted
    }

    /// Buffered audio duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.window
            .lock()
            .expect("audio stream mutex poisoned")
            .chunks
            .iter()
            .map(|c| c.duration_ms())
            .sum()
    }
}

impl Default for AudioStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_samples() -> Vec<f32> {
        vec![0.0; CHUNK_SAMPLES]
    }

    #[test]
    fn test_chunk_duration() {
        let stream = AudioStream::new();
        stream.push(0, 16000, vec![0.0f32; 1600]); // 100ms at 16kHz
        let snapshot = stream.snapshot();
        assert_eq!(snapshot[0].duration_ms(), 100);
    }

    #[test]
    fn test_sequence_monotonicity() {
        let stream = AudioStream::new();
        for i in 0..10 {
            let seq = stream.push(i * 50, 16000, chunk_samples());
            assert_eq!(seq, i as u64);
        }
        assert_eq!(stream.latest_seq(), Some(9));

        let mut last_seq = None;
        for chunk in stream.snapshot() {
            if let Some(last) = last_seq {
                assert!(chunk.seq > last, "sequence must be monotonic");
            }
            last_seq = Some(chunk.seq);
        }
    }

    #[test]
    fn test_window_eviction() {
        let stream = AudioStream::with_window_ms(400); // 8 chunks
        for i in 0..20 {
            stream.push(i * 50, 16000, chunk_samples());
        }

        assert_eq!(stream.len(), 8);
        assert_eq!(stream.evicted(), 12);
        // Oldest surviving chunk follows the evicted ones.
        assert_eq!(stream.snapshot()[0].seq, 12);
    }

    #[test]
    fn test_snapshot_from() {
        let stream = AudioStream::new();
        for i in 0..10 {
            stream.push(i * 50, 16000, chunk_samples());
        }

        let tail = stream.snapshot_from(7);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].seq, 7);
        assert_eq!(tail[2].seq, 9);
    }

    #[test]
    fn test_duration_tracks_window() {
        let stream = AudioStream::new();
        assert!(stream.is_empty());
        assert_eq!(stream.duration_ms(), 0);

        for i in 0..4 {
            stream.push(i * 50, 16000, chunk_samples());
        }
        assert_eq!(stream.duration_ms(), 200);
    }

    #[test]
    fn test_zero_copy_arc_sharing() {
        let stream = AudioStream::new();
        let samples: Arc<[f32]> = (0..CHUNK_SAMPLES)
            .map(|i| i as f32 / CHUNK_SAMPLES as f32)
            .collect::<Vec<_>>()
            .into();

        stream.push(0, 16000, samples.clone());

        let chunk = &stream.snapshot()[0];
        assert!(Arc::ptr_eq(&chunk.samples, &samples));
    }
}

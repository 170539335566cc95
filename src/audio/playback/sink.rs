//! Playback targets and the lip-sync tap.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use crate::error::VoiceError;

/// Failure reported by a playback sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink is transiently full; the same append may succeed later.
    #[error("playback buffer quota exceeded")]
    QuotaExceeded,
    #[error("playback sink is closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

impl From<SinkError> for VoiceError {
    fn from(error: SinkError) -> Self {
        match error {
            SinkError::QuotaExceeded => VoiceError::QuotaExceeded,
            other => VoiceError::Playback(other.to_string()),
        }
    }
}

/// An appendable, seekable playback buffer with a play clock. Times are in
/// seconds of audio.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Append encoded audio at the end of the buffered range.
    async fn append(&self, chunk: &[u8]) -> Result<(), SinkError>;

    /// End of the buffered range, or `None` while nothing is buffered.
    fn buffered_end(&self) -> Option<f64>;

    /// Current play position.
    fn current_time(&self) -> f64;

    /// Evict buffered audio in `[start, end)`.
    async fn remove(&self, start: f64, end: f64) -> Result<(), SinkError>;

    async fn play(&self) -> Result<(), SinkError>;

    /// No more input will follow.
    async fn end_of_stream(&self) -> Result<(), SinkError>;

    /// Total duration once known.
    fn duration(&self) -> Option<f64>;

    /// Pause, rewind to zero, and release buffered audio.
    fn stop(&self);
}

/// A downstream consumer of the playing audio, such as lip sync.
pub trait AudioTap: Send + Sync {
    fn connect(&self);
    fn disconnect(&self);
}

/// Default byte rate: 128 kbit/s MP3.
pub const DEFAULT_BYTES_PER_SECOND: f64 = 16_000.0;

#[derive(Debug, Default)]
struct MemoryState {
    appended: Vec<u8>,
    append_count: usize,
    /// Start of the retained range, in seconds.
    retained_from: f64,
    play_started: Option<Instant>,
    ended: bool,
    stopped: bool,
    max_ahead: f64,
}

/// In-memory sink that models the timeline from a fixed byte rate and plays
/// in real (tokio) time once started.
#[derive(Debug)]
pub struct MemoryPlaybackSink {
    bytes_per_second: f64,
    capacity: Option<usize>,
    state: Mutex<MemoryState>,
}

impl Default for MemoryPlaybackSink {
    fn default() -> Self {
        Self::new(DEFAULT_BYTES_PER_SECOND)
    }
}

impl MemoryPlaybackSink {
    pub fn new(bytes_per_second: f64) -> Self {
        Self {
            bytes_per_second: bytes_per_second.max(1.0),
            capacity: None,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Reject appends that would hold more than `bytes` unevicted bytes.
    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Every byte appended so far, in order.
    pub fn appended(&self) -> Vec<u8> {
        self.lock().appended.clone()
    }

    pub fn append_count(&self) -> usize {
        self.lock().append_count
    }

    /// Largest buffered-ahead span observed right after an append.
    pub fn max_observed_ahead(&self) -> f64 {
        self.lock().max_ahead
    }

    /// Start of the audio still held after evictions.
    pub fn retained_from(&self) -> f64 {
        self.lock().retained_from
    }

    pub fn is_playing(&self) -> bool {
        self.lock().play_started.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn seconds(&self, bytes: usize) -> f64 {
        bytes as f64 / self.bytes_per_second
    }

    fn position(&self, state: &MemoryState) -> f64 {
        let end = self.seconds(state.appended.len());
        state
            .play_started
            .map_or(0.0, |started| started.elapsed().as_secs_f64().min(end))
    }

    fn held_bytes(&self, state: &MemoryState) -> usize {
        let retained = (state.retained_from * self.bytes_per_second) as usize;
        state.appended.len().saturating_sub(retained)
    }
}

#[async_trait]
impl PlaybackSink for MemoryPlaybackSink {
    async fn append(&self, chunk: &[u8]) -> Result<(), SinkError> {
        let mut state = self.lock();
        if state.stopped || state.ended {
            return Err(SinkError::Closed);
        }
        if let Some(capacity) = self.capacity {
            if self.held_bytes(&state) + chunk.len() > capacity {
                return Err(SinkError::QuotaExceeded);
            }
        }
        state.appended.extend_from_slice(chunk);
        state.append_count += 1;
        let ahead = self.seconds(state.appended.len()) - self.position(&state);
        if ahead > state.max_ahead {
            state.max_ahead = ahead;
        }
        Ok(())
    }

    fn buffered_end(&self) -> Option<f64> {
        let state = self.lock();
        (!state.appended.is_empty()).then(|| self.seconds(state.appended.len()))
    }

    fn current_time(&self) -> f64 {
        let state = self.lock();
        self.position(&state)
    }

    async fn remove(&self, start: f64, end: f64) -> Result<(), SinkError> {
        if end <= start {
            return Err(SinkError::Other(format!("invalid range {start}..{end}")));
        }
        let mut state = self.lock();
        if state.stopped {
            return Err(SinkError::Closed);
        }
        let buffered_end = self.seconds(state.appended.len());
        if start <= state.retained_from {
            state.retained_from = state.retained_from.max(end.min(buffered_end));
        }
        Ok(())
    }

    async fn play(&self) -> Result<(), SinkError> {
        let mut state = self.lock();
        if state.stopped {
            return Err(SinkError::Closed);
        }
        if state.play_started.is_none() {
            state.play_started = Some(Instant::now());
        }
        Ok(())
    }

    async fn end_of_stream(&self) -> Result<(), SinkError> {
        let mut state = self.lock();
        if state.stopped {
            return Err(SinkError::Closed);
        }
        state.ended = true;
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        let state = self.lock();
        state.ended.then(|| self.seconds(state.appended.len()))
    }

    fn stop(&self) {
        let mut state = self.lock();
        state.stopped = true;
        state.play_started = None;
        state.retained_from = self.seconds(state.appended.len());
    }
}

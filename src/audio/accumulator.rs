//! Merging of inbound PCM fragments into flush-sized buffers.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Smallest accepted decoded audio fragment, in bytes.
pub const MIN_AUDIO_BUFFER_BYTES: usize = 1024;
/// Largest accepted decoded audio fragment, in bytes.
pub const MAX_AUDIO_BUFFER_BYTES: usize = 1024 * 1024;
/// Default flush threshold, in bytes.
pub const DEFAULT_BUFFER_THRESHOLD: usize = 100_000;

/// Receiver of merged audio buffers.
#[async_trait]
pub trait BufferSink: Send + Sync {
    async fn send(&self, buffer: Vec<u8>);
}

/// Accumulates binary chunks and forwards them to a [`BufferSink`] once the
/// merged size reaches the threshold.
pub struct ChunkAccumulator<S> {
    buffer: Vec<u8>,
    threshold: usize,
    sink: S,
}

impl<S: BufferSink> ChunkAccumulator<S> {
    pub fn new(sink: S) -> Self {
        Self::with_threshold(sink, DEFAULT_BUFFER_THRESHOLD)
    }

    pub fn with_threshold(sink: S, threshold: usize) -> Self {
        Self {
            buffer: Vec::new(),
            threshold,
            sink,
        }
    }

    /// Append a chunk, flushing when the threshold is reached.
    pub async fn add_data(&mut self, chunk: &[u8]) {
        tracing::trace!(bytes = chunk.len(), buffered = self.buffer.len(), "Adding audio chunk");
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() >= self.threshold {
            self.send_buffer().await;
        }
    }

    /// Hand the merged buffer to the sink and reset. No-op when empty.
    pub async fn send_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let buffer = std::mem::take(&mut self.buffer);
        tracing::debug!(bytes = buffer.len(), "Flushing accumulated audio");
        self.sink.send(buffer).await;
    }

    /// Deliver whatever is buffered regardless of threshold.
    pub async fn flush(&mut self) {
        self.send_buffer().await;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

/// Concatenate two byte sequences into a new buffer.
pub fn merge_buffers(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut merged = Vec::with_capacity(first.len() + second.len());
    merged.extend_from_slice(first);
    merged.extend_from_slice(second);
    merged
}

/// Whether a decoded fragment looks like intact 16-bit PCM.
pub fn validate_audio_buffer(buffer: &[u8]) -> bool {
    let len = buffer.len();
    if !(MIN_AUDIO_BUFFER_BYTES..=MAX_AUDIO_BUFFER_BYTES).contains(&len) {
        tracing::warn!(bytes = len, "Audio buffer size out of range");
        return false;
    }
    if len % 2 != 0 {
        tracing::warn!(bytes = len, "Audio buffer length is odd, expected 16-bit samples");
        return false;
    }
    true
}

/// Decode a base64 audio delta. Undecodable or invalid fragments come back
/// empty so they never reach playback.
pub fn decode_audio_base64(encoded: &str) -> Vec<u8> {
    match STANDARD.decode(encoded.trim()) {
        Ok(bytes) if validate_audio_buffer(&bytes) => bytes,
        Ok(_) => Vec::new(),
        Err(error) => {
            tracing::warn!(%error, "Audio delta is not valid base64");
            Vec::new()
        }
    }
}

/// Encode PCM bytes for an outbound message.
pub fn encode_audio_base64(pcm: &[u8]) -> String {
    STANDARD.encode(pcm)
}

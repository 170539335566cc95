//! Observable state of a playback session.

use std::time::Duration;

use bytes::Bytes;

/// Latency metrics, each measured from the moment the request started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingProgress {
    pub time_to_request_sent: Option<Duration>,
    pub time_to_first_chunk_arrived: Option<Duration>,
    pub time_to_first_playback: Option<Duration>,
    pub time_to_last_chunk_arrived: Option<Duration>,
    /// Seconds of audio reported by the sink after end of stream.
    pub total_audio_duration: Option<f64>,
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingStatus {
    pub is_streaming: bool,
    pub progress: StreamingProgress,
    pub error: Option<String>,
    /// Every received chunk in arrival order, set once the stream ends.
    pub audio_blob: Option<Bytes>,
}

impl StreamingStatus {
    /// Status of a session that has just started.
    pub fn started(time_to_request_sent: Option<Duration>) -> Self {
        Self {
            is_streaming: true,
            progress: StreamingProgress {
                time_to_request_sent,
                ..StreamingProgress::default()
            },
            ..Self::default()
        }
    }

    /// Whether the session has stopped, successfully or not.
    pub fn is_finished(&self) -> bool {
        !self.is_streaming
    }
}

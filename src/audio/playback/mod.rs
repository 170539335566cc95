//! Streaming playback of chunked synthesized audio.

pub mod pipeline;
pub mod sink;
pub mod status;
pub mod synthesis;

pub use pipeline::{ChunkStream, PlaybackConfig, PlaybackSession, PlaybackTarget, RequestTiming};
pub use sink::{AudioTap, MemoryPlaybackSink, PlaybackSink, SinkError};
pub use status::{StreamingProgress, StreamingStatus};
pub use synthesis::{
    AivisCloudStreamingProvider, SpeakerStyle, SpeechStreamProvider, StreamingSpeaker,
    SynthesisRequest,
};

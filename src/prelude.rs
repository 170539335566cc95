//! Convenience re-exports for common use.

pub use crate::audio::accumulator::{BufferSink, ChunkAccumulator};
pub use crate::audio::playback::{
    AudioTap, MemoryPlaybackSink, PlaybackConfig, PlaybackSession, PlaybackSink, PlaybackTarget,
    SpeechStreamProvider, StreamingSpeaker, StreamingStatus, SynthesisRequest,
};
#[cfg(feature = "realtime")]
pub use crate::audio::realtime::{
    RealtimeConfiguration, RealtimeSession, SessionEvent, SessionEventHandler,
};
pub use crate::config::VoiceConfig;
pub use crate::error::{Result, VoiceError};
pub use crate::tools::{FunctionTool, Tool, ToolArguments, ToolParameters, ToolRegistry};

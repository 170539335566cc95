//! Audio capabilities: chunk accumulation, streaming playback, and realtime
//! sessions.

pub mod accumulator;
pub mod playback;
#[cfg(feature = "realtime")]
pub mod realtime;
pub mod types;

pub use accumulator::{BufferSink, ChunkAccumulator};
pub use types::*;

//! avatar-voice: realtime audio streaming core for a virtual-avatar chat.
//!
//! Three pieces, each usable on its own:
//!
//! - [`audio::accumulator`] merges PCM fragments into flush-sized buffers.
//! - [`audio::realtime`] keeps one WebSocket session to a realtime model
//!   endpoint, performs the handshake, dispatches inbound messages, and
//!   bridges remote tool calls to a [`tools::ToolRegistry`].
//! - [`audio::playback`] plays a chunked speech-synthesis response while it
//!   downloads, with bounded look-ahead, eviction, and latency metrics.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use avatar_voice::prelude::*;
//!
//! # async fn example() -> avatar_voice::error::Result<()> {
//! let provider = VoiceConfig::from_env().aivis_provider()?;
//! let speaker = StreamingSpeaker::new(Arc::new(provider));
//! let request = SynthesisRequest::builder()
//!     .model_uuid("a59cb814-0083-4369-8542-f51a29e72af7")
//!     .text("こんにちは")
//!     .build();
//! let sink = Arc::new(MemoryPlaybackSink::default());
//! let session = speaker.speak(&request, PlaybackTarget::new(sink)).await;
//! let status = session.wait().await;
//! println!("{:?}", status.progress);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod prelude;
pub mod tools;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

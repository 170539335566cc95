//! Audio-related types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Audio encoding exchanged with remote endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AudioFormat {
    /// 16-bit little-endian PCM.
    Pcm16,
    G711Ulaw,
    G711Alaw,
    Mp3,
}

impl AudioFormat {
    /// MIME type used when handing the bytes to a playback sink.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pcm16 => "audio/pcm",
            Self::G711Ulaw => "audio/basic",
            Self::G711Alaw => "audio/x-alaw-basic",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Voice selection for realtime sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
}

impl Voice {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new("shimmer")
    }
}

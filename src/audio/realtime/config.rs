//! Realtime session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::audio::accumulator::DEFAULT_BUFFER_THRESHOLD;
use crate::audio::types::{AudioFormat, Voice};
use crate::error::VoiceError;

pub const DEFAULT_OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Which realtime service the session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RealtimeProvider {
    #[default]
    OpenAi,
    Azure,
}

/// Configuration for a realtime audio session.
#[derive(Debug, Clone)]
pub struct RealtimeConfiguration {
    /// Collaborator switch; a disabled session never connects.
    pub enabled: bool,
    pub provider: RealtimeProvider,
    pub api_key: Option<String>,
    /// WebSocket base URL for OpenAI.
    pub base_url: String,
    /// Full Azure deployment URL, including its query string.
    pub azure_endpoint: Option<String>,
    pub model: String,
    pub voice: Voice,
    /// System prompt sent as session instructions.
    pub instructions: String,
    pub input_format: AudioFormat,
    pub output_format: AudioFormat,
    pub transcription_model: String,
    pub turn_detection: bool,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub tool_choice: String,
    /// Accumulator flush threshold in bytes.
    pub buffer_threshold: usize,
    pub heartbeat_interval: Duration,
    /// Minimum spacing between watchdog reconnects.
    pub reconnect_cooldown: Duration,
}

impl Default for RealtimeConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: RealtimeProvider::OpenAi,
            api_key: None,
            base_url: DEFAULT_OPENAI_REALTIME_URL.to_string(),
            azure_endpoint: None,
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: Voice::default(),
            instructions: String::new(),
            input_format: AudioFormat::Pcm16,
            output_format: AudioFormat::Pcm16,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            turn_detection: false,
            temperature: 0.8,
            max_output_tokens: 4096,
            tool_choice: "auto".to_string(),
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
            heartbeat_interval: Duration::from_secs(30),
            reconnect_cooldown: Duration::from_secs(2),
        }
    }
}

impl RealtimeConfiguration {
    /// Whether enough is configured to attempt a connection.
    pub fn is_enabled(&self) -> bool {
        if !self.enabled || self.api_key().is_none() {
            return false;
        }
        match self.provider {
            RealtimeProvider::OpenAi => true,
            RealtimeProvider::Azure => self
                .azure_endpoint
                .as_deref()
                .is_some_and(|endpoint| !endpoint.trim().is_empty()),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// URL and headers for the transport handshake.
    pub fn connect_request(&self) -> Result<ConnectRequest, VoiceError> {
        let api_key = self
            .api_key()
            .ok_or_else(|| VoiceError::Authentication(format!("Missing {} API key", self.provider)))?;

        match self.provider {
            RealtimeProvider::OpenAi => {
                let base = self.base_url.trim();
                if base.is_empty() {
                    return Err(VoiceError::Configuration(
                        "Realtime base URL cannot be empty".into(),
                    ));
                }
                let separator = if base.contains('?') { '&' } else { '?' };
                Ok(ConnectRequest {
                    url: format!("{base}{separator}model={}", self.model),
                    headers: vec![
                        ("Authorization".into(), format!("Bearer {api_key}")),
                        ("OpenAI-Beta".into(), "realtime=v1".into()),
                    ],
                })
            }
            RealtimeProvider::Azure => {
                let endpoint = self
                    .azure_endpoint
                    .as_deref()
                    .map(str::trim)
                    .filter(|endpoint| !endpoint.is_empty())
                    .ok_or_else(|| {
                        VoiceError::Configuration("Azure realtime endpoint is not set".into())
                    })?;
                Ok(ConnectRequest {
                    url: format!("{endpoint}&api-key={api_key}"),
                    headers: Vec::new(),
                })
            }
        }
    }
}

/// Everything a connector needs to open the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

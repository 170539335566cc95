//! Optional TOML settings file, the lowest configuration layer.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VoiceError;

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Contents of `settings.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub realtime: RealtimeSettings,
    pub playback: PlaybackSettings,
}

/// `[realtime]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// `openai` or `azure`.
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub azure_endpoint: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub transcription_model: Option<String>,
    pub turn_detection: Option<bool>,
    pub buffer_threshold: Option<usize>,
    pub reconnect_cooldown_ms: Option<u64>,
}

/// `[playback]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub base_url: Option<String>,
    pub max_buffer_ahead_secs: Option<f64>,
    pub cleanup_margin_secs: Option<f64>,
    pub poll_interval_ms: Option<u64>,
    pub quota_retry_delay_ms: Option<u64>,
}

impl SettingsFile {
    /// Parse a settings file.
    pub fn load(path: &Path) -> Result<Self, VoiceError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
            .map_err(|error| VoiceError::Configuration(format!("{}: {error}", path.display())))
    }

    /// Load the file at [`SettingsFile::default_path`], if there is one.
    pub fn load_default() -> Result<Option<Self>, VoiceError> {
        let path = Self::default_path();
        match fs::read_to_string(&path) {
            Ok(raw) => Self::parse(&raw).map(Some).map_err(|error| {
                VoiceError::Configuration(format!("{}: {error}", path.display()))
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(VoiceError::Io(error)),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Write the settings, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), VoiceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string(self)
            .map_err(|error| VoiceError::Configuration(format!("Cannot encode settings: {error}")))?;
        fs::write(path, serialized)?;
        Ok(())
    }

    /// `~/.avatar-voice/settings.toml`, or a relative fallback without a home
    /// directory.
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".avatar-voice"))
            .unwrap_or_else(|| PathBuf::from(".avatar-voice"))
            .join(SETTINGS_FILE_NAME)
    }
}

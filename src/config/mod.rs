//! Configuration system (layered: code > env > settings file).

pub mod file;

pub use file::{PlaybackSettings, RealtimeSettings, SettingsFile};

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use crate::audio::playback::{AivisCloudStreamingProvider, PlaybackConfig};
use crate::error::VoiceError;

/// Global default config (lazy-initialized from env and the settings file).
static DEFAULT_CONFIG: OnceLock<VoiceConfig> = OnceLock::new();

pub const PROVIDER_OPENAI: &str = "openai";
pub const PROVIDER_AZURE: &str = "azure";
pub const PROVIDER_AIVIS: &str = "aivis";

/// Layered configuration.
///
/// Credentials and endpoints set in code or read from the environment take
/// precedence over values from the settings file.
#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    settings: SettingsFile,
}

impl VoiceConfig {
    /// Empty config with no settings file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `settings` as the file layer.
    pub fn with_settings(mut self, settings: SettingsFile) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SettingsFile {
        &self.settings
    }

    /// Load `.env`, the environment, and the default settings file.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let settings = match SettingsFile::load_default() {
            Ok(settings) => settings.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(%error, "Ignoring unreadable settings file");
                SettingsFile::default()
            }
        };
        let config = Self::new().with_settings(settings);

        let env_mappings = [
            ("OPENAI_API_KEY", PROVIDER_OPENAI),
            ("AZURE_OPENAI_REALTIME_KEY", PROVIDER_AZURE),
            ("AIVIS_API_KEY", PROVIDER_AIVIS),
        ];
        for (env_var, provider) in &env_mappings {
            if let Ok(key) = std::env::var(env_var) {
                config.set_api_key(provider, key);
            }
        }

        let url_mappings = [
            ("OPENAI_REALTIME_BASE_URL", PROVIDER_OPENAI),
            ("AZURE_OPENAI_REALTIME_ENDPOINT", PROVIDER_AZURE),
            ("AIVIS_BASE_URL", PROVIDER_AIVIS),
        ];
        for (env_var, provider) in &url_mappings {
            if let Ok(url) = std::env::var(env_var) {
                config.set_base_url(provider, url);
            }
        }

        config
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static VoiceConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        self.api_keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(provider.to_string(), key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys
            .read()
            .ok()?
            .get(provider)
            .filter(|key| !key.trim().is_empty())
            .cloned()
    }

    pub fn has_credentials(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_some()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        self.base_urls
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(provider.to_string(), url);
    }

    /// Endpoint override for a provider, falling back to the settings file.
    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        let explicit = self
            .base_urls
            .read()
            .ok()
            .and_then(|urls| urls.get(provider).cloned());
        explicit.or_else(|| match provider {
            PROVIDER_OPENAI => self.settings.realtime.base_url.clone(),
            PROVIDER_AZURE => self.settings.realtime.azure_endpoint.clone(),
            PROVIDER_AIVIS => self.settings.playback.base_url.clone(),
            _ => None,
        })
    }

    /// Playback limits from the settings file over the defaults.
    pub fn playback_config(&self) -> PlaybackConfig {
        let settings = &self.settings.playback;
        let defaults = PlaybackConfig::default();
        PlaybackConfig {
            max_buffer_ahead: settings
                .max_buffer_ahead_secs
                .and_then(seconds)
                .unwrap_or(defaults.max_buffer_ahead),
            cleanup_margin: settings
                .cleanup_margin_secs
                .and_then(seconds)
                .unwrap_or(defaults.cleanup_margin),
            poll_interval: settings
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            quota_retry_delay: settings
                .quota_retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.quota_retry_delay),
        }
    }

    /// Aivis Cloud synthesis provider using the configured key and endpoint.
    pub fn aivis_provider(&self) -> Result<AivisCloudStreamingProvider, VoiceError> {
        let api_key = self
            .get_api_key(PROVIDER_AIVIS)
            .ok_or_else(|| VoiceError::Authentication("Missing AIVIS_API_KEY".into()))?;
        Ok(match self.get_base_url(PROVIDER_AIVIS) {
            Some(base_url) => AivisCloudStreamingProvider::new_with_base_url(api_key, base_url),
            None => AivisCloudStreamingProvider::new(api_key),
        })
    }
}

#[cfg(feature = "realtime")]
impl VoiceConfig {
    /// Realtime session configuration for the provider selected in the
    /// settings file (OpenAI unless set to `azure`).
    pub fn realtime_configuration(
        &self,
    ) -> Result<crate::audio::realtime::RealtimeConfiguration, VoiceError> {
        use crate::audio::realtime::{RealtimeConfiguration, RealtimeProvider};
        use crate::audio::types::Voice;

        let settings = &self.settings.realtime;
        let provider = match settings.provider.as_deref() {
            Some(name) => name.parse::<RealtimeProvider>().map_err(|_| {
                VoiceError::Configuration(format!("Unknown realtime provider '{name}'"))
            })?,
            None => RealtimeProvider::default(),
        };
        let defaults = RealtimeConfiguration::default();

        let mut config = RealtimeConfiguration {
            provider,
            model: settings.model.clone().unwrap_or(defaults.model.clone()),
            voice: settings.voice.clone().map(Voice::new).unwrap_or_default(),
            instructions: settings.system_prompt.clone().unwrap_or_default(),
            temperature: settings.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: settings
                .max_output_tokens
                .unwrap_or(defaults.max_output_tokens),
            transcription_model: settings
                .transcription_model
                .clone()
                .unwrap_or(defaults.transcription_model.clone()),
            turn_detection: settings.turn_detection.unwrap_or(defaults.turn_detection),
            buffer_threshold: settings.buffer_threshold.unwrap_or(defaults.buffer_threshold),
            reconnect_cooldown: settings
                .reconnect_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_cooldown),
            ..defaults
        };

        match provider {
            RealtimeProvider::OpenAi => {
                config.api_key = self.get_api_key(PROVIDER_OPENAI);
                if let Some(base_url) = self.get_base_url(PROVIDER_OPENAI) {
                    config.base_url = base_url;
                }
            }
            RealtimeProvider::Azure => {
                config.api_key = self.get_api_key(PROVIDER_AZURE);
                config.azure_endpoint = self.get_base_url(PROVIDER_AZURE);
            }
        }
        Ok(config)
    }
}

fn seconds(value: f64) -> Option<Duration> {
    (value.is_finite() && value >= 0.0).then(|| Duration::from_secs_f64(value))
}

//! Tests for configuration system.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use avatar_voice::config::{
    SettingsFile, VoiceConfig, PROVIDER_AIVIS, PROVIDER_AZURE, PROVIDER_OPENAI,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 7] = [
    "HOME",
    "OPENAI_API_KEY",
    "AZURE_OPENAI_REALTIME_KEY",
    "AIVIS_API_KEY",
    "OPENAI_REALTIME_BASE_URL",
    "AZURE_OPENAI_REALTIME_ENDPOINT",
    "AIVIS_BASE_URL",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clear every variable the loader reads and point the home directory at a
/// fresh temp dir so no real settings file leaks in.
fn isolated_env() -> (EnvGuard, TempDir) {
    let guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    let home = tempfile::tempdir().expect("temp home");
    std::env::set_var("HOME", home.path());
    (guard, home)
}

#[test]
fn from_env_reads_keys_and_endpoints() {
    let _lock = env_lock_guard();
    let (_guard, _home) = isolated_env();
    std::env::set_var("OPENAI_API_KEY", "sk-test");
    std::env::set_var("AIVIS_API_KEY", "aivis-test");
    std::env::set_var("AZURE_OPENAI_REALTIME_ENDPOINT", "wss://azure.example/realtime?deployment=x");

    let config = VoiceConfig::from_env();

    assert_eq!(config.get_api_key(PROVIDER_OPENAI).as_deref(), Some("sk-test"));
    assert_eq!(config.get_api_key(PROVIDER_AIVIS).as_deref(), Some("aivis-test"));
    assert!(!config.has_credentials(PROVIDER_AZURE));
    assert_eq!(
        config.get_base_url(PROVIDER_AZURE).as_deref(),
        Some("wss://azure.example/realtime?deployment=x")
    );
    assert_eq!(config.settings(), &SettingsFile::default());
}

#[test]
fn from_env_layers_environment_over_settings_file() {
    let _lock = env_lock_guard();
    let (_guard, home) = isolated_env();
    let mut settings = SettingsFile::default();
    settings.realtime.base_url = Some("wss://from-file/v1/realtime".into());
    settings.playback.base_url = Some("https://tts-from-file/v1".into());
    settings.playback.cleanup_margin_secs = Some(4.0);
    settings
        .save(&home.path().join(".avatar-voice").join("settings.toml"))
        .expect("settings should save");
    std::env::set_var("AIVIS_BASE_URL", "https://tts-from-env/v1");

    let config = VoiceConfig::from_env();

    assert_eq!(
        config.get_base_url(PROVIDER_OPENAI).as_deref(),
        Some("wss://from-file/v1/realtime")
    );
    assert_eq!(
        config.get_base_url(PROVIDER_AIVIS).as_deref(),
        Some("https://tts-from-env/v1")
    );
    assert_eq!(config.playback_config().cleanup_margin, Duration::from_secs(4));
}

#[test]
fn unreadable_settings_file_falls_back_to_defaults() {
    let _lock = env_lock_guard();
    let (_guard, home) = isolated_env();
    let dir = home.path().join(".avatar-voice");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("settings.toml"), "[realtime\nbroken").unwrap();

    let config = VoiceConfig::from_env();

    assert_eq!(config.settings(), &SettingsFile::default());
}

#[test]
fn blank_keys_count_as_missing() {
    let config = VoiceConfig::new();
    config.set_api_key(PROVIDER_OPENAI, "   ".into());

    assert_eq!(config.get_api_key(PROVIDER_OPENAI), None);
    assert!(!config.has_credentials(PROVIDER_OPENAI));
}

#[test]
fn clones_share_credentials() {
    let config = VoiceConfig::new();
    let clone = config.clone();

    config.set_api_key(PROVIDER_AIVIS, "shared".into());

    assert_eq!(clone.get_api_key(PROVIDER_AIVIS).as_deref(), Some("shared"));
}

#[test]
fn aivis_provider_requires_a_key() {
    let config = VoiceConfig::new();
    assert!(config.aivis_provider().is_err());

    config.set_api_key(PROVIDER_AIVIS, "key".into());
    assert!(config.aivis_provider().is_ok());
}

#[test]
fn playback_config_ignores_invalid_durations() {
    let settings = SettingsFile::parse(
        r#"
        [playback]
        max_buffer_ahead_secs = -3.0
        poll_interval_ms = 50
        "#,
    )
    .expect("settings should parse");

    let playback = VoiceConfig::new().with_settings(settings).playback_config();

    assert_eq!(playback.max_buffer_ahead, Duration::from_secs(90));
    assert_eq!(playback.poll_interval, Duration::from_millis(50));
    assert_eq!(playback.quota_retry_delay, Duration::from_millis(500));
}

#[cfg(feature = "realtime")]
mod realtime {
    use super::*;
    use avatar_voice::audio::realtime::RealtimeProvider;
    use pretty_assertions::assert_eq;
    use avatar_voice::error::VoiceError;

    #[test]
    fn settings_file_shapes_the_realtime_session() {
        let settings = SettingsFile::parse(
            r#"
            [realtime]
            voice = "alloy"
            system_prompt = "You are a friendly avatar."
            turn_detection = true
            buffer_threshold = 32000
            reconnect_cooldown_ms = 750
            "#,
        )
        .expect("settings should parse");
        let config = VoiceConfig::new().with_settings(settings);
        config.set_api_key(PROVIDER_OPENAI, "sk-test".into());

        let realtime = config.realtime_configuration().expect("config should build");

        assert_eq!(realtime.provider, RealtimeProvider::OpenAi);
        assert_eq!(realtime.voice.id, "alloy");
        assert_eq!(realtime.instructions, "You are a friendly avatar.");
        assert!(realtime.turn_detection);
        assert_eq!(realtime.buffer_threshold, 32_000);
        assert_eq!(realtime.reconnect_cooldown, Duration::from_millis(750));
        assert_eq!(realtime.api_key.as_deref(), Some("sk-test"));
        assert!(realtime.is_enabled());
    }

    #[test]
    fn azure_provider_uses_azure_key_and_endpoint() {
        let settings = SettingsFile::parse("[realtime]\nprovider = \"azure\"\n").unwrap();
        let config = VoiceConfig::new().with_settings(settings);
        config.set_api_key(PROVIDER_OPENAI, "sk-openai".into());
        config.set_api_key(PROVIDER_AZURE, "azure-key".into());
        config.set_base_url(PROVIDER_AZURE, "wss://azure.example/realtime?deployment=x".into());

        let realtime = config.realtime_configuration().unwrap();
        let request = realtime.connect_request().unwrap();

        assert_eq!(realtime.provider, RealtimeProvider::Azure);
        assert_eq!(
            request.url,
            "wss://azure.example/realtime?deployment=x&api-key=azure-key"
        );
        assert!(request.headers.is_empty());
    }

    #[test]
    fn unknown_provider_is_a_configuration_error() {
        let settings = SettingsFile::parse("[realtime]\nprovider = \"bedrock\"\n").unwrap();
        let result = VoiceConfig::new()
            .with_settings(settings)
            .realtime_configuration();

        assert!(matches!(result, Err(VoiceError::Configuration(message)) if message.contains("bedrock")));
    }

    #[test]
    fn missing_key_leaves_session_disabled() {
        let realtime = VoiceConfig::new().realtime_configuration().unwrap();
        assert!(!realtime.is_enabled());
    }
}

//! Streaming speech synthesis feeding a playback session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use futures::StreamExt;
use serde::Serialize;
use tokio::time::Instant;

use super::pipeline::{ChunkStream, PlaybackConfig, PlaybackSession, PlaybackTarget, RequestTiming};
use crate::error::VoiceError;
use crate::util::http::{bearer_headers, shared_client, status_to_error};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

pub const DEFAULT_AIVIS_BASE_URL: &str = "https://api.aivis-project.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Speaker style, by name or by numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerStyle {
    StyleName(String),
    StyleId(u32),
}

impl Default for SpeakerStyle {
    fn default() -> Self {
        Self::StyleId(0)
    }
}

/// One utterance to synthesize.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SynthesisRequest {
    #[builder(into)]
    pub model_uuid: String,
    #[builder(into)]
    pub text: String,
    #[builder(default)]
    pub style: SpeakerStyle,
    #[builder(default = 1.0)]
    pub speaking_rate: f64,
    #[builder(default = 0.0)]
    pub pitch: f64,
    #[builder(default = 1.0)]
    pub emotional_intensity: f64,
    #[builder(default = 1.0)]
    pub tempo_dynamics_scale: f64,
    #[builder(default = 0.1)]
    pub pre_phoneme_length: f64,
    #[builder(default = 0.1)]
    pub post_phoneme_length: f64,
}

/// Opens a chunked audio stream for a request.
#[async_trait]
pub trait SpeechStreamProvider: Send + Sync {
    /// Resolve once the response has started; chunks follow on the stream.
    async fn open_stream(&self, request: &SynthesisRequest) -> Result<ChunkStream, VoiceError>;
}

#[derive(Debug, Serialize)]
struct AivisSynthesisBody<'a> {
    model_uuid: &'a str,
    text: &'a str,
    use_ssml: bool,
    speaking_rate: f64,
    pitch: f64,
    emotional_intensity: f64,
    tempo_dynamics_scale: f64,
    pre_phoneme_length: f64,
    post_phoneme_length: f64,
    output_format: &'static str,
    output_sampling_rate: u32,
    output_audio_channels: &'static str,
    #[serde(flatten)]
    style: &'a SpeakerStyle,
}

impl<'a> From<&'a SynthesisRequest> for AivisSynthesisBody<'a> {
    fn from(request: &'a SynthesisRequest) -> Self {
        Self {
            model_uuid: &request.model_uuid,
            text: &request.text,
            use_ssml: true,
            speaking_rate: request.speaking_rate,
            pitch: request.pitch,
            emotional_intensity: request.emotional_intensity,
            tempo_dynamics_scale: request.tempo_dynamics_scale,
            pre_phoneme_length: request.pre_phoneme_length,
            post_phoneme_length: request.post_phoneme_length,
            output_format: "mp3",
            output_sampling_rate: 44_100,
            output_audio_channels: "mono",
            style: &request.style,
        }
    }
}

/// Aivis Cloud streaming synthesis (`/tts/synthesize`), MP3 output.
#[derive(Debug, Clone)]
pub struct AivisCloudStreamingProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl AivisCloudStreamingProvider {
    pub fn new(api_key: String) -> Self {
        Self::new_with_base_url(api_key, DEFAULT_AIVIS_BASE_URL)
    }

    pub fn new_with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Bound on the time until response headers arrive.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn validate(&self, request: &SynthesisRequest) -> Result<(), VoiceError> {
        if self.api_key.trim().is_empty() {
            return Err(VoiceError::Authentication(
                "Missing Aivis API key for speech synthesis".to_string(),
            ));
        }
        if request.model_uuid.trim().is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Synthesis model UUID cannot be empty".to_string(),
            ));
        }
        if request.text.trim().is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Synthesis text cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn open_once(&self, request: &SynthesisRequest) -> Result<ChunkStream, VoiceError> {
        let url = format!("{}/tts/synthesize", self.base_url.trim_end_matches('/'));
        let body = AivisSynthesisBody::from(request);

        let response = with_timeout(self.timeout, async {
            shared_client()
                .post(url)
                .headers(bearer_headers(&self.api_key))
                .json(&body)
                .send()
                .await
                .map_err(VoiceError::from)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|error| VoiceError::Stream(error.to_string())))
            .boxed())
    }
}

#[async_trait]
impl SpeechStreamProvider for AivisCloudStreamingProvider {
    async fn open_stream(&self, request: &SynthesisRequest) -> Result<ChunkStream, VoiceError> {
        self.validate(request)?;
        self.retry_policy.execute(|| self.open_once(request)).await
    }
}

/// Sends synthesis requests and plays the results as they stream in.
#[derive(Clone)]
pub struct StreamingSpeaker {
    provider: Arc<dyn SpeechStreamProvider>,
    config: PlaybackConfig,
}

impl StreamingSpeaker {
    pub fn new(provider: Arc<dyn SpeechStreamProvider>) -> Self {
        Self {
            provider,
            config: PlaybackConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Request synthesis and start playback. A failed request yields a
    /// session whose status already carries the error.
    pub async fn speak(&self, request: &SynthesisRequest, target: PlaybackTarget) -> PlaybackSession {
        let started_at = Instant::now();
        tracing::debug!(chars = request.text.chars().count(), "Requesting streaming synthesis");
        let result = self.provider.open_stream(request).await;
        let timing = RequestTiming {
            started_at,
            request_sent: Some(started_at.elapsed()),
        };

        match result {
            Ok(stream) => PlaybackSession::start(stream, target, self.config.clone(), timing),
            Err(error) => {
                tracing::warn!(%error, "Streaming synthesis request failed");
                PlaybackSession::failed(&error, timing)
            }
        }
    }
}

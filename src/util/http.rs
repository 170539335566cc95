//! Shared HTTP client and status mapping.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{ErrorDetails, VoiceError};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout is set: synthesis responses are streamed for as
/// long as the remote keeps producing audio. Callers bound the time to the
/// first response byte instead.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "Falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// Build default headers for a Bearer-token JSON API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}

/// Map a non-success HTTP status and body to a typed error.
pub fn status_to_error(status: u16, body: &str) -> VoiceError {
    match status {
        401 | 403 => VoiceError::Authentication(error_message(body)),
        429 => VoiceError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => match extract_error_details(body) {
            Some(details) => {
                let message = details.message.clone().unwrap_or_else(|| body.to_string());
                VoiceError::api_with_details(status, message, details)
            }
            None => VoiceError::api(status, body),
        },
    }
}

fn error_message(body: &str) -> String {
    extract_error_details(body)
        .and_then(|details| details.message)
        .unwrap_or_else(|| body.to_string())
}

/// Accepts both `{"error": {...}}` and `{"detail": "..."}` shaped bodies.
fn extract_error_details(body: &str) -> Option<ErrorDetails> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(error) = value.get("error").filter(|error| error.is_object()) {
        return serde_json::from_value(error.clone()).ok();
    }
    value
        .get("detail")
        .and_then(|detail| detail.as_str())
        .map(|detail| ErrorDetails {
            message: Some(detail.to_string()),
            ..ErrorDetails::default()
        })
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("retry_after"))
                .and_then(|seconds| seconds.as_f64())
                .map(|seconds| (seconds * 1000.0) as u64)
        })
}

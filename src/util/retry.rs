//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::VoiceError;

/// Retry policy for requests that have not started streaming yet.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_backoff.as_secs_f64()))
    }

    /// Execute an async operation, retrying retryable errors.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, VoiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VoiceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = jittered(self.backoff_for(attempt));
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Scale a delay to 75%..125% using random bits from a v4 UUID.
fn jittered(delay: Duration) -> Duration {
    let bits = uuid::Uuid::new_v4().as_u128() as u16;
    let factor = 0.75 + (f64::from(bits) / f64::from(u16::MAX)) * 0.5;
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(9), Duration::from_millis(300));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..64 {
            let delay = jittered(Duration::from_millis(1000)).as_millis();
            assert!((750..=1250).contains(&delay), "delay {delay} out of range");
        }
    }
}

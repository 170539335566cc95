//! Tests for utility modules (retry, timeout, status mapping).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use avatar_voice::error::VoiceError;
use avatar_voice::util::http::status_to_error;
use avatar_voice::util::retry::RetryPolicy;
use avatar_voice::util::timeout::with_timeout;

#[tokio::test(start_paused = true)]
async fn retry_policy_retries_retryable_errors_until_success() {
    let policy = RetryPolicy {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(100),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_task = attempts.clone();

    let task = tokio::spawn(async move {
        policy
            .execute(|| {
                let attempts = attempts_for_task.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(VoiceError::Timeout(100))
                    } else {
                        Ok::<_, VoiceError>("ok")
                    }
                }
            })
            .await
    });

    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let result = task.await.unwrap();

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_stops_immediately_for_non_retryable_errors() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(VoiceError::Authentication("bad-key".to_string()))
            }
        })
        .await;

    match result {
        Err(VoiceError::Authentication(message)) => assert_eq!(message, "bad-key"),
        other => panic!("expected authentication error, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_returns_last_error_when_attempts_are_exhausted() {
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(50),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_task = attempts.clone();

    let task = tokio::spawn(async move {
        policy
            .execute(|| {
                let attempts = attempts_for_task.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(VoiceError::RateLimited {
                        retry_after_ms: None,
                    })
                }
            })
            .await
    });

    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let result = task.await.unwrap();

    match result {
        Err(VoiceError::RateLimited { retry_after_ms }) => assert_eq!(retry_after_ms, None),
        other => panic!("expected rate limit error, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_with_zero_attempts_still_runs_once() {
    let policy = RetryPolicy {
        max_attempts: 0,
        ..RetryPolicy::none()
    };
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok::<_, VoiceError>(())
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

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
    assert_eq!(policy.backoff_for(4), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn with_timeout_reports_elapsed_budget() {
    let result = with_timeout(Duration::from_millis(250), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, VoiceError>(())
    })
    .await;

    assert!(matches!(result, Err(VoiceError::Timeout(250))));
}

#[tokio::test]
async fn with_timeout_passes_through_inner_result() {
    let result = with_timeout(Duration::from_secs(1), async {
        Err::<(), _>(VoiceError::Authentication("denied".into()))
    })
    .await;

    assert!(matches!(result, Err(VoiceError::Authentication(_))));
}

#[test]
fn server_error_status_is_retryable() {
    let error = status_to_error(502, "bad gateway");
    assert!(error.is_retryable());
    assert!(error.to_string().contains("bad gateway"));
}

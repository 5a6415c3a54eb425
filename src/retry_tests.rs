// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("{reason} from test"),
            reason: reason.to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_backoff_configuration() {
        let backoff = default_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(30));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(300)));

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0);
            assert_eq!(backoff.randomization_factor, 0.1);
        }
    }

    #[test]
    fn test_http_backoff_configuration() {
        let backoff = http_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(50));
        assert_eq!(backoff.max_interval, Duration::from_secs(10));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_429_is_retryable() {
        assert!(is_retryable_error(&api_error(429, "TooManyRequests")));
    }

    #[test]
    fn test_5xx_is_retryable() {
        assert!(is_retryable_error(&api_error(500, "InternalServerError")));
        assert!(is_retryable_error(&api_error(503, "ServiceUnavailable")));
        assert!(is_retryable_error(&api_error(599, "ServerError")));
    }

    #[test]
    fn test_4xx_not_retryable() {
        assert!(!is_retryable_error(&api_error(400, "BadRequest")));
        assert!(!is_retryable_error(&api_error(404, "NotFound")));
        assert!(!is_retryable_error(&api_error(409, "Conflict")));
    }

    #[test]
    fn test_service_errors_retryable() {
        let service_error: Box<dyn std::error::Error + Send + Sync> = Box::new(
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection failed"),
        );

        assert!(is_retryable_error(&kube::Error::Service(service_error)));
    }

    #[test]
    fn test_backoff_growth_without_jitter() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(500),
            None,
            2.0,
            0.0,
        );

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = default_backoff();

        for _ in 0..50 {
            backoff.reset();
            let interval = backoff.next_backoff().expect("within elapsed budget");
            assert!(interval >= Duration::from_millis(90));
            assert!(interval <= Duration::from_millis(110));
        }
    }

    #[test]
    fn test_reset_restores_initial_interval() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(30),
            None,
            2.0,
            0.0,
        );

        backoff.next_backoff();
        backoff.next_backoff();
        assert_eq!(backoff.current_interval, Duration::from_millis(400));

        backoff.reset();
        assert_eq!(backoff.current_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_exhausted_elapsed_time_stops_backoff() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(30),
            Some(Duration::ZERO),
            2.0,
            0.1,
        );

        assert_eq!(backoff.next_backoff(), None);
    }

    #[tokio::test]
    async fn test_retry_api_call_recovers_from_transient_error() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result = retry_api_call(
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(api_error(503, "ServiceUnavailable"))
                    } else {
                        Ok("done")
                    }
                }
            },
            "test call",
        )
        .await;

        assert_eq!(result.expect("second attempt succeeds"), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_api_call_fails_fast_on_client_error() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result: std::result::Result<(), kube::Error> = retry_api_call(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(api_error(409, "Conflict"))
                }
            },
            "test call",
        )
        .await;

        match result {
            Err(kube::Error::Api(response)) => assert_eq!(response.code, 409),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_step_stops_after_configured_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let result: Result<()> = retry_step(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::ExecutionFailed("boom".to_string()))
                }
            },
            "test step",
            2,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(Error::ExecutionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_step_does_not_retry_throttle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let result: Result<()> = retry_step(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::ReloadThrottle {
                        remaining: Duration::from_secs(5),
                    })
                }
            },
            "test step",
            3,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(Error::ReloadThrottle { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_step_with_zero_retries_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let result: Result<()> = retry_step(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::ExecutionFailed("boom".to_string()))
                }
            },
            "test step",
            0,
            &cancel,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_step_cancelled_while_waiting() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = retry_step(
            || async { Err(Error::ExecutionFailed("boom".to_string())) },
            "test step",
            5,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(Error::Cancelled)));
    }
}

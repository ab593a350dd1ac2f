//! Retry loop: run a retriable until success or the strategy says stop.

use super::cancel::CancelToken;
use super::classify::{self, OutcomeKind};
use super::error::{CallError, Failure};
use super::outcome::RetryOutcome;
use super::policy::{RetryDecision, RetryStrategy};
use crate::response::Response;
use std::time::Duration;

/// Runs `retriable` until it succeeds, hits a non-retryable outcome, the
/// strategy stops retrying, or a backoff wait is cancelled.
///
/// Every failure is appended to the outcome's history. Waits happen on the
/// calling thread; cancelling `cancel` aborts the current wait, records
/// `Failure::Interrupted`, and leaves the token cancelled.
pub fn run_with_retry<S, R, F>(strategy: &S, cancel: &CancelToken, mut retriable: F) -> RetryOutcome<R>
where
    S: RetryStrategy + ?Sized,
    R: Response,
    F: FnMut() -> Result<R, CallError>,
{
    let mut attempt = 0u32;
    let mut waited = Duration::ZERO;
    let mut failures: Vec<Failure> = Vec::new();

    loop {
        attempt += 1;
        let result = retriable();
        let kind = classify::classify(&result, strategy.default_retry_after());
        let failure = match classify::into_failure(result, kind) {
            Ok(response) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "request succeeded after retry");
                }
                return RetryOutcome::succeeded(attempt, failures, response);
            }
            Err(failure) => failure,
        };

        if !kind.is_retryable() {
            tracing::warn!(attempt, error = %failure, "request failed; not retrying");
            failures.push(failure);
            return RetryOutcome::failed(attempt, failures);
        }

        let decision = strategy.decide(attempt, &kind, waited);
        failures.push(failure);
        match decision {
            RetryDecision::NoRetry => {
                tracing::warn!(attempt, waited_ms = waited.as_millis() as u64, "retries exhausted");
                return RetryOutcome::failed(attempt, failures);
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(
                    attempt,
                    kind = kind_label(&kind),
                    delay_ms = delay.as_millis() as u64,
                    "delaying next retry"
                );
                if cancel.wait(delay).is_err() {
                    tracing::warn!(attempt, "retry wait cancelled");
                    failures.push(Failure::Interrupted);
                    return RetryOutcome::failed(attempt, failures);
                }
                waited = waited.saturating_add(delay);
            }
        }
    }
}

fn kind_label(kind: &OutcomeKind) -> &'static str {
    match kind {
        OutcomeKind::Success => "success",
        OutcomeKind::Throttled { .. } => "throttled",
        OutcomeKind::ClientError { .. } => "client_error",
        OutcomeKind::ServerError { .. } => "server_error",
        OutcomeKind::TransientIo => "transient_io",
        OutcomeKind::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::HttpResponse;
    use crate::retry::policy::{ExponentialDelay, FixedDelay, NoRetry};
    use std::cell::Cell;
    use std::io;
    use std::thread;

    fn fast_fixed(max_attempts: u32) -> FixedDelay {
        FixedDelay::new(max_attempts, Duration::from_millis(1))
            .unwrap()
            .with_max_jitter(Duration::ZERO)
    }

    fn respond(status: u16) -> Result<HttpResponse, CallError> {
        Ok(HttpResponse::new(status))
    }

    #[test]
    fn first_attempt_success() {
        let calls = Cell::new(0);
        let outcome = run_with_retry(&fast_fixed(3), &CancelToken::new(), || {
            calls.set(calls.get() + 1);
            respond(200)
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(outcome.attempts(), 1);
        assert!(outcome.failures().is_empty());
        assert!(outcome.is_success());
    }

    #[test]
    fn always_retryable_runs_exactly_max_attempts() {
        for n in 1..=4 {
            let calls = Cell::new(0);
            let outcome = run_with_retry(&fast_fixed(n), &CancelToken::new(), || {
                calls.set(calls.get() + 1);
                respond(503)
            });
            assert_eq!(calls.get(), n);
            assert_eq!(outcome.attempts(), n);
            assert_eq!(outcome.failures().len(), n as usize);
            assert!(outcome.response().is_none());
        }
    }

    #[test]
    fn two_server_errors_then_success() {
        let calls = Cell::new(0);
        let outcome = run_with_retry(&fast_fixed(3), &CancelToken::new(), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                respond(500)
            } else {
                respond(200)
            }
        });
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.failures().len(), 2);
        assert!(outcome.is_success());
    }

    #[test]
    fn client_error_is_terminal() {
        let calls = Cell::new(0);
        let outcome = run_with_retry(&fast_fixed(5), &CancelToken::new(), || {
            calls.set(calls.get() + 1);
            respond(403)
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.failures().len(), 1);
        assert!(matches!(outcome.failures()[0], Failure::ClientRequest { status: 403 }));
        assert!(outcome.response().is_none());
    }

    #[test]
    fn unknown_error_is_terminal() {
        let outcome = run_with_retry(&fast_fixed(5), &CancelToken::new(), || {
            Err::<HttpResponse, _>(CallError::other("malformed url"))
        });
        assert_eq!(outcome.attempts(), 1);
        assert!(matches!(outcome.failures()[0], Failure::Unknown(_)));
    }

    #[test]
    fn io_errors_are_retried() {
        let calls = Cell::new(0);
        let outcome = run_with_retry(&fast_fixed(3), &CancelToken::new(), || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset").into())
            } else {
                respond(204)
            }
        });
        assert_eq!(outcome.attempts(), 2);
        assert!(matches!(outcome.failures()[0], Failure::TransientIo(_)));
        assert!(outcome.is_success());
    }

    #[test]
    fn no_retry_records_single_failure() {
        let outcome = run_with_retry(&NoRetry, &CancelToken::new(), || respond(500));
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.failures().len(), 1);
    }

    #[test]
    fn throttle_header_is_recorded() {
        let outcome = run_with_retry(&fast_fixed(1), &CancelToken::new(), || {
            Ok::<_, CallError>(HttpResponse::new(429).with_header("Retry-After", "4"))
        });
        match &outcome.failures()[0] {
            Failure::Throttled { retry_after, .. } => assert_eq!(*retry_after, Duration::from_secs(4)),
            other => panic!("unexpected failure {:?}", other),
        }
    }

    #[test]
    fn exponential_exhausts_on_total_delay_before_max_attempts() {
        // 10ms then 100ms fit under 150ms; the third wait (1000ms) would not.
        let p = ExponentialDelay::new(10, Duration::from_millis(5), Duration::from_millis(150))
            .unwrap()
            .with_max_jitter(Duration::ZERO);
        let calls = Cell::new(0);
        let outcome = run_with_retry(&p, &CancelToken::new(), || {
            calls.set(calls.get() + 1);
            respond(502)
        });
        assert_eq!(calls.get(), 3);
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.failures().len(), 3);
    }

    #[test]
    fn cancelled_wait_stops_immediately() {
        let p = FixedDelay::new(5, Duration::from_secs(30))
            .unwrap()
            .with_max_jitter(Duration::ZERO);
        let token = CancelToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });
        let start = std::time::Instant::now();
        let outcome = run_with_retry(&p, &token, || respond(500));
        canceller.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.failures().len(), 2);
        assert!(matches!(outcome.failures()[1], Failure::Interrupted));
        assert!(token.is_cancelled(), "cancellation must stay observable");
    }

    #[test]
    fn oversized_retry_after_waits_clamped_and_cancellable() {
        let p = FixedDelay::new(2, Duration::from_millis(1))
            .unwrap()
            .with_max_jitter(Duration::from_secs(1000));
        let token = CancelToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });
        let outcome = run_with_retry(&p, &token, || {
            Ok(HttpResponse::new(429).with_header("Retry-After", "18446744073709551615"))
        });
        canceller.join().unwrap();

        assert_eq!(outcome.attempts(), 1);
        match &outcome.failures()[0] {
            Failure::Throttled { retry_after, .. } => {
                assert_eq!(*retry_after, classify::MAX_RETRY_AFTER)
            }
            other => panic!("unexpected failure {:?}", other),
        }
        assert!(matches!(outcome.last_failure(), Some(Failure::Interrupted)));
    }
}

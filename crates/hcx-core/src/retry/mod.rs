//! Retry and backoff engine.
//!
//! A caller hands a retriable closure to a [`RetryStrategy`]; the shared loop
//! classifies each attempt (success, throttled, client error, server error,
//! IO failure, unknown), backs off on retryable outcomes, and returns a
//! [`RetryOutcome`] carrying the full failure history.

mod cancel;
mod classify;
mod error;
mod outcome;
mod policy;
mod run;

pub use cancel::{CancelToken, Cancelled};
pub use classify::{
    classify, classify_curl_error, classify_response, retry_after, OutcomeKind,
    DEFAULT_RETRY_AFTER, MAX_RETRY_AFTER, RETRY_AFTER_HEADER, THROTTLED_STATUS,
};
pub use error::{CallError, Failure, RetryError};
pub use outcome::RetryOutcome;
pub use policy::{
    ExponentialDelay, FixedDelay, NoRetry, PolicyError, RetryDecision, RetryStrategy, Strategy,
};
pub use run::run_with_retry;

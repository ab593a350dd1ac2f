//! Retry strategies: how many attempts, and how long to back off between them.
//!
//! Every strategy shares the same loop (`run::run_with_retry`); a strategy
//! only answers "retry after how long, or stop?" for a retryable outcome.

use crate::response::Response;
use crate::retry::cancel::CancelToken;
use crate::retry::classify::{OutcomeKind, DEFAULT_RETRY_AFTER};
use crate::retry::error::CallError;
use crate::retry::outcome::RetryOutcome;
use crate::retry::run::run_with_retry;
use rand::Rng;
use std::time::Duration;

/// Decision returned by a strategy after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop; the outcome is exhausted.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Invalid strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

/// A pluggable retry strategy.
pub trait RetryStrategy {
    /// Maximum number of invocations, including the first.
    fn max_attempts(&self) -> u32;

    /// Wait substituted when a throttled response has no usable `Retry-After`.
    fn default_retry_after(&self) -> Duration {
        DEFAULT_RETRY_AFTER
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed with
    /// `kind`. `waited` is the backoff already spent in this invocation.
    fn decide(&self, attempt: u32, kind: &OutcomeKind, waited: Duration) -> RetryDecision;

    /// Run `retriable` until it succeeds or the strategy gives up.
    fn invoke<R, F>(&self, retriable: F) -> RetryOutcome<R>
    where
        Self: Sized,
        R: Response,
        F: FnMut() -> Result<R, CallError>,
    {
        self.invoke_with_cancel(&CancelToken::new(), retriable)
    }

    /// Like `invoke`, but backoff waits abort as soon as `cancel` fires.
    fn invoke_with_cancel<R, F>(&self, cancel: &CancelToken, retriable: F) -> RetryOutcome<R>
    where
        Self: Sized,
        R: Response,
        F: FnMut() -> Result<R, CallError>,
    {
        run_with_retry(self, cancel, retriable)
    }
}

/// Uniform random jitter in `[0, max)`.
fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Single attempt; every failure is final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn max_attempts(&self) -> u32 {
        1
    }

    fn decide(&self, _attempt: u32, _kind: &OutcomeKind, _waited: Duration) -> RetryDecision {
        RetryDecision::NoRetry
    }
}

/// Constant delay plus jitter. A throttled response replaces the delay with
/// the server's `Retry-After`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
    max_jitter: Duration,
    default_retry_after: Duration,
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(100),
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            delay,
            ..Self::default()
        })
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn with_default_retry_after(mut self, d: Duration) -> Self {
        self.default_retry_after = d;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// Backoff before jitter for a failure of kind `kind`.
    pub fn delay_without_jitter(&self, kind: &OutcomeKind) -> Duration {
        match kind {
            OutcomeKind::Throttled { retry_after } => *retry_after,
            _ => self.delay,
        }
    }
}

impl RetryStrategy for FixedDelay {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn default_retry_after(&self) -> Duration {
        self.default_retry_after
    }

    fn decide(&self, attempt: u32, kind: &OutcomeKind, _waited: Duration) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(
            self.delay_without_jitter(kind)
                .saturating_add(jitter(self.max_jitter)),
        )
    }
}

/// Exponential backoff with jitter and a ceiling on the cumulative wait.
///
/// Before jitter the delay for attempt `n` is `(base_delay_ms * 2) ^ n`
/// milliseconds, raised to the server's `Retry-After` when throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialDelay {
    max_attempts: u32,
    base_delay: Duration,
    max_jitter: Duration,
    max_total_delay: Duration,
    default_retry_after: Duration,
}

impl Default for ExponentialDelay {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(100),
            max_total_delay: Duration::from_millis(3000),
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }
}

impl ExponentialDelay {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_total_delay: Duration,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_total_delay,
            ..Self::default()
        })
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn with_default_retry_after(mut self, d: Duration) -> Self {
        self.default_retry_after = d;
        self
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    pub fn max_total_delay(&self) -> Duration {
        self.max_total_delay
    }

    /// Backoff before jitter after attempt `attempt` failed with `kind`.
    pub fn delay_without_jitter(&self, attempt: u32, kind: &OutcomeKind) -> Duration {
        let doubled_ms = (self.base_delay.as_millis() as u64).saturating_mul(2);
        let mut ms = doubled_ms.saturating_pow(attempt);
        if let OutcomeKind::Throttled { retry_after } = kind {
            ms = ms.max(retry_after.as_secs().saturating_mul(1000));
        }
        Duration::from_millis(ms)
    }
}

impl RetryStrategy for ExponentialDelay {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn default_retry_after(&self) -> Duration {
        self.default_retry_after
    }

    fn decide(&self, attempt: u32, kind: &OutcomeKind, waited: Duration) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let delay = self
            .delay_without_jitter(attempt, kind)
            .saturating_add(jitter(self.max_jitter));
        if waited.saturating_add(delay) >= self.max_total_delay {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(delay)
    }
}

/// A strategy chosen at runtime, e.g. from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    None(NoRetry),
    Fixed(FixedDelay),
    Exponential(ExponentialDelay),
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Exponential(ExponentialDelay::default())
    }
}

impl From<NoRetry> for Strategy {
    fn from(s: NoRetry) -> Self {
        Strategy::None(s)
    }
}

impl From<FixedDelay> for Strategy {
    fn from(s: FixedDelay) -> Self {
        Strategy::Fixed(s)
    }
}

impl From<ExponentialDelay> for Strategy {
    fn from(s: ExponentialDelay) -> Self {
        Strategy::Exponential(s)
    }
}

impl RetryStrategy for Strategy {
    fn max_attempts(&self) -> u32 {
        match self {
            Strategy::None(s) => s.max_attempts(),
            Strategy::Fixed(s) => s.max_attempts(),
            Strategy::Exponential(s) => s.max_attempts(),
        }
    }

    fn default_retry_after(&self) -> Duration {
        match self {
            Strategy::None(s) => s.default_retry_after(),
            Strategy::Fixed(s) => s.default_retry_after(),
            Strategy::Exponential(s) => s.default_retry_after(),
        }
    }

    fn decide(&self, attempt: u32, kind: &OutcomeKind, waited: Duration) -> RetryDecision {
        match self {
            Strategy::None(s) => s.decide(attempt, kind, waited),
            Strategy::Fixed(s) => s.decide(attempt, kind, waited),
            Strategy::Exponential(s) => s.decide(attempt, kind, waited),
        }
    }
}

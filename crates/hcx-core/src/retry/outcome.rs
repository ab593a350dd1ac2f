//! Final record of one `invoke`: attempts, failure history, optional response.

use crate::retry::error::{Failure, RetryError};

/// Immutable result of running a retriable through a strategy.
///
/// `response` is present exactly when the call succeeded. `failures` is in
/// chronological order and is empty only for a first-attempt success.
#[derive(Debug)]
pub struct RetryOutcome<R> {
    attempts: u32,
    failures: Vec<Failure>,
    response: Option<R>,
}

impl<R> RetryOutcome<R> {
    pub(crate) fn succeeded(attempts: u32, failures: Vec<Failure>, response: R) -> Self {
        Self {
            attempts,
            failures,
            response: Some(response),
        }
    }

    pub(crate) fn failed(attempts: u32, failures: Vec<Failure>) -> Self {
        Self {
            attempts,
            failures,
            response: None,
        }
    }

    /// Number of times the retriable was actually invoked.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.failures.last()
    }

    pub fn response(&self) -> Option<&R> {
        self.response.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.response.is_some()
    }

    pub fn into_response(self) -> Option<R> {
        self.response
    }

    pub fn into_parts(self) -> (u32, Vec<Failure>, Option<R>) {
        (self.attempts, self.failures, self.response)
    }

    /// Unwrap for callers that want `?`: the response, or the most recent
    /// failure. A failed outcome with an empty history is reported as an
    /// engine error rather than a classified failure.
    pub fn into_result(self) -> Result<R, RetryError> {
        let attempts = self.attempts;
        if let Some(response) = self.response {
            return Ok(response);
        }
        let mut failures = self.failures;
        match failures.pop() {
            Some(last) => Err(RetryError::Failed { attempts, last }),
            None => Err(RetryError::Engine { attempts }),
        }
    }
}

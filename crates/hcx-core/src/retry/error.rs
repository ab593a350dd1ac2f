//! Error types for the retry engine: what a retriable returns, what the
//! failure history records, and what the consuming layer finally sees.

use std::fmt;
use std::io;
use std::time::Duration;

/// Error returned by a single invocation of a retriable operation.
#[derive(Debug)]
pub enum CallError {
    /// Network/IO-level failure. Retried.
    Io(io::Error),
    /// Anything else the operation could not classify. Never retried.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CallError {
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CallError::Other(err.into())
    }
}

impl From<io::Error> for CallError {
    fn from(e: io::Error) -> Self {
        CallError::Io(e)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Io(e) => write!(f, "{}", e),
            CallError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Io(e) => Some(e),
            CallError::Other(e) => Some(e.as_ref()),
        }
    }
}

/// One entry of a retry outcome's failure history.
#[derive(Debug)]
pub enum Failure {
    /// The call itself failed at the IO level.
    TransientIo(io::Error),
    /// Server asked us to back off (429).
    Throttled { status: u16, retry_after: Duration },
    /// Non-throttle 4xx. Terminal.
    ClientRequest { status: u16 },
    /// Any other unsuccessful status. Retried.
    ServerResponse { status: u16 },
    /// The backoff wait was cancelled. Terminal.
    Interrupted,
    /// Unclassified error from the call. Terminal.
    Unknown(Box<dyn std::error::Error + Send + Sync>),
}

impl Failure {
    /// Whether the engine may try again after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Failure::TransientIo(_) | Failure::Throttled { .. } | Failure::ServerResponse { .. }
        )
    }

    /// HTTP status behind this failure, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Throttled { status, .. }
            | Failure::ClientRequest { status }
            | Failure::ServerResponse { status } => Some(*status),
            Failure::TransientIo(_) | Failure::Interrupted | Failure::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::TransientIo(e) => write!(f, "unable to execute request: {}", e),
            Failure::Throttled { retry_after, .. } => write!(
                f,
                "request throttled; retry after {} seconds",
                retry_after.as_secs()
            ),
            Failure::ClientRequest { status } => write!(f, "error with request ({})", status),
            Failure::ServerResponse { status } => write!(f, "unsuccessful response ({})", status),
            Failure::Interrupted => write!(f, "interrupted while waiting to retry"),
            Failure::Unknown(e) => write!(f, "unexpected failure: {}", e),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Failure::TransientIo(e) => Some(e),
            Failure::Unknown(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Error surfaced when a failed outcome is unwrapped by the consuming layer.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// The call failed; `last` is the most recent entry of the history.
    #[error("request failed after {attempts} attempt(s): {last}")]
    Failed {
        attempts: u32,
        #[source]
        last: Failure,
    },
    /// No response and no recorded failure. Indicates an engine bug.
    #[error("retry engine returned neither a response nor a failure after {attempts} attempt(s)")]
    Engine { attempts: u32 },
}

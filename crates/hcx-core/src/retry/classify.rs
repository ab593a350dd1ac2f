//! Classify a finished call (response or error) into an outcome kind.

use crate::response::Response;
use crate::retry::error::{CallError, Failure};
use std::io;
use std::time::Duration;

/// Header carrying the server's requested wait, in whole seconds.
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

/// Status code that signals throttling.
pub const THROTTLED_STATUS: u16 = 429;

/// Wait used when a throttled response has no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Longest wait honoured from a `Retry-After` header; larger values are clamped.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a single attempt, as seen by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    /// 429; `retry_after` is the header value or the strategy default.
    Throttled { retry_after: Duration },
    /// Any other 4xx.
    ClientError { status: u16 },
    /// Any other non-success status.
    ServerError { status: u16 },
    /// The call returned an IO error.
    TransientIo,
    /// The call returned an unclassified error.
    Unknown,
}

impl OutcomeKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OutcomeKind::Throttled { .. } | OutcomeKind::ServerError { .. } | OutcomeKind::TransientIo
        )
    }
}

/// Map an HTTP status to an outcome kind. `response` is only consulted for
/// the `Retry-After` header on a throttled status.
pub fn classify_response<R: Response>(response: &R, default_retry_after: Duration) -> OutcomeKind {
    if response.is_success() {
        return OutcomeKind::Success;
    }
    match response.status() {
        THROTTLED_STATUS => OutcomeKind::Throttled {
            retry_after: retry_after(response, default_retry_after),
        },
        status @ 400..=499 => OutcomeKind::ClientError { status },
        status => OutcomeKind::ServerError { status },
    }
}

/// Classify the result of one call.
pub fn classify<R: Response>(result: &Result<R, CallError>, default_retry_after: Duration) -> OutcomeKind {
    match result {
        Ok(response) => classify_response(response, default_retry_after),
        Err(CallError::Io(_)) => OutcomeKind::TransientIo,
        Err(CallError::Other(_)) => OutcomeKind::Unknown,
    }
}

/// Server-requested wait from `Retry-After`, or `default` when the header is
/// missing, blank, or not an integer number of seconds. Values above
/// [`MAX_RETRY_AFTER`] are clamped to it.
pub fn retry_after<R: Response>(response: &R, default: Duration) -> Duration {
    response
        .header(RETRY_AFTER_HEADER)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
        .unwrap_or(default)
}

/// Turn a non-success result into its history entry. Returns the response
/// back when the kind is `Success`.
pub(crate) fn into_failure<R>(result: Result<R, CallError>, kind: OutcomeKind) -> Result<R, Failure> {
    match (result, kind) {
        (Ok(response), OutcomeKind::Success) => Ok(response),
        (Err(CallError::Io(e)), _) => Err(Failure::TransientIo(e)),
        (Err(CallError::Other(e)), _) => Err(Failure::Unknown(e)),
        (Ok(_), OutcomeKind::Throttled { retry_after }) => Err(Failure::Throttled {
            status: THROTTLED_STATUS,
            retry_after,
        }),
        (Ok(_), OutcomeKind::ClientError { status }) => Err(Failure::ClientRequest { status }),
        (Ok(_), OutcomeKind::ServerError { status }) => Err(Failure::ServerResponse { status }),
        (Ok(_), OutcomeKind::TransientIo | OutcomeKind::Unknown) => {
            Err(Failure::Unknown("response classified as a call error".into()))
        }
    }
}

/// Map a curl error into a call error: connection-level failures are IO
/// (retried), everything else is unclassified.
pub fn classify_curl_error(e: curl::Error) -> CallError {
    let kind = if e.is_operation_timedout() {
        Some(io::ErrorKind::TimedOut)
    } else if e.is_couldnt_connect() {
        Some(io::ErrorKind::ConnectionRefused)
    } else if e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        Some(io::ErrorKind::Other)
    } else {
        None
    };
    match kind {
        Some(kind) => CallError::Io(io::Error::new(kind, e)),
        None => CallError::other(e),
    }
}

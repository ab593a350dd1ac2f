//! Cooperative cancellation for backoff waits.
//!
//! A `CancelToken` is shared between the thread running the retry loop and
//! whoever may want to stop it. Cancelling wakes a waiting loop immediately;
//! the flag stays set so the caller can still observe it afterwards.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Returned by [`CancelToken::wait`] when the wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wait cancelled")
    }
}

impl std::error::Error for Cancelled {}

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable cancellation handle. Clones share the same flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the bool half-written.
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Request cancellation and wake every thread blocked in `wait`.
    pub fn cancel(&self) {
        *self.lock() = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    /// Block for up to `duration`. Returns `Err(Cancelled)` as soon as the
    /// token is (or already was) cancelled.
    pub fn wait(&self, duration: Duration) -> Result<(), Cancelled> {
        // A saturated backoff has no representable deadline; it only ends on cancel.
        let deadline = Instant::now().checked_add(duration);
        let mut cancelled = self.lock();
        loop {
            if *cancelled {
                return Err(Cancelled);
            }
            cancelled = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.inner
                        .wake
                        .wait_timeout(cancelled, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0)
                }
                None => self
                    .inner
                    .wake
                    .wait(cancelled)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }
    }
}

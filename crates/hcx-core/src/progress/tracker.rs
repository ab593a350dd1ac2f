//! Byte counter shared by the read- and write-side decorators.

use super::callback::TransferProgressCallback;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Total must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProgressError {
    #[error("total bytes must be greater than zero")]
    InvalidTotal,
}

/// Counts bytes for one transfer and emits callbacks.
///
/// Updates are only emitted while the counter is within the total and the
/// transfer has not completed; completion is emitted exactly once, the first
/// time the counter reaches the total.
pub(crate) struct ProgressTracker {
    transferred: AtomicU64,
    total: u64,
    completed: AtomicBool,
    callback: Arc<dyn TransferProgressCallback>,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn TransferProgressCallback>,
        total: u64,
    ) -> Result<Self, ProgressError> {
        if total == 0 {
            return Err(ProgressError::InvalidTotal);
        }
        Ok(Self {
            transferred: AtomicU64::new(0),
            total,
            completed: AtomicBool::new(false),
            callback,
        })
    }

    pub(crate) fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Acquire)
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    /// Record `n` bytes that the underlying channel successfully moved.
    pub(crate) fn record(&self, n: u64) {
        let now = self.transferred.fetch_add(n, Ordering::AcqRel).saturating_add(n);
        if self.completed.load(Ordering::Acquire) {
            return;
        }
        if now <= self.total {
            self.callback.on_update(now, self.total);
        }
        if now >= self.total && !self.completed.swap(true, Ordering::AcqRel) {
            self.callback.on_complete(now);
        }
    }

    pub(crate) fn fail(&self, error: &io::Error) {
        self.callback.on_failure(error);
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("transferred", &self.transferred())
            .field("total", &self.total)
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .finish()
    }
}

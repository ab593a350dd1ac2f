//! Transfer progress observer and the default logging implementation.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives progress notifications from the tracking decorators.
pub trait TransferProgressCallback: Send + Sync {
    /// `transferred` bytes out of `total` have moved so far.
    fn on_update(&self, transferred: u64, total: u64);

    /// The transfer reached its total.
    fn on_complete(&self, total: u64);

    /// The underlying channel failed.
    fn on_failure(&self, error: &io::Error);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Upload,
    Download,
}

impl TransferType {
    fn verb(self) -> &'static str {
        match self {
            TransferType::Upload => "Uploaded",
            TransferType::Download => "Downloaded",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            TransferType::Upload => "upload",
            TransferType::Download => "download",
        }
    }
}

/// `"[source -> destination] "`, used as a log prefix. Both sides must be non-blank.
pub fn format_prefix(source: &str, destination: &str) -> Option<String> {
    if source.trim().is_empty() || destination.trim().is_empty() {
        return None;
    }
    Some(format!("[{} -> {}] ", source, destination))
}

/// Logs progress lines through `tracing`. Update lines are emitted only when
/// the whole percentage changes.
#[derive(Debug)]
pub struct LogProgressCallback {
    prefix: String,
    transfer_type: TransferType,
    last_percent: AtomicU64,
}

impl LogProgressCallback {
    pub fn new(prefix: impl Into<String>, transfer_type: TransferType) -> Self {
        Self {
            prefix: prefix.into(),
            transfer_type,
            last_percent: AtomicU64::new(u64::MAX),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    /// Returns the percent to log, or None when it has not changed.
    fn percent_changed(&self, transferred: u64, total: u64) -> Option<u64> {
        let percent = if total == 0 {
            100
        } else {
            (transferred.min(total) as u128 * 100 / total as u128) as u64
        };
        let previous = self.last_percent.swap(percent, Ordering::Relaxed);
        (previous != percent).then_some(percent)
    }
}

impl TransferProgressCallback for LogProgressCallback {
    fn on_update(&self, transferred: u64, total: u64) {
        if let Some(percent) = self.percent_changed(transferred, total) {
            tracing::info!(
                "{}{} {} of {} bytes ({}%)",
                self.prefix,
                self.transfer_type.verb(),
                transferred,
                total,
                percent
            );
        }
    }

    fn on_complete(&self, total: u64) {
        tracing::info!(
            "{}{} complete: {} bytes",
            self.prefix,
            self.transfer_type.noun(),
            total
        );
    }

    fn on_failure(&self, error: &io::Error) {
        tracing::warn!("{}{} failed: {}", self.prefix, self.transfer_type.noun(), error);
    }
}

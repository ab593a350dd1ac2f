//! Read-side progress decorator.

use super::callback::TransferProgressCallback;
use super::tracker::{ProgressError, ProgressTracker};
use std::io::{self, Read};
use std::sync::Arc;

/// Wraps a reader and reports every read (and skip) to a progress callback.
///
/// Failed reads are reported through `on_failure` and returned unchanged;
/// they do not advance the counter.
#[derive(Debug)]
pub struct ProgressReader<R> {
    inner: R,
    tracker: ProgressTracker,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(
        inner: R,
        callback: Arc<dyn TransferProgressCallback>,
        total_bytes: u64,
    ) -> Result<Self, ProgressError> {
        Ok(Self {
            inner,
            tracker: ProgressTracker::new(callback, total_bytes)?,
        })
    }

    /// Discard up to `n` bytes from the underlying reader, counting them as transferred.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let result = io::copy(&mut (&mut self.inner).take(n), &mut io::sink());
        self.observe(result)
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.tracker.transferred()
    }

    pub fn total_bytes(&self) -> u64 {
        self.tracker.total()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn observe(&self, result: io::Result<u64>) -> io::Result<u64> {
        match result {
            Ok(n) => {
                self.tracker.record(n);
                Ok(n)
            }
            // Retried by the caller (read_exact, read_to_end); not a failure.
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                self.tracker.fail(&e);
                Err(e)
            }
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf).map(|n| n as u64);
        self.observe(result).map(|n| n as usize)
    }
}

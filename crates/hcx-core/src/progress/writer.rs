//! Write-side progress decorator.

use super::callback::TransferProgressCallback;
use super::tracker::{ProgressError, ProgressTracker};
use std::io::{self, Write};
use std::sync::Arc;

/// Wraps a sink and reports every successful write to a progress callback.
///
/// The underlying write happens first; only bytes it accepted are counted.
/// A failed write or flush is reported through `on_failure` and returned
/// unchanged.
#[derive(Debug)]
pub struct ProgressWriter<W> {
    inner: W,
    tracker: ProgressTracker,
}

impl<W: Write> ProgressWriter<W> {
    pub fn new(
        inner: W,
        callback: Arc<dyn TransferProgressCallback>,
        total_bytes: u64,
    ) -> Result<Self, ProgressError> {
        Ok(Self {
            inner,
            tracker: ProgressTracker::new(callback, total_bytes)?,
        })
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.tracker.transferred()
    }

    pub fn total_bytes(&self) -> u64 {
        self.tracker.total()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn report<T>(&self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result {
            if e.kind() != io::ErrorKind::Interrupted {
                self.tracker.fail(e);
            }
        }
        result
    }
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        let n = self.report(result)?;
        self.tracker.record(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.report(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tracker::testing::{Event, Recorder};
    use super::*;

    /// Accepts everything until `fail_after` writes have succeeded.
    struct FlakySink {
        data: Vec<u8>,
        fail_after: usize,
        writes: usize,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.writes >= self.fail_after {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.writes += 1;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn writer(total: u64, fail_after: usize) -> (ProgressWriter<FlakySink>, Arc<Recorder>) {
        let rec = Arc::new(Recorder::default());
        let sink = FlakySink {
            data: Vec::new(),
            fail_after,
            writes: 0,
        };
        (ProgressWriter::new(sink, rec.clone(), total).unwrap(), rec)
    }

    #[test]
    fn zero_total_rejected() {
        let rec = Arc::new(Recorder::default());
        assert_eq!(
            ProgressWriter::new(Vec::<u8>::new(), rec, 0).unwrap_err(),
            ProgressError::InvalidTotal
        );
    }

    #[test]
    fn updates_then_single_completion() {
        let (mut w, rec) = writer(100, usize::MAX);
        w.write_all(&[1u8; 40]).unwrap();
        w.write_all(&[2u8; 40]).unwrap();
        w.write_all(&[3u8; 20]).unwrap();
        assert_eq!(
            rec.events(),
            vec![
                Event::Update(40, 100),
                Event::Update(80, 100),
                Event::Update(100, 100),
                Event::Complete(100),
            ]
        );
    }

    #[test]
    fn writes_past_total_are_silent() {
        let (mut w, rec) = writer(100, usize::MAX);
        w.write_all(&[0u8; 40]).unwrap();
        w.write_all(&[0u8; 40]).unwrap();
        w.write_all(&[0u8; 20]).unwrap();
        let before = rec.events();
        w.write_all(&[0u8; 10]).unwrap();
        assert_eq!(rec.events(), before);
        assert_eq!(w.bytes_transferred(), 110);
        assert_eq!(w.get_ref().data.len(), 110);
    }

    #[test]
    fn failed_write_reports_once_and_keeps_counter() {
        let (mut w, rec) = writer(100, 1);
        w.write_all(&[0u8; 40]).unwrap();
        let err = w.write(&[0u8; 40]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(err.to_string(), "pipe closed");
        assert_eq!(w.bytes_transferred(), 40);
        assert_eq!(
            rec.events(),
            vec![Event::Update(40, 100), Event::Failure(io::ErrorKind::BrokenPipe)]
        );
    }

    #[test]
    fn io_copy_through_writer() {
        let rec = Arc::new(Recorder::default());
        let mut w = ProgressWriter::new(Vec::<u8>::new(), rec.clone(), 5000).unwrap();
        let n = io::copy(&mut &[9u8; 5000][..], &mut w).unwrap();
        assert_eq!(n, 5000);
        assert_eq!(w.into_inner().len(), 5000);
        assert_eq!(rec.events().last(), Some(&Event::Complete(5000)));
    }
}

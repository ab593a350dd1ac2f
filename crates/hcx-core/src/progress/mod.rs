//! Byte-counting decorators for uploads and downloads.
//!
//! `ProgressReader` and `ProgressWriter` wrap a reader/writer for the
//! duration of one transfer and report progress to a
//! [`TransferProgressCallback`]. Both follow the same rules: updates while
//! within the total, one completion when the total is reached, one failure
//! per failed call.

mod callback;
mod reader;
mod tracker;
mod writer;

pub use callback::{format_prefix, LogProgressCallback, TransferProgressCallback, TransferType};
pub use reader::ProgressReader;
pub use tracker::ProgressError;
pub use writer::ProgressWriter;

#[cfg(test)]
pub(crate) use tracker::testing;

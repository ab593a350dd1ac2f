//! CLI command handlers, one per file.

mod config;
mod get;
mod upload;

pub use config::run_config;
pub use get::run_get;
pub use upload::{run_upload, UploadArgs};

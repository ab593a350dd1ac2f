pub mod config;
pub mod logging;

pub mod progress;
pub mod response;
pub mod retry;
pub mod transport;
pub mod upload;

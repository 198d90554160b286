//! Shared helpers for the binary

mod logger;

pub use logger::{init_logger, LogLevel};

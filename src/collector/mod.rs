//! Touch event collection.
//!
//! The host input layer owns the real touch surface; collectors here deliver
//! its events over a bounded channel in the same shape, either from a
//! recorded script or not at all.

pub mod noop;
pub mod replay;
pub mod types;

// Re-export commonly used types
pub use noop::NoopCollector;
pub use replay::{load_script, ReplayCollector, ReplayConfig, ReplayRecord, ReplaySource};
pub use types::{Position, TouchEvent, TouchId, TouchKind};

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    Io(String),
    Parse { line: usize, message: String },
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::Io(e) => write!(f, "Collector IO error: {e}"),
            CollectorError::Parse { line, message } => {
                write!(f, "Malformed touch script at line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for CollectorError {}

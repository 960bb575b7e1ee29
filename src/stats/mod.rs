//! Session statistics for the Touch Feature Agent.

pub mod session;

// Re-export commonly used types
pub use session::{create_shared_stats, SessionStats, SharedStats, StatsSnapshot};

//! Touch Feature Agent - multi-touch channel multiplexer for sound synthesis.
//!
//! This library maps an unbounded stream of touch identities onto a fixed set
//! of logical channels and broadcasts a feature vector per channel on a fixed
//! period, for consumption by an audio engine and a streaming bus.
//!
//! # Guarantees
//!
//! - **Bounded channels**: At most `N + 1` channels are ever active
//! - **Fixed frame shape**: Every tick emits `2·N` positions and `8·N` features
//! - **Non-blocking output**: A slow sink drops frames, it never stalls routing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Touch Feature Agent                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│   Router    │──▶│ ChannelPool │       │
//! │  │  (replay)   │   │ (down/up)   │   │ (N + stage) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │ tick         │
//! │                                              ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Session    │◀────────────────────│ Broadcaster │       │
//! │  │   Stats     │                     │ OSC/outlet  │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use touch_feature_agent::{core, sink, stats, Config};
//! use touch_feature_agent::collector::Position;
//! use chrono::Utc;
//!
//! let config = Config::default();
//! let pool = core::ChannelPool::from_config(&config).into_shared();
//! let stats = stats::create_shared_stats();
//! let router = core::TouchRouter::new(pool.clone(), &config, stats.clone());
//!
//! let sinks = sink::SinkSet::from_config(&config).expect("sinks");
//! let _handle = core::FeatureBroadcaster::new(pool)
//!     .spawn(config.tick_period, sinks, config.sinks.queue_depth, stats);
//!
//! router.touch_down(1, Position::new(0.2, 0.3), false, Utc::now());
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod sink;
pub mod stats;

// Re-export key types at crate root for convenience
pub use collector::{CollectorError, Position, TouchEvent, TouchId, TouchKind};
pub use config::{Config, ConfigError, GridMode, OriginMode, SinkConfig};
pub use crate::core::{
    BroadcasterHandle, ChannelPool, ChannelSlot, FeatureBroadcaster, FeatureVector, Frame,
    RouteOutcome, SharedPool, TaggedFeatures, TouchRouter,
};
pub use sink::{FeatureSink, PositionalSink, SinkError, SinkSet};
pub use stats::{SessionStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

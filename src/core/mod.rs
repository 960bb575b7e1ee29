//! Core functionality for the Touch Feature Agent.
//!
//! This module contains:
//! - Channels and the fixed pool they live in
//! - Event routing onto channels
//! - Feature computation and the periodic broadcast

pub mod broadcaster;
pub mod channel;
pub mod features;
pub mod pool;
pub mod router;

// Re-export commonly used types
pub use broadcaster::{BroadcasterHandle, FeatureBroadcaster, Frame};
pub use channel::{Channel, ChannelParams, GroupMember};
pub use features::{FeatureVector, TaggedFeatures, FEATURES_PER_CHANNEL, FEATURE_NAMES};
pub use pool::{lock_pool, ChannelPool, ChannelSlot, SharedPool};
pub use router::{RouteOutcome, TouchRouter};

//! Session counters for the router and the broadcaster.
//!
//! Both execution paths bump these lock-free, so the summary printed at
//! shutdown shows what happened without touching the hot path's locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct SessionStats {
    /// Events handled by the router
    events_routed: AtomicU64,
    /// Events from other device tags
    events_ignored: AtomicU64,
    /// Move/up events for ids nobody holds
    unknown_ids: AtomicU64,
    /// Touches attached to an existing channel's group
    touches_grouped: AtomicU64,
    /// Touches that found neither a free channel nor a recent group
    touches_dropped: AtomicU64,
    /// Channels handed to the staging touch on release
    hot_swaps: AtomicU64,
    ticks: AtomicU64,
    frames_dispatched: AtomicU64,
    /// Frames the dispatcher had no room for
    frames_dropped: AtomicU64,
    sink_failures: AtomicU64,
    session_start: DateTime<Utc>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            events_routed: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            unknown_ids: AtomicU64::new(0),
            touches_grouped: AtomicU64::new(0),
            touches_dropped: AtomicU64::new(0),
            hot_swaps: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            frames_dispatched: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_event_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_id(&self) {
        self.unknown_ids.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_touch_grouped(&self) {
        self.touches_grouped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_touch_dropped(&self) {
        self.touches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hot_swap(&self) {
        self.hot_swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dispatched(&self) {
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_routed: self.events_routed.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            unknown_ids: self.unknown_ids.load(Ordering::Relaxed),
            touches_grouped: self.touches_grouped.load(Ordering::Relaxed),
            touches_dropped: self.touches_dropped.load(Ordering::Relaxed),
            hot_swaps: self.hot_swaps.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Touch events routed: {}\n\
             - Events from other devices: {}\n\
             - Unknown touch ids: {}\n\
             - Touches grouped: {}\n\
             - Touches dropped: {}\n\
             - Staging hot-swaps: {}\n\
             - Ticks: {}\n\
             - Frames dispatched: {}\n\
             - Frames dropped: {}\n\
             - Sink failures: {}\n\
             - Session duration: {} seconds",
            stats.events_routed,
            stats.events_ignored,
            stats.unknown_ids,
            stats.touches_grouped,
            stats.touches_dropped,
            stats.hot_swaps,
            stats.ticks,
            stats.frames_dispatched,
            stats.frames_dropped,
            stats.sink_failures,
            stats.session_duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_routed: u64,
    pub events_ignored: u64,
    pub unknown_ids: u64,
    pub touches_grouped: u64,
    pub touches_dropped: u64,
    pub hot_swaps: u64,
    pub ticks: u64,
    pub frames_dispatched: u64,
    pub frames_dropped: u64,
    pub sink_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared session statistics.
pub type SharedStats = Arc<SessionStats>;

pub fn create_shared_stats() -> SharedStats {
    Arc::new(SessionStats::new())
}

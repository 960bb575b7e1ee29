//! Periodic feature broadcast.
//!
//! A ticker thread snapshots the pool on a fixed period and hands each frame
//! to a dispatcher thread through a bounded queue. The dispatcher owns the
//! sinks, so a slow consumer backs up the queue, never the router.
//!
//! ```text
//!  ticker ──try_send──▶ [queue] ──▶ dispatcher ──▶ positional sinks (2·N)
//!    │                                   └────────▶ feature sinks (8·N)
//!    └── lock pool, capture, unlock
//! ```

use crate::config::MAX_DURATION;
use crate::core::features::TaggedFeatures;
use crate::core::pool::{lock_pool, SharedPool};
use crate::sink::SinkSet;
use crate::stats::SharedStats;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything one tick emits.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// `[x0, y0, x1, y1, ...]`, one pair per regular channel
    pub positions: Vec<f64>,
    /// One tagged vector per regular channel, in channel order
    pub features: Vec<TaggedFeatures>,
}

impl Frame {
    /// Feature vectors concatenated in channel order.
    pub fn flat_features(&self) -> Vec<f64> {
        self.features
            .iter()
            .flat_map(|tagged| tagged.values.as_slice().iter().copied())
            .collect()
    }
}

pub struct FeatureBroadcaster {
    pool: SharedPool,
    sequence: u64,
}

impl FeatureBroadcaster {
    pub fn new(pool: SharedPool) -> Self {
        Self { pool, sequence: 0 }
    }

    /// Snapshot every regular channel. Inactive channels report zeros.
    pub fn capture(&mut self) -> Frame {
        let (positions, features) = {
            let pool = lock_pool(&self.pool);
            let mut positions = Vec::with_capacity(2 * pool.len());
            let mut features = Vec::with_capacity(pool.len());
            for (index, channel) in pool.regular().iter().enumerate() {
                positions.extend_from_slice(&channel.positional_raw());
                features.push(TaggedFeatures {
                    tag: TaggedFeatures::channel_tag(index),
                    values: channel.snapshot(),
                });
            }
            (positions, features)
        };

        let frame = Frame {
            sequence: self.sequence,
            timestamp: Utc::now(),
            positions,
            features,
        };
        self.sequence += 1;
        frame
    }

    /// Start ticking every `period` and pushing frames to `sinks`.
    pub fn spawn(
        mut self,
        period: Duration,
        mut sinks: SinkSet,
        queue_depth: usize,
        stats: SharedStats,
    ) -> BroadcasterHandle {
        let period = period.min(MAX_DURATION);
        let (sender, receiver) = bounded::<Frame>(queue_depth.max(1));
        let running = Arc::new(AtomicBool::new(true));

        let dispatch_stats = stats.clone();
        let dispatcher = thread::spawn(move || {
            run_dispatcher(receiver, &mut sinks, &dispatch_stats);
        });

        let ticker_running = running.clone();
        let ticker = thread::spawn(move || {
            let mut next = Instant::now();
            while ticker_running.load(Ordering::SeqCst) {
                let frame = self.capture();
                stats.record_tick();

                match sender.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(frame)) => {
                        stats.record_frame_dropped();
                        debug!(sequence = frame.sequence, "dispatcher backlogged, frame dropped");
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        warn!("Dispatcher exited, stopping ticker");
                        break;
                    }
                }

                let now = Instant::now();
                next = advance_deadline(next, period, now);
                if next > now {
                    thread::sleep(next - now);
                }
            }
            // Dropping the sender lets the dispatcher drain and exit.
        });

        info!(period_ms = period.as_millis() as u64, queue_depth, "Broadcaster started");
        BroadcasterHandle {
            running,
            ticker: Some(ticker),
            dispatcher: Some(dispatcher),
        }
    }
}

/// Next tick deadline after `previous`. A ticker more than a full period
/// behind skips the missed ticks and restarts from `now`.
fn advance_deadline(previous: Instant, period: Duration, now: Instant) -> Instant {
    let next = previous + period;
    if now > next + period {
        debug!(behind_ms = (now - next).as_millis() as u64, "ticker re-anchored");
        now
    } else {
        next
    }
}

fn run_dispatcher(receiver: Receiver<Frame>, sinks: &mut SinkSet, stats: &SharedStats) {
    for frame in receiver.iter() {
        let failed = sinks.dispatch(&frame.positions, &frame.features);
        stats.record_frame_dispatched();
        for _ in 0..failed {
            stats.record_sink_failure();
        }
    }
    debug!("Dispatcher drained");
}

/// Running broadcaster. Stops on drop.
pub struct BroadcasterHandle {
    running: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl BroadcasterHandle {
    /// Stop the ticker, then wait for queued frames to reach the sinks.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.ticker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for BroadcasterHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

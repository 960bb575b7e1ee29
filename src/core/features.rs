//! Per-channel feature computation.
//!
//! Every function here is pure: it maps channel state to one or more bounded
//! values of the broadcast feature vector.

use crate::collector::types::Position;
use crate::config::{GridMode, OriginMode};
use serde::{Deserialize, Serialize};
use statrs::function::logistic::logistic;

/// Width of a channel's feature vector.
pub const FEATURES_PER_CHANNEL: usize = 8;

/// Layout of [`FeatureVector`], in broadcast order.
pub const FEATURE_NAMES: [&str; FEATURES_PER_CHANNEL] = [
    "start_x",
    "start_y",
    "position_0",
    "position_1",
    "velocity",
    "touch_time",
    "mode",
    "density",
];

/// Dwell below this (seconds) is scored on the steep curve.
const STEEP_DWELL_LIMIT_SECS: f64 = 0.07;

/// One channel's features for a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURES_PER_CHANNEL]);

impl FeatureVector {
    /// Reported by channels with no touch on them.
    pub const INACTIVE: FeatureVector = FeatureVector([0.0; FEATURES_PER_CHANNEL]);

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn is_inactive(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    pub fn start(&self) -> (f64, f64) {
        (self.0[0], self.0[1])
    }

    pub fn positional(&self) -> (f64, f64) {
        (self.0[2], self.0[3])
    }

    pub fn velocity(&self) -> f64 {
        self.0[4]
    }

    pub fn touch_time(&self) -> f64 {
        self.0[5]
    }

    pub fn mode(&self) -> f64 {
        self.0[6]
    }

    pub fn density(&self) -> f64 {
        self.0[7]
    }
}

/// A feature vector labelled with its channel tag (`channel1`, `channel2`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedFeatures {
    pub tag: String,
    pub values: FeatureVector,
}

impl TaggedFeatures {
    /// Tag for the zero-based regular channel `index`.
    pub fn channel_tag(index: usize) -> String {
        format!("channel{}", index + 1)
    }
}

/// Distance from the origin to the far corner `(1,1)`.
pub fn max_norm(origin: OriginMode) -> f64 {
    let (ox, oy) = origin.point();
    Position::new(1.0, 1.0).distance(&Position::new(ox, oy))
}

/// Encode a position relative to the configured origin and grid.
pub fn positional_encoding(position: Position, origin: OriginMode, grid: GridMode) -> [f64; 2] {
    let (ox, oy) = origin.point();

    if grid == GridMode::Circular {
        return circular_encoding(position, origin);
    }

    match origin {
        OriginMode::Center => [
            2.0 * (position.x - ox).abs(),
            2.0 * (position.y - oy).abs(),
        ],
        OriginMode::CenterBottom => [2.0 * (position.x - ox).abs(), (position.y - oy).abs()],
        OriginMode::BottomLeft => [position.x, position.y],
    }
}

/// Normalized radius and an angle proxy in `[0,1]`.
fn circular_encoding(position: Position, origin: OriginMode) -> [f64; 2] {
    let (ox, oy) = origin.point();
    let dx = position.x - ox;
    let dy = position.y - oy;
    let norm = (dx * dx + dy * dy).sqrt();

    let radius = (norm / max_norm(origin)).sqrt();
    let angle = if dx == 0.0 { 0.0 } else { (dy / dx).tanh().abs() };
    [radius, angle]
}

/// Speed over one sampling interval, normalized and clamped to `[0,1]`.
pub fn velocity_score(
    current: Position,
    previous: Position,
    sample_interval_secs: f64,
    normalization: f64,
) -> f64 {
    let speed = current.distance(&previous) / sample_interval_secs;
    (speed / normalization).clamp(0.0, 1.0)
}

/// Confidence in continuous contact: steep at first, then saturating.
pub fn dwell_score(dwell_secs: f64) -> f64 {
    if dwell_secs < STEEP_DWELL_LIMIT_SECS {
        logistic(20.0 * dwell_secs - 4.0)
    } else {
        logistic(dwell_secs - 4.0)
    }
}

/// Spread between a channel and its first grouped touch, clamped to `[0,1]`.
pub fn density_score(
    current: Position,
    anchor: Option<Position>,
    min_area: f64,
    max_area: f64,
) -> f64 {
    match anchor {
        None => 0.0,
        Some(anchor) => {
            let area = current.distance(&anchor);
            ((area - min_area) / (max_area - min_area)).clamp(0.0, 1.0)
        }
    }
}

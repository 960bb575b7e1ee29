//! Raw touch event types delivered by the host input layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External touch identifier assigned by the input layer.
pub type TouchId = i64;

/// A point in normalized surface coordinates, `[0,1] x [0,1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Touch event phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchKind {
    Down,
    Move,
    Up,
}

/// A single raw touch event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    pub id: TouchId,
    pub kind: TouchKind,
    pub position: Position,
    /// Set by the input layer on the second tap of a quick double tap
    pub double_tap: bool,
    /// Source device tag, e.g. `wm_touch` or `mouse`
    pub device: String,
}

impl TouchEvent {
    pub fn down(id: TouchId, position: impl Into<Position>, device: &str) -> Self {
        Self::at(Utc::now(), id, TouchKind::Down, position.into(), device)
    }

    pub fn moved(id: TouchId, position: impl Into<Position>, device: &str) -> Self {
        Self::at(Utc::now(), id, TouchKind::Move, position.into(), device)
    }

    pub fn up(id: TouchId, device: &str) -> Self {
        Self::at(Utc::now(), id, TouchKind::Up, Position::ORIGIN, device)
    }

    /// Build an event with an explicit timestamp.
    pub fn at(
        timestamp: DateTime<Utc>,
        id: TouchId,
        kind: TouchKind,
        position: Position,
        device: &str,
    ) -> Self {
        Self {
            timestamp,
            id,
            kind,
            position,
            double_tap: false,
            device: device.to_string(),
        }
    }

    pub fn with_double_tap(mut self, double_tap: bool) -> Self {
        self.double_tap = double_tap;
        self
    }
}

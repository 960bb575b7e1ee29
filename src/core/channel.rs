//! A single logical touch channel.
//!
//! A channel is created once and reused for many physical touches. While a
//! touch is bound to it, the channel tracks where the touch started, where it
//! is now, how long it has rested in continuous, low-jitter contact, and which
//! extra near-simultaneous touches belong to it.

use crate::collector::types::{Position, TouchId};
use crate::config::{Config, GridMode, OriginMode};
use crate::core::features::{
    density_score, dwell_score, max_norm, positional_encoding, velocity_score, FeatureVector,
};
use chrono::{DateTime, Duration, Utc};

/// Parameters shared by every channel in a pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelParams {
    pub origin: OriginMode,
    pub grid: GridMode,
    pub sample_interval: Duration,
    pub sample_interval_secs: f64,
    pub short_touch_secs: f64,
    pub velocity_normalization: f64,
    /// A sampled move longer than this decays the dwell accumulator
    pub reduce_threshold: f64,
    pub min_area: f64,
    pub max_area: f64,
}

impl ChannelParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin: config.origin,
            grid: config.grid,
            sample_interval: Config::time_delta(config.sample_interval),
            sample_interval_secs: config.sample_interval.as_secs_f64(),
            short_touch_secs: config.short_touch_threshold.as_secs_f64(),
            velocity_normalization: config.velocity_normalization,
            reduce_threshold: max_norm(config.origin) / config.reduce_divisor,
            min_area: config.min_area,
            max_area: config.max_area,
        }
    }
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// An auxiliary touch riding along with an active channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMember {
    pub id: TouchId,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Channel {
    params: ChannelParams,
    identity: Option<TouchId>,
    active: bool,
    current: Position,
    previous: Position,
    previous_sample_time: DateTime<Utc>,
    start: Position,
    activation_time: Option<DateTime<Utc>>,
    /// Seconds of continuous contact
    dwell: f64,
    mode: u32,
    group: Vec<GroupMember>,
}

impl Channel {
    pub fn new(params: ChannelParams, now: DateTime<Utc>) -> Self {
        Self {
            params,
            identity: None,
            active: false,
            current: Position::ORIGIN,
            previous: Position::ORIGIN,
            previous_sample_time: now,
            start: Position::ORIGIN,
            activation_time: None,
            dwell: 0.0,
            mode: 0,
            group: Vec::new(),
        }
    }

    /// Start tracking the touch currently positioned on this channel.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.previous = self.current;
        self.start = self.current;
        self.activation_time = Some(now);
        self.active = true;
    }

    /// Release the channel. A touch with almost no dwell advances the mode.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.dwell < self.params.short_touch_secs {
            self.next_mode();
        }
        self.identity = None;
        self.current = Position::ORIGIN;
        self.previous = Position::ORIGIN;
        self.previous_sample_time = now;
        self.dwell = 0.0;
        self.active = false;
        self.group.clear();
    }

    /// Rate-limited position update.
    ///
    /// The previous sample only advances once per sampling interval; the
    /// current position always follows the touch. Large jumps between samples
    /// collapse the dwell accumulator, steady contact grows it.
    pub fn move_to(&mut self, position: Position, now: DateTime<Utc>) {
        if now - self.previous_sample_time > self.params.sample_interval {
            let ds = self.current.distance(&self.previous);
            if ds > self.params.reduce_threshold {
                self.dwell *= 0.1;
            } else {
                self.dwell += self.params.sample_interval_secs;
            }
            self.previous = self.current;
            self.previous_sample_time = now;
        }
        self.current = position;
    }

    pub fn rebind(&mut self, id: TouchId) {
        self.identity = Some(id);
    }

    pub fn next_mode(&mut self) {
        self.mode += 1;
    }

    pub fn prev_mode(&mut self) {
        self.mode = self.mode.saturating_sub(1);
    }

    pub fn add_to_group(&mut self, member: GroupMember) {
        self.group.push(member);
    }

    /// Remove a grouped touch, returning it if present.
    pub fn remove_from_group(&mut self, id: TouchId) -> Option<GroupMember> {
        let index = self.group.iter().position(|m| m.id == id)?;
        Some(self.group.remove(index))
    }

    /// Track a grouped touch's position. Returns false if `id` is not grouped here.
    pub fn move_group_member(&mut self, id: TouchId, position: Position) -> bool {
        match self.group.iter_mut().find(|m| m.id == id) {
            Some(member) => {
                member.position = position;
                true
            }
            None => false,
        }
    }

    pub fn has_group_member(&self, id: TouchId) -> bool {
        self.group.iter().any(|m| m.id == id)
    }

    pub fn positional_feature(&self) -> [f64; 2] {
        positional_encoding(self.current, self.params.origin, self.params.grid)
    }

    pub fn velocity_feature(&self) -> f64 {
        velocity_score(
            self.current,
            self.previous,
            self.params.sample_interval_secs,
            self.params.velocity_normalization,
        )
    }

    pub fn dwell_score(&self) -> f64 {
        dwell_score(self.dwell)
    }

    pub fn density_feature(&self) -> f64 {
        density_score(
            self.current,
            self.group.first().map(|m| m.position),
            self.params.min_area,
            self.params.max_area,
        )
    }

    /// Raw position for the positional stream; `(0,0)` when released.
    pub fn positional_raw(&self) -> [f64; 2] {
        [self.current.x, self.current.y]
    }

    /// The channel's feature vector for this tick.
    pub fn snapshot(&self) -> FeatureVector {
        if !self.active {
            return FeatureVector::INACTIVE;
        }

        let [p0, p1] = self.positional_feature();
        FeatureVector([
            self.start.x,
            self.start.y,
            p0,
            p1,
            self.velocity_feature(),
            self.dwell_score(),
            self.mode as f64,
            self.density_feature(),
        ])
    }

    pub fn identity(&self) -> Option<TouchId> {
        self.identity
    }

    pub fn is_bound_to(&self, id: TouchId) -> bool {
        self.identity == Some(id)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_position(&self) -> Position {
        self.current
    }

    pub fn previous_position(&self) -> Position {
        self.previous
    }

    pub fn start_position(&self) -> Position {
        self.start
    }

    pub fn activation_time(&self) -> Option<DateTime<Utc>> {
        self.activation_time
    }

    /// Accumulated dwell in seconds.
    pub fn dwell(&self) -> f64 {
        self.dwell
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn group(&self) -> &[GroupMember] {
        &self.group
    }
}

//! Fixed-size channel pool with one staging slot.

use crate::collector::types::TouchId;
use crate::config::Config;
use crate::core::channel::{Channel, ChannelParams};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Address of a channel in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSlot {
    /// One of the broadcast channels, by index
    Regular(usize),
    /// Overflow slot that holds a touch until a regular channel frees up
    Staging,
}

impl fmt::Display for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSlot::Regular(index) => write!(f, "channel{}", index + 1),
            ChannelSlot::Staging => write!(f, "staging"),
        }
    }
}

/// N regular channels, never reordered, plus the staging channel.
#[derive(Debug, Clone)]
pub struct ChannelPool {
    regular: Vec<Channel>,
    staging: Channel,
}

/// The pool as shared between the router and the broadcaster.
pub type SharedPool = Arc<Mutex<ChannelPool>>;

impl ChannelPool {
    pub fn new(params: ChannelParams, channels: usize, now: DateTime<Utc>) -> Self {
        Self {
            regular: (0..channels).map(|_| Channel::new(params, now)).collect(),
            staging: Channel::new(params, now),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ChannelParams::from_config(config), config.channels, Utc::now())
    }

    pub fn into_shared(self) -> SharedPool {
        Arc::new(Mutex::new(self))
    }

    /// Number of regular channels.
    pub fn len(&self) -> usize {
        self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_empty()
    }

    /// Every slot in evaluation order: regular channels first, staging last.
    pub fn slots(&self) -> impl Iterator<Item = ChannelSlot> {
        (0..self.regular.len())
            .map(ChannelSlot::Regular)
            .chain(std::iter::once(ChannelSlot::Staging))
    }

    pub fn get(&self, slot: ChannelSlot) -> Option<&Channel> {
        match slot {
            ChannelSlot::Regular(index) => self.regular.get(index),
            ChannelSlot::Staging => Some(&self.staging),
        }
    }

    pub fn get_mut(&mut self, slot: ChannelSlot) -> Option<&mut Channel> {
        match slot {
            ChannelSlot::Regular(index) => self.regular.get_mut(index),
            ChannelSlot::Staging => Some(&mut self.staging),
        }
    }

    pub fn regular(&self) -> &[Channel] {
        &self.regular
    }

    pub fn staging(&self) -> &Channel {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut Channel {
        &mut self.staging
    }

    fn iter_slots(&self) -> impl Iterator<Item = (ChannelSlot, &Channel)> + '_ {
        self.regular
            .iter()
            .enumerate()
            .map(|(index, ch)| (ChannelSlot::Regular(index), ch))
            .chain(std::iter::once((ChannelSlot::Staging, &self.staging)))
    }

    /// First inactive channel, first-fit by index, staging last.
    pub fn first_free(&self) -> Option<ChannelSlot> {
        self.iter_slots()
            .find(|(_, ch)| !ch.is_active())
            .map(|(slot, _)| slot)
    }

    /// Channel currently bound to `id`.
    pub fn find_bound(&self, id: TouchId) -> Option<ChannelSlot> {
        self.iter_slots()
            .find(|(_, ch)| ch.is_bound_to(id))
            .map(|(slot, _)| slot)
    }

    /// Regular channel currently bound to `id`.
    pub fn find_regular_bound(&self, id: TouchId) -> Option<usize> {
        self.regular.iter().position(|ch| ch.is_bound_to(id))
    }

    /// Channel whose group contains `id`.
    pub fn find_group_owner(&self, id: TouchId) -> Option<ChannelSlot> {
        self.iter_slots()
            .find(|(_, ch)| ch.has_group_member(id))
            .map(|(slot, _)| slot)
    }

    /// Active channel with the latest activation time.
    pub fn most_recently_activated(&self) -> Option<ChannelSlot> {
        self.iter_slots()
            .filter(|(_, ch)| ch.is_active())
            .filter_map(|(slot, ch)| ch.activation_time().map(|at| (slot, at)))
            .max_by_key(|(_, at)| *at)
            .map(|(slot, _)| slot)
    }

    /// Active channels, staging included.
    pub fn active_count(&self) -> usize {
        self.iter_slots().filter(|(_, ch)| ch.is_active()).count()
    }

    pub fn active_regular_count(&self) -> usize {
        self.regular.iter().filter(|ch| ch.is_active()).count()
    }
}

/// Lock the shared pool, recovering the state if another holder panicked.
pub fn lock_pool(pool: &SharedPool) -> MutexGuard<'_, ChannelPool> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

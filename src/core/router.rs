//! Routes raw touch events onto channels.
//!
//! Each external touch id moves through Unseen, Provisional (staging),
//! Active and Released. The router owns the assignment policy: first-fit
//! onto regular channels, overflow into staging, grouping of near-simultaneous
//! extra touches, and promotion or hot-swap when a regular touch lifts.

use crate::collector::types::{Position, TouchEvent, TouchId, TouchKind};
use crate::config::Config;
use crate::core::channel::GroupMember;
use crate::core::pool::{lock_pool, ChannelPool, ChannelSlot, SharedPool};
use crate::stats::SharedStats;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// What the router did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Touch bound to a free channel
    Assigned(ChannelSlot),
    /// Double tap stepped a free channel's mode back
    ModeDecremented(ChannelSlot),
    /// Touch attached to the group of a recently activated channel
    Grouped(ChannelSlot),
    /// No free channel and no recent group to join
    Dropped,
    Moved(ChannelSlot),
    GroupMemberMoved(ChannelSlot),
    Released(ChannelSlot),
    /// A grouped touch took over the channel
    Promoted { slot: ChannelSlot, id: TouchId },
    /// The staging touch took over the channel
    HotSwapped { slot: ChannelSlot, id: TouchId },
    GroupMemberReleased(ChannelSlot),
    /// Event came from another device
    Ignored,
    /// Move or up for an id nobody holds
    Unknown,
}

pub struct TouchRouter {
    pool: SharedPool,
    device: String,
    grouping_window: Duration,
    stats: SharedStats,
}

impl TouchRouter {
    pub fn new(pool: SharedPool, config: &Config, stats: SharedStats) -> Self {
        Self {
            pool,
            device: config.touch_device.clone(),
            grouping_window: Config::time_delta(config.grouping_window),
            stats,
        }
    }

    /// Device tag this router accepts.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    /// Route one event, stamped with its own timestamp.
    pub fn handle(&self, event: &TouchEvent) -> RouteOutcome {
        if event.device != self.device {
            self.stats.record_event_ignored();
            return RouteOutcome::Ignored;
        }

        let now = event.timestamp;
        let outcome = match event.kind {
            TouchKind::Down => self.touch_down(event.id, event.position, event.double_tap, now),
            TouchKind::Move => self.touch_move(event.id, event.position, now),
            TouchKind::Up => self.touch_up(event.id, now),
        };

        self.stats.record_event_routed();
        match outcome {
            RouteOutcome::Grouped(_) => self.stats.record_touch_grouped(),
            RouteOutcome::Dropped => self.stats.record_touch_dropped(),
            RouteOutcome::HotSwapped { .. } => self.stats.record_hot_swap(),
            RouteOutcome::Unknown => self.stats.record_unknown_id(),
            _ => {}
        }
        outcome
    }

    pub fn touch_down(
        &self,
        id: TouchId,
        position: Position,
        double_tap: bool,
        now: DateTime<Utc>,
    ) -> RouteOutcome {
        let mut pool = lock_pool(&self.pool);

        if let Some(slot) = pool.first_free() {
            let Some(channel) = pool.get_mut(slot) else {
                return RouteOutcome::Dropped;
            };
            if double_tap {
                channel.prev_mode();
                debug!(id, %slot, mode = channel.mode(), "double tap");
                return RouteOutcome::ModeDecremented(slot);
            }
            channel.move_to(position, now);
            channel.rebind(id);
            channel.activate(now);
            debug!(id, %slot, x = position.x, y = position.y, "touch assigned");
            return RouteOutcome::Assigned(slot);
        }

        self.group_or_drop(&mut pool, id, position, now)
    }

    /// Saturated pool: join the latest channel if it only just started.
    fn group_or_drop(
        &self,
        pool: &mut ChannelPool,
        id: TouchId,
        position: Position,
        now: DateTime<Utc>,
    ) -> RouteOutcome {
        let recent = pool.most_recently_activated().and_then(|slot| {
            let activated = pool.get(slot)?.activation_time()?;
            (now - activated <= self.grouping_window).then_some(slot)
        });

        let Some(slot) = recent else {
            debug!(id, "no free channel, touch dropped");
            return RouteOutcome::Dropped;
        };
        let Some(channel) = pool.get_mut(slot) else {
            return RouteOutcome::Dropped;
        };
        channel.add_to_group(GroupMember { id, position });
        debug!(id, %slot, group = channel.group().len(), "touch grouped");
        RouteOutcome::Grouped(slot)
    }

    pub fn touch_move(&self, id: TouchId, position: Position, now: DateTime<Utc>) -> RouteOutcome {
        let mut pool = lock_pool(&self.pool);

        if let Some(slot) = pool.find_bound(id) {
            if let Some(channel) = pool.get_mut(slot) {
                channel.move_to(position, now);
                return RouteOutcome::Moved(slot);
            }
        }

        if let Some(slot) = pool.find_group_owner(id) {
            if let Some(channel) = pool.get_mut(slot) {
                channel.move_group_member(id, position);
                return RouteOutcome::GroupMemberMoved(slot);
            }
        }

        RouteOutcome::Unknown
    }

    pub fn touch_up(&self, id: TouchId, now: DateTime<Utc>) -> RouteOutcome {
        let mut pool = lock_pool(&self.pool);

        if let Some(index) = pool.find_regular_bound(id) {
            return Self::release_regular(&mut pool, index, now);
        }

        if let Some(slot) = pool.find_group_owner(id) {
            if let Some(channel) = pool.get_mut(slot) {
                channel.remove_from_group(id);
                debug!(id, %slot, "grouped touch released");
                return RouteOutcome::GroupMemberReleased(slot);
            }
        }

        if pool.staging().is_bound_to(id) {
            pool.staging_mut().deactivate(now);
            debug!(id, "staging touch released");
            return RouteOutcome::Released(ChannelSlot::Staging);
        }

        RouteOutcome::Unknown
    }

    /// A regular channel's touch lifted: hand the channel on if anyone waits.
    fn release_regular(pool: &mut ChannelPool, index: usize, now: DateTime<Utc>) -> RouteOutcome {
        let slot = ChannelSlot::Regular(index);
        let staging = pool.staging();
        let staged = match (staging.is_active(), staging.identity()) {
            (true, Some(id)) => Some((id, staging.current_position())),
            _ => None,
        };

        let Some(channel) = pool.get_mut(slot) else {
            return RouteOutcome::Unknown;
        };

        if let Some(member) = channel.group().first().copied() {
            channel.remove_from_group(member.id);
            channel.rebind(member.id);
            channel.move_to(member.position, now);
            debug!(id = member.id, %slot, "grouped touch promoted");
            return RouteOutcome::Promoted { slot, id: member.id };
        }

        match staged {
            Some((id, position)) => {
                channel.move_to(position, now);
                channel.rebind(id);
                channel.activate(now);
                pool.staging_mut().deactivate(now);
                debug!(id, %slot, "staging touch hot-swapped");
                RouteOutcome::HotSwapped { slot, id }
            }
            None => {
                channel.deactivate(now);
                debug!(%slot, mode = channel.mode(), "channel released");
                RouteOutcome::Released(slot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::ChannelParams;
    use crate::stats::create_shared_stats;

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    fn router(channels: usize) -> TouchRouter {
        let config = Config {
            channels,
            ..Config::default()
        };
        let pool = ChannelPool::new(ChannelParams::from_config(&config), channels, t(0)).into_shared();
        TouchRouter::new(pool, &config, create_shared_stats())
    }

    #[test]
    fn test_first_fit_then_staging() {
        let router = router(2);
        let p = Position::new(0.5, 0.5);

        assert_eq!(
            router.touch_down(1, p, false, t(0)),
            RouteOutcome::Assigned(ChannelSlot::Regular(0))
        );
        assert_eq!(
            router.touch_down(2, p, false, t(1)),
            RouteOutcome::Assigned(ChannelSlot::Regular(1))
        );
        assert_eq!(
            router.touch_down(3, p, false, t(2)),
            RouteOutcome::Assigned(ChannelSlot::Staging)
        );
    }

    #[test]
    fn test_grouping_within_window() {
        let router = router(1);
        let p = Position::new(0.5, 0.5);
        router.touch_down(1, p, false, t(0));
        router.touch_down(2, p, false, t(100));

        // Staging is the most recently activated channel.
        assert_eq!(
            router.touch_down(3, Position::new(0.6, 0.6), false, t(200)),
            RouteOutcome::Grouped(ChannelSlot::Staging)
        );
        assert_eq!(router.touch_down(4, p, false, t(900)), RouteOutcome::Dropped);
    }

    #[test]
    fn test_grouped_touch_moves_and_releases() {
        let router = router(1);
        let p = Position::new(0.5, 0.5);
        router.touch_down(1, p, false, t(0));
        router.touch_down(2, p, false, t(10));
        router.touch_down(3, p, false, t(20));

        assert_eq!(
            router.touch_move(3, Position::new(0.7, 0.7), t(30)),
            RouteOutcome::GroupMemberMoved(ChannelSlot::Staging)
        );
        {
            let pool = lock_pool(router.pool());
            assert_eq!(pool.staging().group()[0].position, Position::new(0.7, 0.7));
        }
        assert_eq!(
            router.touch_up(3, t(40)),
            RouteOutcome::GroupMemberReleased(ChannelSlot::Staging)
        );
        assert!(lock_pool(router.pool()).staging().group().is_empty());
    }

    #[test]
    fn test_promotion_from_group() {
        let router = router(1);
        router.touch_down(1, Position::new(0.2, 0.2), false, t(0));
        router.touch_down(2, Position::new(0.3, 0.3), false, t(5));
        // Staging was taken by 2; release it so the group goes to channel 1.
        router.touch_up(2, t(6));
        lock_pool(router.pool())
            .get_mut(ChannelSlot::Regular(0))
            .unwrap()
            .add_to_group(GroupMember {
                id: 5,
                position: Position::new(0.8, 0.8),
            });

        assert_eq!(
            router.touch_up(1, t(50)),
            RouteOutcome::Promoted {
                slot: ChannelSlot::Regular(0),
                id: 5
            }
        );
        let pool = lock_pool(router.pool());
        let ch = pool.get(ChannelSlot::Regular(0)).unwrap();
        assert!(ch.is_active());
        assert_eq!(ch.identity(), Some(5));
        assert_eq!(ch.current_position(), Position::new(0.8, 0.8));
        assert!(ch.group().is_empty());
    }

    #[test]
    fn test_double_tap_decrements_first_free() {
        let router = router(1);
        {
            let mut pool = lock_pool(router.pool());
            let ch = pool.get_mut(ChannelSlot::Regular(0)).unwrap();
            ch.next_mode();
            ch.next_mode();
        }
        assert_eq!(
            router.touch_down(9, Position::new(0.1, 0.1), true, t(0)),
            RouteOutcome::ModeDecremented(ChannelSlot::Regular(0))
        );
        let pool = lock_pool(router.pool());
        let ch = pool.get(ChannelSlot::Regular(0)).unwrap();
        assert_eq!(ch.mode(), 1);
        assert!(!ch.is_active());
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let router = router(1);
        assert_eq!(
            router.touch_move(42, Position::new(0.1, 0.1), t(0)),
            RouteOutcome::Unknown
        );
        assert_eq!(router.touch_up(42, t(1)), RouteOutcome::Unknown);
        assert_eq!(lock_pool(router.pool()).active_count(), 0);
    }

    #[test]
    fn test_handle_filters_device_and_counts() {
        let stats = create_shared_stats();
        let config = Config::default();
        let pool = ChannelPool::from_config(&config).into_shared();
        let router = TouchRouter::new(pool, &config, stats.clone());

        let foreign = TouchEvent::at(t(0), 1, TouchKind::Down, Position::new(0.5, 0.5), "mouse");
        assert_eq!(router.handle(&foreign), RouteOutcome::Ignored);

        let down = TouchEvent::at(t(0), 1, TouchKind::Down, Position::new(0.5, 0.5), "wm_touch");
        assert_eq!(
            router.handle(&down),
            RouteOutcome::Assigned(ChannelSlot::Regular(0))
        );
        let stray = TouchEvent::at(t(1), 77, TouchKind::Up, Position::ORIGIN, "wm_touch");
        assert_eq!(router.handle(&stray), RouteOutcome::Unknown);

        let snapshot = stats.stats();
        assert_eq!(snapshot.events_ignored, 1);
        assert_eq!(snapshot.events_routed, 2);
        assert_eq!(snapshot.unknown_ids, 1);
    }
}

//! Integration tests for touch routing through the public API

use chrono::{DateTime, Utc};
use std::io::Write;
use touch_feature_agent::collector::{
    Position, ReplayCollector, ReplayConfig, ReplaySource, TouchEvent, TouchKind,
};
use touch_feature_agent::core::{
    lock_pool, ChannelParams, ChannelPool, ChannelSlot, FeatureBroadcaster, RouteOutcome,
    TouchRouter,
};
use touch_feature_agent::stats::{create_shared_stats, SharedStats};
use touch_feature_agent::Config;

fn t(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
}

fn setup(channels: usize) -> (TouchRouter, SharedStats) {
    let config = Config {
        channels,
        ..Config::default()
    };
    let pool = ChannelPool::new(ChannelParams::from_config(&config), channels, t(0)).into_shared();
    let stats = create_shared_stats();
    (TouchRouter::new(pool, &config, stats.clone()), stats)
}

/// Hold a touch still with one move per sampling interval.
fn hold(router: &TouchRouter, id: i64, at: Position, from_ms: i64, samples: i64) -> i64 {
    let mut now = from_ms;
    for _ in 0..samples {
        now += 11;
        router.touch_move(id, at, t(now));
    }
    now
}

#[test]
fn test_single_touch_lifecycle_keeps_mode() {
    let (router, _) = setup(1);
    let slot = ChannelSlot::Regular(0);

    assert_eq!(
        router.touch_down(7, Position::new(0.2, 0.3), false, t(0)),
        RouteOutcome::Assigned(slot)
    );
    let end = hold(&router, 7, Position::new(0.25, 0.3), 0, 10);
    {
        let pool = lock_pool(router.pool());
        let ch = pool.get(slot).unwrap();
        assert!(ch.dwell() >= 0.04);
        assert_eq!(ch.start_position(), Position::new(0.2, 0.3));
        assert_eq!(ch.current_position(), Position::new(0.25, 0.3));
    }

    assert_eq!(router.touch_up(7, t(end + 5)), RouteOutcome::Released(slot));
    let pool = lock_pool(router.pool());
    let ch = pool.get(slot).unwrap();
    assert!(!ch.is_active());
    assert_eq!(ch.mode(), 0);
}

#[test]
fn test_staging_hot_swap() {
    let (router, stats) = setup(1);
    let p1 = Position::new(0.1, 0.1);
    let p2 = Position::new(0.7, 0.6);

    router.touch_down(1, p1, false, t(0));
    assert_eq!(
        router.touch_down(2, p2, false, t(5)),
        RouteOutcome::Assigned(ChannelSlot::Staging)
    );

    let before = lock_pool(router.pool()).active_regular_count();
    let event = TouchEvent::at(t(20), 1, TouchKind::Up, Position::ORIGIN, "wm_touch");
    assert_eq!(
        router.handle(&event),
        RouteOutcome::HotSwapped {
            slot: ChannelSlot::Regular(0),
            id: 2
        }
    );

    let pool = lock_pool(router.pool());
    let ch = pool.get(ChannelSlot::Regular(0)).unwrap();
    assert!(ch.is_active());
    assert_eq!(ch.identity(), Some(2));
    assert_eq!(ch.current_position(), p2);
    assert!(!pool.staging().is_active());
    assert!(pool.active_regular_count() >= before);
    assert_eq!(stats.stats().hot_swaps, 1);
}

#[test]
fn test_short_touch_advances_mode_by_one() {
    let (router, _) = setup(2);
    for round in 0..3 {
        let base = round * 1000;
        router.touch_down(10 + round, Position::new(0.5, 0.5), false, t(base));
        router.touch_up(10 + round, t(base + 15));
        let pool = lock_pool(router.pool());
        assert_eq!(
            pool.get(ChannelSlot::Regular(0)).unwrap().mode(),
            (round + 1) as u32
        );
        assert_eq!(pool.get(ChannelSlot::Regular(1)).unwrap().mode(), 0);
    }
}

#[test]
fn test_active_channels_never_exceed_pool() {
    let channels = 2;
    let (router, _) = setup(channels);

    // Staggered touches: each lifts three arrivals later, so the pool saturates.
    let mut now = 0;
    for id in 0..30i64 {
        now += 37;
        let x = (id % 10) as f64 / 10.0;
        router.touch_down(id, Position::new(x, 1.0 - x), false, t(now));
        now += 11;
        router.touch_move(id, Position::new(x, 0.5), t(now));
        if id >= 3 {
            router.touch_up(id - 3, t(now + 1));
        }
        assert!(lock_pool(router.pool()).active_count() <= channels + 1);
    }
}

#[test]
fn test_hot_swap_never_reduces_active_regular_channels() {
    let (router, _) = setup(3);
    let mut now = 0;
    for id in 0..4 {
        now += 20;
        router.touch_down(id, Position::new(0.1 * id as f64, 0.5), false, t(now));
    }
    assert!(lock_pool(router.pool()).staging().is_active());

    let before = lock_pool(router.pool()).active_regular_count();
    router.touch_up(1, t(now + 50));
    let pool = lock_pool(router.pool());
    assert!(pool.active_regular_count() >= before);
    assert_eq!(pool.find_bound(3), Some(ChannelSlot::Regular(1)));
}

#[test]
fn test_saturated_touch_groups_then_drops() {
    let (router, stats) = setup(1);
    let p = Position::new(0.5, 0.5);
    let events = [
        TouchEvent::at(t(0), 1, TouchKind::Down, p, "wm_touch"),
        TouchEvent::at(t(50), 2, TouchKind::Down, p, "wm_touch"),
        TouchEvent::at(t(100), 3, TouchKind::Down, Position::new(0.9, 0.5), "wm_touch"),
        TouchEvent::at(t(2000), 4, TouchKind::Down, p, "wm_touch"),
    ];
    let outcomes: Vec<RouteOutcome> = events.iter().map(|e| router.handle(e)).collect();

    assert_eq!(outcomes[2], RouteOutcome::Grouped(ChannelSlot::Staging));
    assert_eq!(outcomes[3], RouteOutcome::Dropped);
    let snapshot = stats.stats();
    assert_eq!(snapshot.touches_grouped, 1);
    assert_eq!(snapshot.touches_dropped, 1);

    // The grouped touch spreads the staging channel's density.
    let pool = lock_pool(router.pool());
    assert!(pool.staging().density_feature() > 0.0);
}

#[test]
fn test_features_stay_bounded_while_moving() {
    let (router, _) = setup(1);
    router.touch_down(1, Position::new(0.0, 0.0), false, t(0));

    let mut broadcaster = FeatureBroadcaster::new(router.pool().clone());
    let mut now = 0;
    for step in 0..50 {
        now += 11;
        let x = if step % 2 == 0 { 1.0 } else { 0.0 };
        router.touch_move(1, Position::new(x, 0.5), t(now));

        let frame = broadcaster.capture();
        let features = frame.features[0].values;
        assert!((0.0..=1.0).contains(&features.velocity()));
        assert!((0.0..=1.0).contains(&features.touch_time()));
        assert!((0.0..=1.0).contains(&features.density()));
        assert_eq!(features.positional(), (x, 0.5));
    }
}

#[test]
fn test_replayed_script_drives_router() {
    let mut script = tempfile::NamedTempFile::new().unwrap();
    writeln!(script, "# two fingers, one from another device").unwrap();
    writeln!(script, r#"{{"offset_ms": 0, "id": 1, "kind": "down", "x": 0.2, "y": 0.3}}"#).unwrap();
    writeln!(script, r#"{{"offset_ms": 5, "id": 2, "kind": "down", "x": 0.6, "y": 0.6}}"#).unwrap();
    writeln!(
        script,
        r#"{{"offset_ms": 6, "id": 9, "kind": "down", "x": 0.6, "y": 0.6, "device": "mouse"}}"#
    )
    .unwrap();
    writeln!(script, r#"{{"offset_ms": 30, "id": 1, "kind": "up"}}"#).unwrap();
    writeln!(script, r#"{{"offset_ms": 40, "id": 5, "kind": "up"}}"#).unwrap();

    let mut collector = ReplayCollector::new(ReplayConfig {
        source: ReplaySource::File(script.path().to_path_buf()),
        default_device: "wm_touch".to_string(),
        realtime: false,
    });
    collector.start().unwrap();

    let (router, stats) = setup(1);
    let outcomes: Vec<RouteOutcome> = collector
        .receiver()
        .iter()
        .map(|event| router.handle(&event))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            RouteOutcome::Assigned(ChannelSlot::Regular(0)),
            RouteOutcome::Assigned(ChannelSlot::Staging),
            RouteOutcome::Ignored,
            RouteOutcome::HotSwapped {
                slot: ChannelSlot::Regular(0),
                id: 2
            },
            RouteOutcome::Unknown,
        ]
    );

    let snapshot = stats.stats();
    assert_eq!(snapshot.events_routed, 4);
    assert_eq!(snapshot.events_ignored, 1);
    assert_eq!(snapshot.unknown_ids, 1);
}

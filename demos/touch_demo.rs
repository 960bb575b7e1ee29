//! Demonstration of touch routing and feature capture.
//!
//! This example shows how to:
//! 1. Build a channel pool and a router from a configuration
//! 2. Feed a scripted two-finger hand-off through the router
//! 3. Capture broadcast frames from the pool
//!
//! Run with: cargo run --example touch_demo

use chrono::{Duration, Utc};
use touch_feature_agent::{
    collector::{Position, TouchEvent, TouchKind},
    core::{ChannelPool, FeatureBroadcaster, Frame, TouchRouter, FEATURE_NAMES},
    stats::SessionStats,
    Config,
};
use std::sync::Arc;

fn print_frame(label: &str, frame: &Frame) {
    println!("{label}");
    println!("  positions: {:?}", frame.positions);
    for tagged in &frame.features {
        let values: Vec<String> = FEATURE_NAMES
            .iter()
            .zip(tagged.values.as_slice())
            .map(|(name, v)| format!("{name}={v:.3}"))
            .collect();
        println!("  {}: {}", tagged.tag, values.join(" "));
    }
    println!();
}

fn main() {
    println!("Touch Feature Agent - Routing Demo");
    println!("==================================");
    println!();

    let config = Config {
        channels: 1,
        ..Config::default()
    };
    let device = config.touch_device.clone();
    let stats = Arc::new(SessionStats::new());
    let pool = ChannelPool::from_config(&config).into_shared();
    let router = TouchRouter::new(pool.clone(), &config, stats.clone());
    let mut broadcaster = FeatureBroadcaster::new(pool);

    let start = Utc::now();
    let at = |ms: i64| start + Duration::milliseconds(ms);

    // Finger 1 lands and rests; finger 2 arrives while the only channel is busy.
    let mut script = vec![TouchEvent::at(
        at(0),
        1,
        TouchKind::Down,
        Position::new(0.2, 0.3),
        &device,
    )];
    for step in 1..=8 {
        script.push(TouchEvent::at(
            at(step * 11),
            1,
            TouchKind::Move,
            Position::new(0.22, 0.3),
            &device,
        ));
    }
    script.push(TouchEvent::at(
        at(100),
        2,
        TouchKind::Down,
        Position::new(0.7, 0.6),
        &device,
    ));

    for event in &script {
        let outcome = router.handle(event);
        println!("{:?} id={} -> {:?}", event.kind, event.id, outcome);
    }
    println!();
    print_frame("Frame with finger 1 on channel1:", &broadcaster.capture());

    // Finger 1 lifts: the staged finger takes over the channel.
    let lift = TouchEvent::at(at(150), 1, TouchKind::Up, Position::ORIGIN, &device);
    println!("Up id=1 -> {:?}", router.handle(&lift));
    println!();
    print_frame("Frame after the hand-off:", &broadcaster.capture());

    let lift = TouchEvent::at(at(160), 2, TouchKind::Up, Position::ORIGIN, &device);
    println!("Up id=2 -> {:?}", router.handle(&lift));
    println!();
    print_frame("Idle frame:", &broadcaster.capture());

    println!("{}", stats.summary());
}

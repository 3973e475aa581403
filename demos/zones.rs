// MIT License - Copyright (c) 2026 SafeHome Project

//! Zone configuration walkthrough: create zones, reject an overlap,
//! exercise the shared motion-sensor rule, and switch SafeHome modes.
//!
//! Run with: cargo run --example zones

use std::sync::Arc;
use std::time::Duration;

use safehome::{
    event_channel, MemoryStorage, ModeRow, Rect, SensorGeometry, SensorKind, SensorRegistry,
    SensorRow, Storage, SystemSettingsRow, ZoneConfigurationEngine, ZoneDraft,
};

fn seed(storage: &MemoryStorage) {
    storage.seed_settings(SystemSettingsRow {
        active_mode_id: None,
        call_numbers: vec![],
    });
    for (id, kind) in [
        (1, SensorKind::WindowDoor),
        (2, SensorKind::WindowDoor),
        (5, SensorKind::MotionDetector),
    ] {
        storage.seed_sensor(SensorRow {
            id,
            kind,
            geometry: SensorGeometry::Point { x: 0, y: 0 },
            armed: false,
        });
    }
    storage.seed_mode(ModeRow {
        id: 1,
        name: "Away".to_string(),
        sensor_ids: vec![1, 2, 5],
    });
    storage.seed_mode(ModeRow {
        id: 2,
        name: "Home".to_string(),
        sensor_ids: vec![1],
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("safehome=debug").init();

    let storage = Arc::new(MemoryStorage::new());
    seed(&storage);

    let (events, _) = event_channel(64);
    let registry = SensorRegistry::new(
        storage.clone() as Arc<dyn Storage>,
        events.clone(),
        Duration::from_secs(1),
    );
    registry.load()?;
    let mut zones = ZoneConfigurationEngine::new(registry.clone(), storage, events);
    zones.load()?;

    println!("--- adding zones ---");
    assert!(zones.add_zone(ZoneDraft {
        name: "Kitchen".to_string(),
        rect: Rect::new(0.0, 0.0, 10.0, 10.0),
        sensor_ids: vec![1, 5],
    }));
    // Overlaps the kitchen: rejected.
    assert!(!zones.add_zone(ZoneDraft {
        name: "Pantry".to_string(),
        rect: Rect::new(5.0, 5.0, 15.0, 15.0),
        sensor_ids: vec![],
    }));
    assert!(zones.add_zone(ZoneDraft {
        name: "Lounge".to_string(),
        rect: Rect::new(20.0, 0.0, 30.0, 10.0),
        sensor_ids: vec![2, 5],
    }));

    println!("--- arming both zones ---");
    assert!(zones.arm_zone(1));
    assert!(zones.arm_zone(2));

    println!("--- disarming the kitchen: motion sensor 5 must linger ---");
    assert!(zones.disarm_zone(1));
    assert!(registry.snapshot(5).is_some_and(|s| s.is_armed()));

    println!("--- disarming the lounge: sensor 5 released ---");
    assert!(zones.disarm_zone(2));
    assert!(registry.snapshot(5).is_some_and(|s| !s.is_armed()));

    println!("--- switching modes ---");
    assert!(zones.change_to_mode("Away"));
    assert!(registry.snapshot(2).is_some_and(|s| s.is_armed()));
    assert!(zones.change_to_mode("Home"));
    assert!(registry.snapshot(2).is_some_and(|s| !s.is_armed()));

    for zone in zones.all_zones() {
        println!("zone {} {:?} armed={}", zone.id, zone.name, zone.armed);
    }
    Ok(())
}

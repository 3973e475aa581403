// MIT License - Copyright (c) 2026 SafeHome Project

//! End-to-end intrusion walkthrough: power on, arm a zone, trip a
//! sensor, watch the alarm and escalation, then clear the intrusion.
//!
//! Run with: cargo run --example intrusion

use std::sync::Arc;
use std::time::Duration;

use safehome::{
    EngineConfig, MemoryStorage, SafeHomeSystem, SensorGeometry, SensorKind, SensorRow,
    SimulatedCallService, SystemSettingsRow, UserRow, ZoneRow,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("safehome=info").init();

    let storage = Arc::new(MemoryStorage::new());
    storage.seed_user(UserRow {
        username: "master".to_string(),
        password: Some("1234".to_string()),
    });
    storage.seed_user(UserRow {
        username: "guest".to_string(),
        password: None,
    });
    storage.seed_settings(SystemSettingsRow {
        active_mode_id: None,
        call_numbers: vec!["119".to_string()],
    });
    storage.seed_sensor(SensorRow {
        id: 1,
        kind: SensorKind::WindowDoor,
        geometry: SensorGeometry::Point { x: 2, y: 3 },
        armed: false,
    });
    storage.seed_zone(ZoneRow {
        id: 1,
        name: "Front Door".to_string(),
        x1: 0.0,
        y1: 0.0,
        x2: 10.0,
        y2: 10.0,
        sensor_ids: vec![1],
        armed: false,
    });

    // Short countdown so the demo escalates quickly.
    let config = EngineConfig::builder()
        .ring_countdown(Duration::from_secs(5))
        .build();
    let system = SafeHomeSystem::start(storage, config, Arc::new(SimulatedCallService::new()))?;

    let mut events = system.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("event: {event:?}");
        }
    });

    system.press("1").await?; // power on
    tokio::time::sleep(Duration::from_millis(100)).await;

    {
        let zones = system.zones();
        let mut zones = zones.lock().unwrap();
        assert!(zones.arm_zone(1));
    }

    println!("--- tripping sensor 1 ---");
    system.registry().intrude(1);

    // Wait past the monitor tick and the shortened ring countdown.
    tokio::time::sleep(Duration::from_secs(7)).await;

    println!("--- clearing the intrusion ---");
    system.registry().release(1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("final panel state: {}", system.panel_state());

    system.shutdown().await;
    printer.abort();
    Ok(())
}

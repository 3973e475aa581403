// MIT License - Copyright (c) 2026 SafeHome Project

//! Interactive SafeHome panel simulator.
//!
//! Loads a TOML description of the installation (sensors, zones, modes,
//! users), starts the engine, and drives it from stdin: panel buttons are
//! typed as their tokens, and `intrude`/`release` fake physical triggers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use safehome::{
    EngineConfig, EngineEvent, MemoryStorage, ModeRow, SafeHomeSystem, SensorGeometry, SensorKind,
    SensorRow, SimulatedCallService, SystemSettingsRow, UserRow, ZoneRow,
};

#[derive(Parser, Debug)]
#[command(name = "safehome-panel", about = "SafeHome security panel simulator")]
struct Cli {
    /// Path to the installation config file
    #[arg(short, long, default_value = "safehome.toml")]
    config: PathBuf,

    /// Log filter (overrides RUST_LOG), e.g. "info" or "safehome=debug"
    #[arg(short, long)]
    log: Option<String>,
}

fn default_master_password() -> String {
    "1234".to_string()
}

fn default_call_numbers() -> Vec<String> {
    vec!["119".to_string()]
}

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default = "default_master_password")]
    master_password: String,
    /// Guest password; omit for passwordless guest login.
    #[serde(default)]
    guest_password: Option<String>,
    #[serde(default = "default_call_numbers")]
    call_numbers: Vec<String>,
    #[serde(default)]
    sensors: Vec<SensorConfig>,
    #[serde(default)]
    zones: Vec<ZoneConfig>,
    #[serde(default)]
    modes: Vec<ModeConfig>,
}

#[derive(Debug, Deserialize)]
struct SensorConfig {
    id: u32,
    /// "window_door" or "motion"
    kind: String,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default)]
    x2: i32,
    #[serde(default)]
    y2: i32,
}

#[derive(Debug, Deserialize)]
struct ZoneConfig {
    id: u32,
    name: String,
    /// [x1, y1, x2, y2]
    rect: [f64; 4],
    #[serde(default)]
    sensors: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ModeConfig {
    id: u32,
    name: String,
    #[serde(default)]
    sensors: Vec<u32>,
}

impl Config {
    fn load(path: &PathBuf) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}

fn build_storage(config: &Config) -> anyhow::Result<Arc<MemoryStorage>> {
    let storage = Arc::new(MemoryStorage::new());
    storage.seed_user(UserRow {
        username: "master".to_string(),
        password: Some(config.master_password.clone()),
    });
    storage.seed_user(UserRow {
        username: "guest".to_string(),
        password: config.guest_password.clone(),
    });
    storage.seed_settings(SystemSettingsRow {
        active_mode_id: None,
        call_numbers: config.call_numbers.clone(),
    });
    for sensor in &config.sensors {
        let (kind, geometry) = match sensor.kind.as_str() {
            "window_door" => (
                SensorKind::WindowDoor,
                SensorGeometry::Point {
                    x: sensor.x,
                    y: sensor.y,
                },
            ),
            "motion" => (
                SensorKind::MotionDetector,
                SensorGeometry::Segment {
                    x1: sensor.x,
                    y1: sensor.y,
                    x2: sensor.x2,
                    y2: sensor.y2,
                },
            ),
            other => anyhow::bail!("sensor {}: unknown kind {other:?}", sensor.id),
        };
        storage.seed_sensor(SensorRow {
            id: sensor.id,
            kind,
            geometry,
            armed: false,
        });
    }
    for zone in &config.zones {
        storage.seed_zone(ZoneRow {
            id: zone.id,
            name: zone.name.clone(),
            x1: zone.rect[0],
            y1: zone.rect[1],
            x2: zone.rect[2],
            y2: zone.rect[3],
            sensor_ids: zone.sensors.clone(),
            armed: false,
        });
    }
    for mode in &config.modes {
        storage.seed_mode(ModeRow {
            id: mode.id,
            name: mode.name.clone(),
            sensor_ids: mode.sensors.clone(),
        });
    }
    Ok(storage)
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::Display { line1, line2, prefix } => {
            if !prefix.is_empty() {
                println!("[panel] > {prefix}");
            } else {
                println!("[panel] {line1} | {line2}");
            }
        }
        EngineEvent::PanelStateChanged { old, new } => {
            println!("[state] {old} -> {new}");
        }
        EngineEvent::IndicatorsChanged { indicators } => {
            println!("[leds ] {indicators:?}");
        }
        EngineEvent::AlarmStarted => println!("[alarm] RINGING"),
        EngineEvent::AlarmStopped => println!("[alarm] silent"),
        EngineEvent::IntrusionDetected { sensor_id, kind } => {
            println!("[intru] sensor {sensor_id} ({kind})");
        }
        EngineEvent::ExternalCallPlaced { numbers } => {
            println!("[call ] dialed {}", numbers.join(", "));
        }
        EngineEvent::ZoneArmChanged { zone_id, armed } => {
            println!("[zone ] {zone_id} {}", if *armed { "armed" } else { "disarmed" });
        }
        EngineEvent::ModeChanged { name } => println!("[mode ] {name}"),
        EngineEvent::SystemInitComplete => println!("[sys  ] ready"),
    }
}

fn print_help() {
    println!("commands:");
    println!("  0-9 * # panic   panel buttons");
    println!("  intrude <id>    trip a sensor");
    println!("  release <id>    clear a sensor");
    println!("  sensors         list sensor state");
    println!("  zones           list zone state");
    println!("  quit            exit");
}

async fn handle_line(system: &SafeHomeSystem, line: &str) -> anyhow::Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(true);
    };
    match cmd {
        "quit" | "exit" => return Ok(false),
        "help" | "?" => print_help(),
        "intrude" | "release" => {
            let Some(id) = parts.next().and_then(|s| s.parse::<u32>().ok()) else {
                println!("usage: {cmd} <sensor-id>");
                return Ok(true);
            };
            let ok = if cmd == "intrude" {
                system.registry().intrude(id)
            } else {
                system.registry().release(id)
            };
            if !ok {
                println!("no sensor with id {id}");
            }
        }
        "sensors" => {
            for sensor in system.registry().all_snapshots() {
                println!(
                    "  sensor {} ({}) armed={} detected={}",
                    sensor.id,
                    sensor.kind,
                    sensor.is_armed(),
                    sensor.is_detected()
                );
            }
        }
        "zones" => {
            let zones = system.zones();
            let zones = zones.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            for zone in zones.all_zones() {
                println!(
                    "  zone {} {:?} armed={} sensors={:?}",
                    zone.id, zone.name, zone.armed, zone.sensor_ids
                );
            }
        }
        token @ ("panic" | "*" | "#") => system.press(token).await?,
        token if token.len() == 1 && token.chars().all(|c| c.is_ascii_digit()) => {
            system.press(token).await?;
        }
        other => println!("unknown command {other:?} (try \"help\")"),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(&cli.config)?;
    let storage = build_storage(&config)?;
    let system = SafeHomeSystem::start(
        storage,
        EngineConfig::default(),
        Arc::new(SimulatedCallService::new()),
    )
    .context("starting safehome engine")?;
    info!("simulator ready, type \"help\" for commands");

    let mut events = system.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            maybe_line = lines.next_line() => {
                match maybe_line {
                    Ok(Some(line)) => {
                        match handle_line(&system, &line).await {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(err) => {
                                error!(error = %err, "command failed");
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        error!(error = %err, "stdin read failed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
        }
    }

    system.shutdown().await;
    printer.abort();
    Ok(())
}

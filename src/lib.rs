// MIT License - Copyright (c) 2026 SafeHome Project

//! SafeHome security control engine.
//!
//! This crate implements the control core of the SafeHome panel:
//! simulated sensors with a background intrusion monitor, safety zones
//! and SafeHome modes, an independently clocked alarm sounder, and the
//! panel's authentication/escalation state machine. Frontends (CLI, GUI)
//! talk to it through [`SafeHomeSystem`] and observe it through the
//! [`EngineEvent`] broadcast stream.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use safehome::{
//!     EngineConfig, MemoryStorage, SafeHomeSystem, SimulatedCallService, SystemSettingsRow,
//!     UserRow,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(MemoryStorage::new());
//!     storage.seed_user(UserRow {
//!         username: "master".to_string(),
//!         password: Some("1234".to_string()),
//!     });
//!     storage.seed_settings(SystemSettingsRow {
//!         active_mode_id: None,
//!         call_numbers: vec!["119".to_string()],
//!     });
//!
//!     let system = SafeHomeSystem::start(
//!         storage,
//!         EngineConfig::default(),
//!         Arc::new(SimulatedCallService::new()),
//!     )?;
//!
//!     system.press("1").await?; // power on
//!     let mut events = system.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     system.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod auth;
pub mod call;
pub mod config;
pub mod constants;
pub mod devices;
pub mod error;
pub mod event;
pub mod panel;
pub mod sensors;
pub mod storage;
pub mod system;
pub mod zones;

pub use alarm::AlarmCoordinator;
pub use auth::{Authenticator, LoginManager, LoginRole, StorageAuthenticator};
pub use call::{CallService, SimulatedCallService};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use devices::{AlarmHardware, Sensor, SensorGeometry, SensorKind, SimulatedAlarm};
pub use error::{EngineError, Result};
pub use event::{event_channel, EngineEvent, EventReceiver, EventSender};
pub use panel::{ControlPanel, PanelCommand, PanelIndicators, PanelState};
pub use sensors::{IntrusionHandler, SensorRegistry};
pub use storage::{
    LogLevel, LogRow, MemoryStorage, ModeRow, SensorRow, Storage, SystemSettingsRow, UserRow,
    ZoneRow,
};
pub use system::SafeHomeSystem;
pub use zones::{
    find_lowest_empty_id, Rect, SafeHomeMode, SafetyZone, ZoneConfigurationEngine, ZoneDraft,
    ZoneUpdate,
};

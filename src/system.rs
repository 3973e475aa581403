// MIT License - Copyright (c) 2026 SafeHome Project

//! Top-level wiring: builds every component, connects the intrusion path,
//! and owns the background tasks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alarm::AlarmCoordinator;
use crate::auth::{LoginManager, StorageAuthenticator};
use crate::call::CallService;
use crate::config::EngineConfig;
use crate::devices::alarm::SimulatedAlarm;
use crate::devices::sensor::SensorKind;
use crate::error::{EngineError, Result};
use crate::event::{event_channel, EngineEvent, EventReceiver, EventSender};
use crate::panel::control::{ControlPanel, SystemHooks};
use crate::panel::runtime::{self, CommandSender, PanelCommand};
use crate::panel::state::PanelState;
use crate::sensors::{IntrusionHandler, SensorRegistry};
use crate::storage::{LogLevel, LogRow, Storage};
use crate::zones::ZoneConfigurationEngine;

/// Bridges the sensor monitor to the alarm and the panel task.
///
/// Runs inside the registry lock, so it only does three cheap things:
/// ring the alarm hardware, write a log row, and post a command to the
/// panel's channel. The guard on `is_ringing` collapses the once-a-second
/// re-detection of a still-latched sensor into a single escalation.
struct IntrusionRelay {
    alarm: AlarmCoordinator,
    storage: Arc<dyn Storage>,
    commands: CommandSender,
}

impl IntrusionHandler for IntrusionRelay {
    fn on_intrusion(&self, sensor_id: u32, kind: SensorKind) {
        if self.alarm.is_ringing() {
            return;
        }
        self.alarm.activate();
        let row = LogRow {
            at: Utc::now(),
            level: LogLevel::Critical,
            message: format!("Intrusion detected by sensor {sensor_id} ({kind})"),
        };
        if let Err(err) = self.storage.insert_log(&row) {
            warn!(error = %err, "failed to write intrusion log entry");
        }
        if self
            .commands
            .try_send(PanelCommand::Intrusion { sensor_id, kind })
            .is_err()
        {
            warn!(sensor_id, "panel command channel full or closed, notification dropped");
        }
    }
}

/// Power hooks: powering the panel on starts the sensor monitor,
/// powering it off stops the monitor without blocking the panel task.
struct MonitorHooks {
    registry: SensorRegistry,
    relay: Arc<IntrusionRelay>,
}

impl SystemHooks for MonitorHooks {
    fn system_on(&self) {
        self.registry
            .start_monitoring(self.relay.clone() as Arc<dyn IntrusionHandler>);
    }

    fn system_off(&self) {
        self.registry.request_stop();
    }
}

/// The assembled SafeHome engine.
pub struct SafeHomeSystem {
    events: EventSender,
    commands: CommandSender,
    state_rx: watch::Receiver<PanelState>,
    registry: SensorRegistry,
    zones: Arc<Mutex<ZoneConfigurationEngine>>,
    alarm: AlarmCoordinator,
    alarm_device: Arc<SimulatedAlarm>,
    runtime: JoinHandle<()>,
}

impl SafeHomeSystem {
    /// Build and start the whole engine. Fatal if any storage table needed
    /// at startup cannot be read.
    pub fn start(
        storage: Arc<dyn Storage>,
        config: EngineConfig,
        call_service: Arc<dyn CallService>,
    ) -> Result<Self> {
        let (events, _) = event_channel(config.event_capacity);

        let registry = SensorRegistry::new(storage.clone(), events.clone(), config.monitor_interval);
        registry.load()?;

        let mut zone_engine =
            ZoneConfigurationEngine::new(registry.clone(), storage.clone(), events.clone());
        zone_engine.load()?;
        let zones = Arc::new(Mutex::new(zone_engine));

        let alarm_device = SimulatedAlarm::new(1, "control panel", config.alarm_duration);
        alarm_device.start();
        let alarm = AlarmCoordinator::new(
            alarm_device.clone() as Arc<dyn crate::devices::alarm::AlarmHardware>,
            events.clone(),
        );

        let authenticator = Arc::new(StorageAuthenticator::new(storage.clone()));
        let login = LoginManager::new(authenticator, storage.clone(), config.max_login_trials);

        let (commands, command_rx) = mpsc::channel(32);
        let relay = Arc::new(IntrusionRelay {
            alarm: alarm.clone(),
            storage,
            commands: commands.clone(),
        });
        let hooks = Arc::new(MonitorHooks {
            registry: registry.clone(),
            relay,
        });

        let (panel, state_rx) = ControlPanel::new(
            login,
            zones.clone(),
            alarm.clone(),
            registry.clone(),
            call_service,
            hooks,
            events.clone(),
            config.clone(),
        );
        let runtime = runtime::spawn(
            panel,
            command_rx,
            Duration::from_secs(1),
            config.supervisor_interval,
        );

        info!("safehome engine started");
        let _ = events.send(EngineEvent::SystemInitComplete);
        Ok(Self {
            events,
            commands,
            state_rx,
            registry,
            zones,
            alarm,
            alarm_device,
            runtime,
        })
    }

    /// Post a button press to the panel task.
    pub async fn press(&self, token: &str) -> Result<()> {
        self.commands
            .send(PanelCommand::Button(token.to_string()))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Subscribe to the engine event stream.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Current panel state, as last published by the panel task.
    pub fn panel_state(&self) -> PanelState {
        *self.state_rx.borrow()
    }

    /// Wait until the panel task has published the given state.
    pub async fn wait_for_state(&self, state: PanelState) -> Result<()> {
        let mut rx = self.state_rx.clone();
        while *rx.borrow() != state {
            rx.changed().await.map_err(|_| EngineError::ChannelClosed)?;
        }
        Ok(())
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn zones(&self) -> Arc<Mutex<ZoneConfigurationEngine>> {
        self.zones.clone()
    }

    pub fn alarm(&self) -> &AlarmCoordinator {
        &self.alarm
    }

    /// Stop all background tasks. Bounded: a wedged task is detached
    /// rather than waited on forever.
    pub async fn shutdown(self) {
        let _ = self.commands.send(PanelCommand::Shutdown).await;
        if tokio::time::timeout(Duration::from_secs(2), self.runtime)
            .await
            .is_err()
        {
            warn!("panel runtime did not stop in time, detaching");
        }
        self.registry.stop_monitoring().await;
        self.alarm_device.shutdown();
        info!("safehome engine stopped");
    }
}

impl std::fmt::Debug for SafeHomeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeHomeSystem")
            .field("panel_state", &self.panel_state())
            .field("sensors", &self.registry.len())
            .finish()
    }
}

// MIT License - Copyright (c) 2026 SafeHome Project

//! The panel's cooperative scheduler.
//!
//! A single task owns the [`ControlPanel`] and is the only thing that
//! mutates it: button presses and intrusion notifications arrive over an
//! mpsc channel, and the two housekeeping ticks plus the deferred
//! "settle" transition run off timers inside the same `select!` loop.
//! No two panel operations can ever interleave.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::devices::sensor::SensorKind;
use crate::panel::control::ControlPanel;

/// Commands posted to the panel task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    /// A button press token ("0".."9", "*", "#", "panic").
    Button(String),
    /// Intrusion notification from the sensor monitor.
    Intrusion { sensor_id: u32, kind: SensorKind },
    /// Stop the panel task.
    Shutdown,
}

/// Sender half of the panel command channel.
pub type CommandSender = mpsc::Sender<PanelCommand>;

/// Spawn the panel task. The task exits on [`PanelCommand::Shutdown`] or
/// when every sender is dropped.
pub fn spawn(
    mut panel: ControlPanel,
    mut rx: mpsc::Receiver<PanelCommand>,
    second_interval: Duration,
    supervisor_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("panel runtime started");
        let mut second_tick = tokio::time::interval(second_interval);
        let mut supervisor_tick = tokio::time::interval(supervisor_interval);
        second_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        supervisor_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            let deferred = panel.deferred_deadline();
            tokio::select! {
                maybe_cmd = rx.recv() => match maybe_cmd {
                    Some(PanelCommand::Button(token)) => panel.handle_button(&token),
                    Some(PanelCommand::Intrusion { sensor_id, kind }) => {
                        panel.on_intrusion(sensor_id, kind);
                    }
                    Some(PanelCommand::Shutdown) | None => {
                        debug!("panel runtime shutting down");
                        break;
                    }
                },
                _ = second_tick.tick() => panel.on_second_tick(),
                _ = supervisor_tick.tick() => panel.on_supervisor_tick(),
                _ = wait_until(deferred) => panel.fire_deferred(),
            }
        }
        info!("panel runtime stopped");
    })
}

/// Sleep until the deadline, or forever when there is none.
async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

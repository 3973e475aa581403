// MIT License - Copyright (c) 2026 SafeHome Project

//! Alarm sounder hardware.
//!
//! [`AlarmHardware`] is the seam between the engine and whatever actually
//! makes noise; [`SimulatedAlarm`] is the software stand-in used by the
//! simulator and the tests. Real hardware auto-stops after a fixed ring
//! duration whether or not anyone resets the panel, and the simulation
//! reproduces that with a background task polling every 100ms.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::constants;

/// Interface to the alarm sounder.
pub trait AlarmHardware: Send + Sync {
    /// Start ringing. Idempotent: ringing an active alarm is a no-op and
    /// leaves the auto-stop countdown untouched.
    fn ring(&self);

    /// Stop ringing. Idempotent.
    fn stop(&self);

    fn is_ringing(&self) -> bool;

    fn id(&self) -> u32;

    fn location(&self) -> &str;
}

#[derive(Debug)]
struct AlarmState {
    ringing: bool,
    /// When the current activation auto-stops.
    stop_at: Option<Instant>,
}

/// Software alarm sounder with a real auto-stop countdown.
#[derive(Debug)]
pub struct SimulatedAlarm {
    id: u32,
    location: String,
    duration: Duration,
    state: Mutex<AlarmState>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SimulatedAlarm {
    pub fn new(id: u32, location: impl Into<String>, duration: Duration) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            id,
            location: location.into(),
            duration,
            state: Mutex::new(AlarmState {
                ringing: false,
                stop_at: None,
            }),
            watcher: Mutex::new(None),
            shutdown_tx,
        })
    }

    /// Spawn the auto-stop watcher task. Call once after construction;
    /// calling again replaces the previous watcher.
    pub fn start(self: &Arc<Self>) {
        let alarm = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut tick =
                tokio::time::interval(Duration::from_millis(constants::ALARM_TICK_MS));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => alarm.auto_stop_if_due(),
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!(alarm_id = alarm.id, "alarm watcher shutting down");
                            break;
                        }
                    }
                }
            }
        });
        if let Some(old) = self.lock_watcher().replace(handle) {
            old.abort();
        }
    }

    /// Stop the watcher task. The sounder itself also stops.
    pub fn shutdown(&self) {
        self.stop();
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.lock_watcher().take() {
            handle.abort();
        }
    }

    fn auto_stop_if_due(&self) {
        let mut state = self.lock_state();
        if let Some(stop_at) = state.stop_at {
            if state.ringing && Instant::now() >= stop_at {
                state.ringing = false;
                state.stop_at = None;
                info!(
                    alarm_id = self.id,
                    location = %self.location,
                    "alarm auto-stopped after ring duration"
                );
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AlarmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_watcher(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AlarmHardware for SimulatedAlarm {
    fn ring(&self) {
        let mut state = self.lock_state();
        if state.ringing {
            debug!(alarm_id = self.id, "ring on already-ringing alarm, ignored");
            return;
        }
        state.ringing = true;
        state.stop_at = Some(Instant::now() + self.duration);
        info!(alarm_id = self.id, location = %self.location, "alarm ringing");
    }

    fn stop(&self) {
        let mut state = self.lock_state();
        if state.ringing {
            info!(alarm_id = self.id, location = %self.location, "alarm stopped");
        }
        state.ringing = false;
        state.stop_at = None;
    }

    fn is_ringing(&self) -> bool {
        self.lock_state().ringing
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn location(&self) -> &str {
        &self.location
    }
}

impl Drop for SimulatedAlarm {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_watcher().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_and_stop_are_idempotent() {
        let alarm = SimulatedAlarm::new(1, "hallway", Duration::from_secs(60));
        assert!(!alarm.is_ringing());
        alarm.ring();
        alarm.ring();
        assert!(alarm.is_ringing());
        alarm.stop();
        alarm.stop();
        assert!(!alarm.is_ringing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_stop_after_duration() {
        let alarm = SimulatedAlarm::new(1, "hallway", Duration::from_secs(60));
        alarm.start();
        alarm.ring();

        tokio::time::advance(Duration::from_secs(59)).await;
        tokio::task::yield_now().await;
        assert!(alarm.is_ringing());

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!alarm.is_ringing());

        alarm.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_re_ring_does_not_restart_countdown() {
        let alarm = SimulatedAlarm::new(1, "hallway", Duration::from_secs(60));
        alarm.start();
        alarm.ring();

        tokio::time::advance(Duration::from_secs(40)).await;
        tokio::task::yield_now().await;
        alarm.ring();

        // The second ring changed nothing: the original deadline stands.
        tokio::time::advance(Duration::from_secs(21)).await;
        tokio::task::yield_now().await;
        assert!(!alarm.is_ringing());

        alarm.shutdown();
    }
}

// MIT License - Copyright (c) 2026 SafeHome Project

//! Alarm coordination.
//!
//! [`AlarmCoordinator`] is the engine's handle on the sounder: it wraps
//! the hardware trait object, keeps activation idempotent from the
//! engine's point of view, and publishes `AlarmStarted`/`AlarmStopped`
//! on the event channel exactly once per edge.

use std::sync::Arc;

use tracing::debug;

use crate::devices::alarm::AlarmHardware;
use crate::event::{EngineEvent, EventSender};

/// Cloneable facade over the alarm hardware.
#[derive(Clone)]
pub struct AlarmCoordinator {
    device: Arc<dyn AlarmHardware>,
    events: EventSender,
}

impl AlarmCoordinator {
    pub fn new(device: Arc<dyn AlarmHardware>, events: EventSender) -> Self {
        Self { device, events }
    }

    /// Activate the sounder. Emits `AlarmStarted` only on the
    /// off-to-on edge; re-activating a ringing alarm is a no-op all the
    /// way down.
    pub fn activate(&self) {
        let was_ringing = self.device.is_ringing();
        self.device.ring();
        if !was_ringing {
            let _ = self.events.send(EngineEvent::AlarmStarted);
        } else {
            debug!(alarm_id = self.device.id(), "activate on already-ringing alarm");
        }
    }

    /// Silence the sounder. Emits `AlarmStopped` only on the on-to-off edge.
    pub fn deactivate(&self) {
        let was_ringing = self.device.is_ringing();
        self.device.stop();
        if was_ringing {
            let _ = self.events.send(EngineEvent::AlarmStopped);
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.device.is_ringing()
    }

    pub fn device(&self) -> &Arc<dyn AlarmHardware> {
        &self.device
    }
}

impl std::fmt::Debug for AlarmCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmCoordinator")
            .field("alarm_id", &self.device.id())
            .field("ringing", &self.device.is_ringing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::devices::alarm::SimulatedAlarm;
    use crate::event::event_channel;

    #[tokio::test]
    async fn test_events_fire_only_on_edges() {
        let (tx, mut rx) = event_channel(16);
        let alarm = SimulatedAlarm::new(1, "test", Duration::from_secs(60));
        let coord = AlarmCoordinator::new(alarm, tx);

        coord.activate();
        coord.activate();
        coord.deactivate();
        coord.deactivate();

        assert_eq!(rx.recv().await.unwrap(), EngineEvent::AlarmStarted);
        assert_eq!(rx.recv().await.unwrap(), EngineEvent::AlarmStopped);
        assert!(rx.try_recv().is_err(), "no duplicate edge events");
    }
}

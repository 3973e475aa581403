// MIT License - Copyright (c) 2026 SafeHome Project

//! Engine event stream.
//!
//! Every externally observable change in the engine — panel state
//! transitions, display updates, alarm activity, zone changes — is
//! published on a broadcast channel so any number of frontends (CLI,
//! GUI, tests) can watch the panel without polling it.

use tokio::sync::broadcast;

use crate::devices::sensor::SensorKind;
use crate::panel::state::{PanelIndicators, PanelState};

/// Events published by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Startup finished: storage loaded, monitor running, panel live.
    SystemInitComplete,

    /// The panel state machine moved to a new state.
    PanelStateChanged { old: PanelState, new: PanelState },

    /// The two-line panel display changed.
    Display {
        line1: String,
        line2: String,
        /// Masked input echo ("****"-style), empty when no entry pending.
        prefix: String,
    },

    /// One or more panel indicator LEDs changed.
    IndicatorsChanged { indicators: PanelIndicators },

    /// The alarm hardware started ringing.
    AlarmStarted,

    /// The alarm hardware stopped (manual reset or auto-stop).
    AlarmStopped,

    /// The sensor monitor observed an armed sensor reporting intrusion.
    IntrusionDetected { sensor_id: u32, kind: SensorKind },

    /// The ring countdown expired and the external call sequence ran.
    ExternalCallPlaced { numbers: Vec<String> },

    /// A single zone was armed or disarmed.
    ZoneArmChanged { zone_id: u32, armed: bool },

    /// The whole system switched to a named SafeHome mode.
    ModeChanged { name: String },
}

/// Sender half of the engine event channel.
pub type EventSender = broadcast::Sender<EngineEvent>;

/// Receiver half of the engine event channel.
pub type EventReceiver = broadcast::Receiver<EngineEvent>;

/// Create an engine event channel with the given buffer capacity.
///
/// Slow subscribers that fall more than `capacity` events behind will
/// observe a `Lagged` error and can resubscribe; the engine itself never
/// blocks on publication.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

// MIT License - Copyright (c) 2026 SafeHome Project

//! Engine-wide constants. Timing values here are defaults;
//! [`crate::config::EngineConfig`] lets callers (and tests) override them.

/// Failed panel logins allowed before the panel locks itself.
pub const MAX_LOGIN_TRIALS: u32 = 3;

/// Panel passwords are exactly this many digits.
pub const PANEL_PASSWORD_LENGTH: usize = 4;

/// How long the panel stays locked after too many failed logins (seconds).
pub const PANEL_LOCK_SECS: u64 = 10;

/// Countdown from alarm activation to automatic external-call escalation (seconds).
pub const RING_COUNTDOWN_SECS: u64 = 30;

/// How long the alarm hardware rings before silently auto-stopping (seconds).
pub const ALARM_DURATION_SECS: u64 = 60;

/// Sensor monitor poll interval (milliseconds).
pub const MONITOR_INTERVAL_MS: u64 = 1000;

/// Alarm hardware internal tick (milliseconds).
pub const ALARM_TICK_MS: u64 = 100;

/// Panel supervisory tick: armed-LED sync and alarm auto-recovery (milliseconds).
pub const SUPERVISOR_INTERVAL_MS: u64 = 500;

/// Settle delay before returning to the idle screen after a successful
/// login (milliseconds).
pub const LOGIN_SETTLE_MS: u64 = 300;

/// Delay before returning to the idle screen after a password-change
/// attempt, so the result message stays readable (milliseconds).
pub const PASSWORD_CHANGE_SETTLE_MS: u64 = 1800;

/// Upper bound on waiting for the monitor task to join at shutdown (milliseconds).
pub const MONITOR_STOP_TIMEOUT_MS: u64 = 2000;

// Panel display text
pub const PANEL_DEFAULT_MESSAGE1: &str = "System Ready";
pub const PANEL_DEFAULT_MESSAGE2: &str = "Press '6' for Function Mode";
pub const FUNCTION_MODE_MESSAGE1: &str = "Function Mode";
pub const FUNCTION_MODE_MESSAGE2: &str = "1(ON) 2(OFF) 3(RST) 4(AWAY) 5(HOME) \
    7(Z-) 8(ARM/DISARM) 9(Z+) *(LOGIN) 0(Change Master Password) #(BACK)";

// MIT License - Copyright (c) 2026 SafeHome Project

//! Engine configuration.
//!
//! All timing parameters default to the production values in
//! [`crate::constants`]; tests shrink them (or rely on a paused clock)
//! through the builder.

use std::time::Duration;

use crate::constants;

/// Tunable parameters for the control engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Failed logins tolerated before the panel locks.
    pub max_login_trials: u32,
    /// How long a locked panel stays locked.
    pub panel_lock_duration: Duration,
    /// Countdown from alarm activation to the external call sequence.
    pub ring_countdown: Duration,
    /// How long the alarm rings before auto-stopping.
    pub alarm_duration: Duration,
    /// Sensor monitor poll interval.
    pub monitor_interval: Duration,
    /// Panel supervisory tick interval.
    pub supervisor_interval: Duration,
    /// Settle delay after a successful login before the idle screen.
    pub login_settle: Duration,
    /// Settle delay after a password-change attempt.
    pub password_change_settle: Duration,
    /// Buffer capacity of the engine event channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_login_trials: constants::MAX_LOGIN_TRIALS,
            panel_lock_duration: Duration::from_secs(constants::PANEL_LOCK_SECS),
            ring_countdown: Duration::from_secs(constants::RING_COUNTDOWN_SECS),
            alarm_duration: Duration::from_secs(constants::ALARM_DURATION_SECS),
            monitor_interval: Duration::from_millis(constants::MONITOR_INTERVAL_MS),
            supervisor_interval: Duration::from_millis(constants::SUPERVISOR_INTERVAL_MS),
            login_settle: Duration::from_millis(constants::LOGIN_SETTLE_MS),
            password_change_settle: Duration::from_millis(constants::PASSWORD_CHANGE_SETTLE_MS),
            event_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: Option<EngineConfig>,
}

impl EngineConfigBuilder {
    fn config(&mut self) -> &mut EngineConfig {
        self.config.get_or_insert_with(EngineConfig::default)
    }

    pub fn max_login_trials(mut self, trials: u32) -> Self {
        self.config().max_login_trials = trials;
        self
    }

    pub fn panel_lock_duration(mut self, d: Duration) -> Self {
        self.config().panel_lock_duration = d;
        self
    }

    pub fn ring_countdown(mut self, d: Duration) -> Self {
        self.config().ring_countdown = d;
        self
    }

    pub fn alarm_duration(mut self, d: Duration) -> Self {
        self.config().alarm_duration = d;
        self
    }

    pub fn monitor_interval(mut self, d: Duration) -> Self {
        self.config().monitor_interval = d;
        self
    }

    pub fn supervisor_interval(mut self, d: Duration) -> Self {
        self.config().supervisor_interval = d;
        self
    }

    pub fn login_settle(mut self, d: Duration) -> Self {
        self.config().login_settle = d;
        self
    }

    pub fn password_change_settle(mut self, d: Duration) -> Self {
        self.config().password_change_settle = d;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config().event_capacity = capacity;
        self
    }

    pub fn build(mut self) -> EngineConfig {
        self.config.take().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let c = EngineConfig::default();
        assert_eq!(c.max_login_trials, 3);
        assert_eq!(c.panel_lock_duration, Duration::from_secs(10));
        assert_eq!(c.ring_countdown, Duration::from_secs(30));
        assert_eq!(c.alarm_duration, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_overrides_only_named_fields() {
        let c = EngineConfig::builder()
            .ring_countdown(Duration::from_millis(50))
            .max_login_trials(5)
            .build();
        assert_eq!(c.ring_countdown, Duration::from_millis(50));
        assert_eq!(c.max_login_trials, 5);
        assert_eq!(c.alarm_duration, Duration::from_secs(60));
    }
}

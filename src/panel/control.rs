// MIT License - Copyright (c) 2026 SafeHome Project

//! The panel's finite-state controller.
//!
//! [`ControlPanel`] is fully synchronous: every entry point is a plain
//! method, and all timing is expressed as deadlines that the runtime task
//! checks on its tick. That keeps the whole authentication/escalation
//! protocol testable without spinning up the runtime.
//!
//! Timers are deadline fields, not spawned tasks:
//! - `lock_deadline` — the lockout countdown after repeated failed logins.
//! - `ring_deadline` — alarm activation to external-call escalation.
//! - `deferred` — a pending "settle" transition (post-login, post-password
//!   change) that fires once and is superseded by any explicit transition.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::alarm::AlarmCoordinator;
use crate::auth::{LoginManager, LoginRole};
use crate::call::CallService;
use crate::config::EngineConfig;
use crate::constants;
use crate::devices::sensor::SensorKind;
use crate::event::{EngineEvent, EventSender};
use crate::panel::state::{PanelIndicators, PanelState};
use crate::sensors::SensorRegistry;
use crate::zones::ZoneConfigurationEngine;

/// Side effects of powering the whole system on or off, owned by whoever
/// wires the panel up (starting/stopping the sensor monitor, mainly).
pub trait SystemHooks: Send + Sync {
    fn system_on(&self);
    fn system_off(&self);
}

/// No-op hooks for tests and standalone panel use.
pub struct NullHooks;

impl SystemHooks for NullHooks {
    fn system_on(&self) {}
    fn system_off(&self) {}
}

/// The panel state machine and everything it commands.
pub struct ControlPanel {
    state: PanelState,
    indicators: PanelIndicators,
    digits: String,
    role: Option<LoginRole>,
    staged_password: Option<String>,
    zone_cursor: usize,

    lock_deadline: Option<Instant>,
    ring_deadline: Option<Instant>,
    deferred: Option<(Instant, PanelState)>,

    login: LoginManager,
    zones: Arc<Mutex<ZoneConfigurationEngine>>,
    alarm: AlarmCoordinator,
    registry: SensorRegistry,
    call_service: Arc<dyn CallService>,
    hooks: Arc<dyn SystemHooks>,
    events: EventSender,
    config: EngineConfig,
    state_tx: watch::Sender<PanelState>,
}

impl ControlPanel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        login: LoginManager,
        zones: Arc<Mutex<ZoneConfigurationEngine>>,
        alarm: AlarmCoordinator,
        registry: SensorRegistry,
        call_service: Arc<dyn CallService>,
        hooks: Arc<dyn SystemHooks>,
        events: EventSender,
        config: EngineConfig,
    ) -> (Self, watch::Receiver<PanelState>) {
        let (state_tx, state_rx) = watch::channel(PanelState::Offline);
        let panel = Self {
            state: PanelState::Offline,
            indicators: PanelIndicators::empty(),
            digits: String::new(),
            role: None,
            staged_password: None,
            zone_cursor: 0,
            lock_deadline: None,
            ring_deadline: None,
            deferred: None,
            login,
            zones,
            alarm,
            registry,
            call_service,
            hooks,
            events,
            config,
            state_tx,
        };
        (panel, state_rx)
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn indicators(&self) -> PanelIndicators {
        self.indicators
    }

    /// Deadline of the pending deferred transition, for the runtime's
    /// `sleep_until` arm.
    pub fn deferred_deadline(&self) -> Option<Instant> {
        self.deferred.map(|(at, _)| at)
    }

    /// One button press. Unknown tokens and buttons that make no sense in
    /// the current state are ignored.
    pub fn handle_button(&mut self, token: &str) {
        debug!(state = %self.state, token, "panel button");
        // Panic works from every powered state, locked or not.
        if token == "panic" {
            if self.state != PanelState::Offline {
                self.change_state_to(PanelState::PanicMode);
            }
            return;
        }
        match self.state {
            PanelState::Offline => {
                if token == "1" {
                    self.power_on();
                }
            }
            PanelState::Locked => {
                // All input ignored until the countdown unlocks the panel.
            }
            PanelState::Initialized => {
                if token == "6" {
                    self.change_state_to(PanelState::FunctionMode);
                }
            }
            PanelState::FunctionMode => self.dispatch_function_button(token),
            PanelState::PanelIdInput => match token {
                "1" => {
                    self.role = Some(LoginRole::Master);
                    self.change_state_to(PanelState::DigitInput);
                }
                "2" => {
                    self.role = Some(LoginRole::Guest);
                    self.change_state_to(PanelState::DigitInput);
                }
                _ => {}
            },
            PanelState::DigitInput => self.handle_digit_input(token),
            PanelState::MasterPasswordChangeInput1
            | PanelState::MasterPasswordChangeInput2 => self.handle_password_change_input(token),
            PanelState::PanicMode | PanelState::RingingAlarm => {
                if token == "#" {
                    self.change_state_to(PanelState::Initialized);
                }
            }
        }
    }

    /// Intrusion notification posted from the sensor monitor.
    pub fn on_intrusion(&mut self, sensor_id: u32, kind: SensorKind) {
        info!(sensor_id, kind = %kind, "panel notified of intrusion");
        if self.state == PanelState::RingingAlarm {
            // Fresh intrusion while already ringing resets the escalation clock.
            self.start_ring_countdown();
        } else {
            self.change_state_to(PanelState::RingingAlarm);
        }
    }

    /// One-second housekeeping tick: countdown displays and expiries.
    pub fn on_second_tick(&mut self) {
        let now = Instant::now();
        if let Some(deadline) = self.lock_deadline {
            if now >= deadline {
                self.lock_deadline = None;
                self.login.reset_trials();
                info!("panel lock expired");
                self.change_state_to(PanelState::Initialized);
            } else if self.state == PanelState::Locked {
                let left = (deadline - now).as_secs() + 1;
                self.show(
                    "Panel Locked".to_string(),
                    format!("Try again in {left}s"),
                );
            }
        }
        if let Some(deadline) = self.ring_deadline {
            if now >= deadline {
                self.ring_deadline = None;
                info!("ring countdown expired, escalating");
                self.place_external_calls();
            }
        }
    }

    /// Supervisory tick: indicator sync and alarm auto-recovery.
    pub fn on_supervisor_tick(&mut self) {
        let any_armed = self.registry.all_snapshots().iter().any(|s| s.is_armed());
        let intrusion = self.registry.any_intrusion().is_some();
        let mut leds = self.indicators;
        leds.set(PanelIndicators::ARMED, any_armed);
        leds.set(PanelIndicators::NOT_READY, intrusion);
        self.set_indicators(leds);

        // A resolved intrusion clears itself: no operator action needed.
        if self.state == PanelState::RingingAlarm && !intrusion {
            info!("all intrusions cleared, auto-recovering");
            self.change_state_to(PanelState::Initialized);
        }
    }

    /// Apply the pending deferred transition, if any.
    pub fn fire_deferred(&mut self) {
        if let Some((_, to)) = self.deferred.take() {
            self.change_state_to(to);
        }
    }

    /// Transition entry actions. Every externally triggered state change
    /// funnels through here.
    pub fn change_state_to(&mut self, new: PanelState) {
        let old = self.state;
        self.deferred = None;
        match new {
            PanelState::Offline => {
                self.cancel_timers();
                self.clear_buffers();
                self.alarm.deactivate();
                self.login.logout();
                self.hooks.system_off();
                self.set_indicators(PanelIndicators::empty());
                self.show("".to_string(), "".to_string());
            }
            PanelState::Initialized => {
                self.cancel_timers();
                self.clear_buffers();
                self.alarm.deactivate();
                self.show(
                    constants::PANEL_DEFAULT_MESSAGE1.to_string(),
                    constants::PANEL_DEFAULT_MESSAGE2.to_string(),
                );
            }
            PanelState::PanelIdInput => {
                self.clear_buffers();
                self.show(
                    "Select Login Role".to_string(),
                    "1(Master) 2(Guest)".to_string(),
                );
            }
            PanelState::DigitInput => {
                self.digits.clear();
                let role = self.role.map(|r| r.label()).unwrap_or("?");
                self.show(
                    format!("{role} Login"),
                    "Enter 4-digit password".to_string(),
                );
            }
            PanelState::FunctionMode => {
                self.digits.clear();
                self.show(
                    constants::FUNCTION_MODE_MESSAGE1.to_string(),
                    constants::FUNCTION_MODE_MESSAGE2.to_string(),
                );
            }
            PanelState::PanicMode => {
                warn!("panic triggered from panel");
                // Panic supersedes a pending lockout countdown.
                self.lock_deadline = None;
                self.alarm.activate();
                self.place_external_calls();
                self.show("PANIC".to_string(), "Emergency call placed".to_string());
            }
            PanelState::MasterPasswordChangeInput1 => {
                self.digits.clear();
                self.staged_password = None;
                self.show(
                    "Change Master Password".to_string(),
                    "Enter new 4-digit password".to_string(),
                );
            }
            PanelState::MasterPasswordChangeInput2 => {
                self.digits.clear();
                self.show(
                    "Change Master Password".to_string(),
                    "Re-enter new password".to_string(),
                );
            }
            PanelState::Locked => {
                warn!("panel locked after too many failed logins");
                self.clear_buffers();
                self.login.logout();
                self.lock_deadline = Some(Instant::now() + self.config.panel_lock_duration);
                let secs = self.config.panel_lock_duration.as_secs();
                self.show("Panel Locked".to_string(), format!("Try again in {secs}s"));
            }
            PanelState::RingingAlarm => {
                self.alarm.activate();
                self.start_ring_countdown();
                self.show(
                    "INTRUSION DETECTED".to_string(),
                    "Alarm ringing".to_string(),
                );
            }
        }
        self.state = new;
        let _ = self.state_tx.send(new);
        if old != new {
            info!(from = %old, to = %new, "panel state changed");
            let _ = self
                .events
                .send(EngineEvent::PanelStateChanged { old, new });
        }
    }

    /// Start (or restart) the escalation countdown.
    pub fn start_ring_countdown(&mut self) {
        self.ring_deadline = Some(Instant::now() + self.config.ring_countdown);
    }

    fn power_on(&mut self) {
        info!("panel power on");
        self.hooks.system_on();
        self.set_indicators(PanelIndicators::POWERED);
        self.change_state_to(PanelState::Initialized);
    }

    fn dispatch_function_button(&mut self, token: &str) {
        match token {
            "1" => self.change_state_to(PanelState::Initialized),
            "2" => self.change_state_to(PanelState::Offline),
            "3" => {
                if self.require_master() {
                    info!("panel reset");
                    // Reset also clears every intrusion latch, so a tripped
                    // sensor does not immediately re-ring the alarm.
                    self.registry.release_all();
                    self.change_state_to(PanelState::Initialized);
                }
            }
            "4" => {
                if self.require_master() {
                    self.switch_mode("Away");
                }
            }
            "5" => {
                if self.require_master() {
                    self.switch_mode("Home");
                }
            }
            "6" => self.change_state_to(PanelState::FunctionMode),
            "7" => {
                if self.require_login() {
                    self.move_zone_cursor(-1);
                }
            }
            "8" => {
                if self.require_master() {
                    self.toggle_selected_zone();
                }
            }
            "9" => {
                if self.require_login() {
                    self.move_zone_cursor(1);
                }
            }
            "0" => {
                if self.require_master() {
                    self.change_state_to(PanelState::MasterPasswordChangeInput1);
                }
            }
            "*" => self.change_state_to(PanelState::PanelIdInput),
            "#" => self.change_state_to(PanelState::Initialized),
            _ => {}
        }
    }

    fn handle_digit_input(&mut self, token: &str) {
        match token {
            "#" => {
                // Guests may confirm with no password at all.
                if self.role == Some(LoginRole::Guest) && self.digits.is_empty() {
                    if self.login.try_passwordless(LoginRole::Guest) {
                        self.finish_login();
                    } else {
                        self.show(
                            "Guest Login".to_string(),
                            "Password required".to_string(),
                        );
                    }
                } else {
                    self.change_state_to(PanelState::Initialized);
                }
            }
            d if Self::is_digit(d) => {
                self.push_digit(d);
                if self.digits.len() == constants::PANEL_PASSWORD_LENGTH {
                    self.attempt_login();
                }
            }
            _ => {}
        }
    }

    fn handle_password_change_input(&mut self, token: &str) {
        match token {
            "#" => self.change_state_to(PanelState::Initialized),
            d if Self::is_digit(d) => {
                self.push_digit(d);
                if self.digits.len() < constants::PANEL_PASSWORD_LENGTH {
                    return;
                }
                if self.state == PanelState::MasterPasswordChangeInput1 {
                    self.staged_password = Some(std::mem::take(&mut self.digits));
                    self.change_state_to(PanelState::MasterPasswordChangeInput2);
                } else {
                    self.finish_password_change();
                }
            }
            _ => {}
        }
    }

    fn attempt_login(&mut self) {
        let role = match self.role {
            Some(role) => role,
            None => {
                self.change_state_to(PanelState::PanelIdInput);
                return;
            }
        };
        let digits = std::mem::take(&mut self.digits);
        if self.login.login(role, &digits) {
            self.finish_login();
        } else if self.login.is_login_trials_exceeded() {
            self.change_state_to(PanelState::Locked);
        } else {
            let left = self.login.trials_left();
            self.show(
                "Login Failed".to_string(),
                format!("{left} trial(s) remaining"),
            );
        }
    }

    fn finish_login(&mut self) {
        let role = self.login.current_role().map(|r| r.label()).unwrap_or("?");
        self.show(format!("Welcome, {role}"), String::new());
        self.schedule_transition(PanelState::Initialized, self.config.login_settle);
    }

    fn finish_password_change(&mut self) {
        let confirmation = std::mem::take(&mut self.digits);
        let staged = self.staged_password.take();
        match staged {
            Some(staged) if staged == confirmation => {
                if self.login.change_master_password(&staged) {
                    self.show("Password Changed".to_string(), String::new());
                } else {
                    self.show(
                        "Password Not Changed".to_string(),
                        "Could not save password".to_string(),
                    );
                }
            }
            _ => {
                self.show(
                    "Password Not Changed".to_string(),
                    "Entries did not match".to_string(),
                );
            }
        }
        self.schedule_transition(PanelState::Initialized, self.config.password_change_settle);
    }

    fn switch_mode(&mut self, name: &str) {
        let ok = self.lock_zones().change_to_mode(name);
        if ok {
            let mut leds = self.indicators;
            leds.set(PanelIndicators::AWAY, name.eq_ignore_ascii_case("Away"));
            leds.set(PanelIndicators::HOME, name.eq_ignore_ascii_case("Home"));
            self.set_indicators(leds);
            self.show(format!("{name} Mode"), "Mode activated".to_string());
        } else {
            self.show(format!("{name} Mode"), "No such mode".to_string());
        }
    }

    fn move_zone_cursor(&mut self, step: i32) {
        let (cursor, zone) = {
            let zones = self.lock_zones();
            let ids = zones.zone_ids();
            if ids.is_empty() {
                drop(zones);
                self.show("Zones".to_string(), "No zones configured".to_string());
                return;
            }
            let len = ids.len() as i32;
            let cursor = (self.zone_cursor as i32 + step).rem_euclid(len) as usize;
            (cursor, zones.zone(ids[cursor]))
        };
        self.zone_cursor = cursor;
        if let Some(zone) = zone {
            let status = if zone.armed { "Armed" } else { "Disarmed" };
            self.show(format!("Zone {}: {}", zone.id, zone.name), status.to_string());
        }
    }

    fn toggle_selected_zone(&mut self) {
        let (zone_id, armed_now) = {
            let mut zones = self.lock_zones();
            let ids = zones.zone_ids();
            if ids.is_empty() {
                drop(zones);
                self.show("Zones".to_string(), "No zones configured".to_string());
                return;
            }
            let cursor = self.zone_cursor.min(ids.len() - 1);
            let id = ids[cursor];
            let armed = zones.zone(id).map(|z| z.armed).unwrap_or(false);
            if armed {
                zones.disarm_zone(id);
            } else {
                zones.arm_zone(id);
            }
            (id, zones.zone(id).map(|z| z.armed).unwrap_or(false))
        };
        let status = if armed_now { "Armed" } else { "Disarmed" };
        self.show(format!("Zone {zone_id}"), status.to_string());
    }

    fn place_external_calls(&mut self) {
        let numbers = self.lock_zones().call_numbers();
        if numbers.is_empty() {
            warn!("no escalation numbers configured");
            return;
        }
        for number in &numbers {
            if !self.call_service.call(number) {
                warn!(number, "external call failed");
            }
        }
        let _ = self
            .events
            .send(EngineEvent::ExternalCallPlaced { numbers });
    }

    fn require_master(&mut self) -> bool {
        if self.login.is_master() {
            true
        } else {
            self.show(
                "Not Authorized".to_string(),
                "Master login required".to_string(),
            );
            false
        }
    }

    fn require_login(&mut self) -> bool {
        if self.login.is_logged_in() {
            true
        } else {
            self.show("Not Authorized".to_string(), "Login required".to_string());
            false
        }
    }

    fn schedule_transition(&mut self, to: PanelState, after: std::time::Duration) {
        self.deferred = Some((Instant::now() + after, to));
    }

    fn push_digit(&mut self, token: &str) {
        self.digits.push_str(token);
        let masked = "*".repeat(self.digits.len());
        let _ = self.events.send(EngineEvent::Display {
            line1: String::new(),
            line2: String::new(),
            prefix: masked,
        });
    }

    fn cancel_timers(&mut self) {
        self.lock_deadline = None;
        self.ring_deadline = None;
        self.deferred = None;
    }

    fn clear_buffers(&mut self) {
        self.digits.clear();
        self.role = None;
        self.staged_password = None;
    }

    fn show(&self, line1: String, line2: String) {
        let _ = self.events.send(EngineEvent::Display {
            line1,
            line2,
            prefix: String::new(),
        });
    }

    fn set_indicators(&mut self, leds: PanelIndicators) {
        if leds != self.indicators {
            self.indicators = leds;
            let _ = self
                .events
                .send(EngineEvent::IndicatorsChanged { indicators: leds });
        }
    }

    fn lock_zones(&self) -> MutexGuard<'_, ZoneConfigurationEngine> {
        self.zones.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_digit(token: &str) -> bool {
        token.len() == 1 && token.chars().all(|c| c.is_ascii_digit())
    }
}

impl std::fmt::Debug for ControlPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPanel")
            .field("state", &self.state)
            .field("indicators", &self.indicators)
            .finish()
    }
}

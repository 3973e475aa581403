// MIT License - Copyright (c) 2026 SafeHome Project

//! Persistence boundary.
//!
//! The engine keeps its working state in memory and writes every mutation
//! through a [`Storage`] implementation before updating its caches. The
//! trait is synchronous: implementations are expected to be fast local
//! stores (the bundled [`MemoryStorage`], an embedded file store, ...),
//! and the engine calls them while holding its own locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::devices::sensor::{SensorGeometry, SensorKind};
use crate::error::{EngineError, Result};

/// Severity of a persisted log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Persisted sensor record.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub id: u32,
    pub kind: SensorKind,
    pub geometry: SensorGeometry,
    pub armed: bool,
}

/// Persisted safety-zone record.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRow {
    pub id: u32,
    pub name: String,
    /// Axis-aligned rectangle corners, top-left then bottom-right.
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub sensor_ids: Vec<u32>,
    pub armed: bool,
}

/// Persisted SafeHome mode record: the exact sensor set armed in that mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeRow {
    pub id: u32,
    pub name: String,
    pub sensor_ids: Vec<u32>,
}

/// Persisted global settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSettingsRow {
    /// Currently selected SafeHome mode, if any.
    pub active_mode_id: Option<u32>,
    /// Phone numbers dialed when the ring countdown expires, in order.
    pub call_numbers: Vec<String>,
}

/// Persisted panel user record.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub username: String,
    /// Four-digit panel password; `None` for passwordless (guest) accounts.
    pub password: Option<String>,
}

/// Persisted event-log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Backing store for engine state.
pub trait Storage: Send + Sync {
    fn get_all_sensors(&self) -> Result<Vec<SensorRow>>;
    fn update_sensor(&self, row: &SensorRow) -> Result<()>;

    fn get_all_zones(&self) -> Result<Vec<ZoneRow>>;
    fn get_zone_by_name(&self, name: &str) -> Result<Option<ZoneRow>>;
    fn insert_zone(&self, row: &ZoneRow) -> Result<()>;
    fn update_zone(&self, row: &ZoneRow) -> Result<()>;
    fn delete_zone(&self, zone_id: u32) -> Result<()>;

    fn get_all_modes(&self) -> Result<Vec<ModeRow>>;
    fn update_mode(&self, row: &ModeRow) -> Result<()>;

    fn get_system_settings(&self) -> Result<SystemSettingsRow>;
    fn update_system_settings(&self, row: &SystemSettingsRow) -> Result<()>;

    fn get_user(&self, username: &str) -> Result<Option<UserRow>>;
    fn update_user(&self, row: &UserRow) -> Result<()>;

    fn insert_log(&self, row: &LogRow) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    sensors: HashMap<u32, SensorRow>,
    zones: HashMap<u32, ZoneRow>,
    modes: HashMap<u32, ModeRow>,
    settings: Option<SystemSettingsRow>,
    users: HashMap<String, UserRow>,
    logs: Vec<LogRow>,
}

/// In-memory [`Storage`] used by the simulator and the test suite.
///
/// `set_fail_writes(true)` makes every mutating call return
/// [`EngineError::WriteRejected`], which is how the tests exercise the
/// engine's persistence-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated write failures.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn seed_sensor(&self, row: SensorRow) {
        self.lock().sensors.insert(row.id, row);
    }

    pub fn seed_zone(&self, row: ZoneRow) {
        self.lock().zones.insert(row.id, row);
    }

    pub fn seed_mode(&self, row: ModeRow) {
        self.lock().modes.insert(row.id, row);
    }

    pub fn seed_settings(&self, row: SystemSettingsRow) {
        self.lock().settings = Some(row);
    }

    pub fn seed_user(&self, row: UserRow) {
        self.lock().users.insert(row.username.clone(), row);
    }

    /// All log rows written so far, oldest first.
    pub fn logs(&self) -> Vec<LogRow> {
        self.lock().logs.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self, entity: &'static str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(EngineError::WriteRejected { entity })
        } else {
            Ok(())
        }
    }
}

impl Storage for MemoryStorage {
    fn get_all_sensors(&self) -> Result<Vec<SensorRow>> {
        let mut rows: Vec<_> = self.lock().sensors.values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    fn update_sensor(&self, row: &SensorRow) -> Result<()> {
        self.check_writable("sensor")?;
        self.lock().sensors.insert(row.id, row.clone());
        Ok(())
    }

    fn get_all_zones(&self) -> Result<Vec<ZoneRow>> {
        let mut rows: Vec<_> = self.lock().zones.values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    fn get_zone_by_name(&self, name: &str) -> Result<Option<ZoneRow>> {
        Ok(self
            .lock()
            .zones
            .values()
            .find(|z| z.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn insert_zone(&self, row: &ZoneRow) -> Result<()> {
        self.check_writable("zone")?;
        self.lock().zones.insert(row.id, row.clone());
        Ok(())
    }

    fn update_zone(&self, row: &ZoneRow) -> Result<()> {
        self.check_writable("zone")?;
        self.lock().zones.insert(row.id, row.clone());
        Ok(())
    }

    fn delete_zone(&self, zone_id: u32) -> Result<()> {
        self.check_writable("zone")?;
        self.lock().zones.remove(&zone_id);
        Ok(())
    }

    fn get_all_modes(&self) -> Result<Vec<ModeRow>> {
        let mut rows: Vec<_> = self.lock().modes.values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    fn update_mode(&self, row: &ModeRow) -> Result<()> {
        self.check_writable("mode")?;
        self.lock().modes.insert(row.id, row.clone());
        Ok(())
    }

    fn get_system_settings(&self) -> Result<SystemSettingsRow> {
        self.lock()
            .settings
            .clone()
            .ok_or(EngineError::MissingSystemSettings)
    }

    fn update_system_settings(&self, row: &SystemSettingsRow) -> Result<()> {
        self.check_writable("system settings")?;
        self.lock().settings = Some(row.clone());
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        Ok(self.lock().users.get(username).cloned())
    }

    fn update_user(&self, row: &UserRow) -> Result<()> {
        self.check_writable("user")?;
        self.lock().users.insert(row.username.clone(), row.clone());
        Ok(())
    }

    fn insert_log(&self, row: &LogRow) -> Result<()> {
        self.check_writable("log")?;
        self.lock().logs.push(row.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_row(id: u32) -> SensorRow {
        SensorRow {
            id,
            kind: SensorKind::WindowDoor,
            geometry: SensorGeometry::Point { x: 0, y: 0 },
            armed: false,
        }
    }

    #[test]
    fn test_sensors_round_trip_sorted() {
        let store = MemoryStorage::new();
        store.seed_sensor(sensor_row(3));
        store.seed_sensor(sensor_row(1));
        let rows = store.get_all_sensors().unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_fail_writes_rejects_mutations_but_not_reads() {
        let store = MemoryStorage::new();
        store.seed_sensor(sensor_row(1));
        store.set_fail_writes(true);

        assert!(matches!(
            store.update_sensor(&sensor_row(1)),
            Err(EngineError::WriteRejected { entity: "sensor" })
        ));
        assert_eq!(store.get_all_sensors().unwrap().len(), 1);

        store.set_fail_writes(false);
        assert!(store.update_sensor(&sensor_row(2)).is_ok());
    }

    #[test]
    fn test_missing_settings_is_an_error() {
        let store = MemoryStorage::new();
        assert!(matches!(
            store.get_system_settings(),
            Err(EngineError::MissingSystemSettings)
        ));
    }
}

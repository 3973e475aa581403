// MIT License - Copyright (c) 2026 SafeHome Project

//! Sensor registry and intrusion monitor.
//!
//! The registry owns every simulated sensor behind a single mutex and is
//! the only component allowed to touch them. Arm state is written through
//! to storage; a rejected write is logged and the in-memory state still
//! changes, because a panel that silently refuses to arm is worse than a
//! stale database row.
//!
//! The monitor is a background task that polls the whole registry once a
//! second and hands every tripped sensor to an [`IntrusionHandler`] while
//! still holding the registry lock, so the handler sees the exact state
//! that triggered it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants;
use crate::devices::sensor::{Sensor, SensorGeometry, SensorKind};
use crate::event::{EngineEvent, EventSender};
use crate::storage::{SensorRow, Storage};

/// Callback invoked by the monitor for each sensor reporting intrusion.
///
/// Called while the registry lock is held: implementations must not call
/// back into the registry and must return quickly.
pub trait IntrusionHandler: Send + Sync {
    fn on_intrusion(&self, sensor_id: u32, kind: SensorKind);
}

/// Cloneable registry of all sensors, with the intrusion monitor attached.
#[derive(Clone)]
pub struct SensorRegistry {
    sensors: Arc<Mutex<HashMap<u32, Sensor>>>,
    storage: Arc<dyn Storage>,
    events: EventSender,
    monitor_interval: Duration,
    monitor: Arc<Mutex<Option<JoinHandle<()>>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl SensorRegistry {
    pub fn new(storage: Arc<dyn Storage>, events: EventSender, monitor_interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            sensors: Arc::new(Mutex::new(HashMap::new())),
            storage,
            events,
            monitor_interval,
            monitor: Arc::new(Mutex::new(None)),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Populate the registry from storage. Replaces any existing contents.
    pub fn load(&self) -> crate::error::Result<usize> {
        let rows = self.storage.get_all_sensors()?;
        let mut map = self.lock_sensors();
        map.clear();
        for row in &rows {
            map.insert(row.id, Sensor::new(row.id, row.kind, row.geometry, row.armed));
        }
        info!(count = rows.len(), "sensors loaded");
        Ok(rows.len())
    }

    /// Arm one sensor. Returns `false` if the id is unknown.
    pub fn arm(&self, id: u32) -> bool {
        self.set_armed(id, true)
    }

    /// Disarm one sensor. Returns `false` if the id is unknown.
    pub fn disarm(&self, id: u32) -> bool {
        self.set_armed(id, false)
    }

    /// Arm a batch of sensors, skipping unknown ids. Always returns `true`
    /// so zone-level operations never fail on a stale membership list.
    pub fn arm_many(&self, ids: &[u32]) -> bool {
        for &id in ids {
            if !self.set_armed(id, true) {
                debug!(sensor_id = id, "arm_many: skipping unknown sensor");
            }
        }
        true
    }

    /// Disarm a batch of sensors, skipping unknown ids.
    pub fn disarm_many(&self, ids: &[u32]) -> bool {
        for &id in ids {
            if !self.set_armed(id, false) {
                debug!(sensor_id = id, "disarm_many: skipping unknown sensor");
            }
        }
        true
    }

    pub fn arm_all(&self) {
        let ids = self.ids();
        self.arm_many(&ids);
    }

    pub fn disarm_all(&self) {
        let ids = self.ids();
        self.disarm_many(&ids);
    }

    /// Simulate a physical trigger. Returns `false` if the id is unknown.
    pub fn intrude(&self, id: u32) -> bool {
        let mut map = self.lock_sensors();
        match map.get_mut(&id) {
            Some(sensor) => {
                sensor.intrude();
                true
            }
            None => false,
        }
    }

    /// Clear a sensor's intrusion latch. Returns `false` if the id is unknown.
    pub fn release(&self, id: u32) -> bool {
        let mut map = self.lock_sensors();
        match map.get_mut(&id) {
            Some(sensor) => {
                sensor.release();
                true
            }
            None => false,
        }
    }

    /// Clear every intrusion latch.
    pub fn release_all(&self) {
        for sensor in self.lock_sensors().values_mut() {
            sensor.release();
        }
    }

    /// Intrusion query for one sensor: armed AND detected. Unknown ids
    /// read as `false`.
    pub fn read(&self, id: u32) -> bool {
        self.lock_sensors().get(&id).map(Sensor::read).unwrap_or(false)
    }

    /// First sensor currently reporting intrusion, lowest id first.
    pub fn any_intrusion(&self) -> Option<(u32, SensorKind)> {
        let map = self.lock_sensors();
        map.values()
            .filter(|s| s.read())
            .min_by_key(|s| s.id)
            .map(|s| (s.id, s.kind))
    }

    pub fn kind_of(&self, id: u32) -> Option<SensorKind> {
        self.lock_sensors().get(&id).map(|s| s.kind)
    }

    /// Move a sensor on the floor plan. Returns `false` if the id is unknown.
    pub fn relocate(&self, id: u32, geometry: SensorGeometry) -> bool {
        let row = {
            let mut map = self.lock_sensors();
            match map.get_mut(&id) {
                Some(sensor) => {
                    sensor.relocate(geometry);
                    Some(Self::to_row(sensor))
                }
                None => None,
            }
        };
        match row {
            Some(row) => {
                self.persist(&row);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, id: u32) -> Option<Sensor> {
        self.lock_sensors().get(&id).cloned()
    }

    /// All sensors, sorted by id.
    pub fn all_snapshots(&self) -> Vec<Sensor> {
        let mut all: Vec<_> = self.lock_sensors().values().cloned().collect();
        all.sort_by_key(|s| s.id);
        all
    }

    /// All known sensor ids, sorted.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<_> = self.lock_sensors().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock_sensors().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_sensors().is_empty()
    }

    /// Start the monitor task. A warning is logged and nothing happens if
    /// the monitor is already running. A task that was asked to stop but
    /// has not yet observed the signal counts as stopped: it is replaced,
    /// so a quick power-off/power-on cycle cannot strand the system
    /// without polling.
    pub fn start_monitoring(&self, handler: Arc<dyn IntrusionHandler>) {
        let mut slot = self.lock_monitor();
        if let Some(handle) = slot.as_ref() {
            let stop_requested = *self.shutdown_tx.borrow();
            if !handle.is_finished() && !stop_requested {
                warn!("sensor monitor already running, ignoring start request");
                return;
            }
            if let Some(old) = slot.take() {
                old.abort();
            }
        }
        let _ = self.shutdown_tx.send(false);

        let registry = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            info!(interval = ?registry.monitor_interval, "sensor monitor started");
            let mut tick = tokio::time::interval(registry.monitor_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => registry.monitor_tick(handler.as_ref()),
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("sensor monitor stopped");
                            break;
                        }
                    }
                }
            }
        });
        *slot = Some(handle);
    }

    /// Signal the monitor to stop without waiting for it.
    pub fn request_stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signal the monitor to stop and wait (bounded) for the task to exit.
    pub async fn stop_monitoring(&self) {
        self.request_stop();
        let handle = self.lock_monitor().take();
        if let Some(handle) = handle {
            let timeout = Duration::from_millis(constants::MONITOR_STOP_TIMEOUT_MS);
            if tokio::time::timeout(timeout, handle).await.is_err() {
                warn!("sensor monitor did not stop in time, detaching");
            }
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.lock_monitor().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// One monitor pass: every tripped sensor goes to the handler, still
    /// under the registry lock.
    fn monitor_tick(&self, handler: &dyn IntrusionHandler) {
        let map = self.lock_sensors();
        for sensor in map.values().filter(|s| s.read()) {
            debug!(sensor_id = sensor.id, kind = %sensor.kind, "intrusion detected");
            let _ = self.events.send(EngineEvent::IntrusionDetected {
                sensor_id: sensor.id,
                kind: sensor.kind,
            });
            handler.on_intrusion(sensor.id, sensor.kind);
        }
    }

    fn set_armed(&self, id: u32, armed: bool) -> bool {
        let row = {
            let mut map = self.lock_sensors();
            match map.get_mut(&id) {
                Some(sensor) => {
                    if armed {
                        sensor.arm();
                    } else {
                        sensor.disarm();
                    }
                    Some(Self::to_row(sensor))
                }
                None => None,
            }
        };
        match row {
            Some(row) => {
                self.persist(&row);
                true
            }
            None => false,
        }
    }

    fn persist(&self, row: &SensorRow) {
        if let Err(err) = self.storage.update_sensor(row) {
            warn!(sensor_id = row.id, error = %err, "failed to persist sensor");
        }
    }

    fn to_row(sensor: &Sensor) -> SensorRow {
        SensorRow {
            id: sensor.id,
            kind: sensor.kind,
            geometry: sensor.geometry,
            armed: sensor.is_armed(),
        }
    }

    fn lock_sensors(&self) -> MutexGuard<'_, HashMap<u32, Sensor>> {
        self.sensors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_monitor(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SensorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorRegistry")
            .field("sensors", &self.len())
            .field("monitoring", &self.is_monitoring())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::event::event_channel;
    use crate::storage::MemoryStorage;

    fn registry_with(ids: &[u32]) -> (SensorRegistry, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        for &id in ids {
            storage.seed_sensor(SensorRow {
                id,
                kind: SensorKind::WindowDoor,
                geometry: SensorGeometry::Point { x: 0, y: 0 },
                armed: false,
            });
        }
        let (tx, _rx) = event_channel(64);
        let registry = SensorRegistry::new(
            storage.clone() as Arc<dyn Storage>,
            tx,
            Duration::from_millis(constants::MONITOR_INTERVAL_MS),
        );
        registry.load().unwrap();
        (registry, storage)
    }

    #[test]
    fn test_single_arm_unknown_id_is_false() {
        let (registry, _) = registry_with(&[1, 2]);
        assert!(registry.arm(1));
        assert!(!registry.arm(99));
        assert!(!registry.disarm(99));
    }

    #[test]
    fn test_bulk_arm_skips_unknown_and_succeeds() {
        let (registry, _) = registry_with(&[1, 2, 3]);
        assert!(registry.arm_many(&[1, 99, 3]));
        assert!(registry.snapshot(1).unwrap().is_armed());
        assert!(!registry.snapshot(2).unwrap().is_armed());
        assert!(registry.snapshot(3).unwrap().is_armed());
    }

    #[test]
    fn test_read_is_armed_and_detected() {
        let (registry, _) = registry_with(&[1]);
        registry.intrude(1);
        assert!(!registry.read(1));
        registry.arm(1);
        assert!(registry.read(1));
        assert_eq!(registry.any_intrusion(), Some((1, SensorKind::WindowDoor)));
        registry.disarm(1);
        assert!(!registry.read(1));
        assert_eq!(registry.any_intrusion(), None);
    }

    #[test]
    fn test_arm_writes_through_to_storage() {
        let (registry, storage) = registry_with(&[1]);
        registry.arm(1);
        let rows = storage.get_all_sensors().unwrap();
        assert!(rows[0].armed);
    }

    #[test]
    fn test_rejected_write_still_arms_in_memory() {
        let (registry, storage) = registry_with(&[1]);
        storage.set_fail_writes(true);
        assert!(registry.arm(1));
        assert!(registry.snapshot(1).unwrap().is_armed());
    }

    struct Counter(AtomicU32);

    impl IntrusionHandler for Counter {
        fn on_intrusion(&self, _sensor_id: u32, _kind: SensorKind) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_fires_handler_for_armed_detection() {
        let (registry, _) = registry_with(&[1, 2]);
        let handler = Arc::new(Counter(AtomicU32::new(0)));
        registry.start_monitoring(handler.clone());

        registry.arm(1);
        registry.intrude(1);
        registry.intrude(2); // disarmed, must not fire

        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;
        assert!(handler.0.load(Ordering::SeqCst) >= 1);

        registry.release(1);
        let after = handler.0.load(Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;
        assert_eq!(handler.0.load(Ordering::SeqCst), after);

        registry.stop_monitoring().await;
        assert!(!registry.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_stop_start_cycle_keeps_the_monitor_alive() {
        let (registry, _) = registry_with(&[1]);
        let handler = Arc::new(Counter(AtomicU32::new(0)));
        registry.start_monitoring(handler.clone());

        // Restart before the old task has had a chance to see the signal.
        registry.request_stop();
        registry.start_monitoring(handler.clone());

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(registry.is_monitoring());

        // And the replacement actually polls.
        registry.arm(1);
        registry.intrude(1);
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;
        assert!(handler.0.load(Ordering::SeqCst) >= 1);

        registry.stop_monitoring().await;
    }

    #[tokio::test]
    async fn test_start_monitoring_twice_is_a_noop() {
        let (registry, _) = registry_with(&[1]);
        let handler = Arc::new(Counter(AtomicU32::new(0)));
        registry.start_monitoring(handler.clone());
        registry.start_monitoring(handler);
        assert!(registry.is_monitoring());
        registry.stop_monitoring().await;
    }
}

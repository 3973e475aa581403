// MIT License - Copyright (c) 2026 SafeHome Project

//! Safety zones and SafeHome modes.
//!
//! The [`ZoneConfigurationEngine`] owns the zone and mode tables and is
//! the only component that translates zone-level commands into sensor
//! arm/disarm calls. It is not internally locked; the panel wraps it in
//! a mutex and drives it from one task.
//!
//! Zone `armed` status is a cached derivation — true iff at least one
//! member sensor is armed — and is recomputed after every operation that
//! can change sensor arm state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::devices::sensor::SensorKind;
use crate::error::Result;
use crate::event::{EngineEvent, EventSender};
use crate::sensors::SensorRegistry;
use crate::storage::{ModeRow, Storage, SystemSettingsRow, ZoneRow};

/// Axis-aligned rectangle on the floor plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    /// Normalize corners so `(x1, y1)` is top-left.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Strict half-plane separation: rectangles that merely share an edge
    /// do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.x2 <= other.x1
            || self.x1 >= other.x2
            || self.y2 <= other.y1
            || self.y1 >= other.y2)
    }
}

/// Lowest positive integer not present in `ids`.
pub fn find_lowest_empty_id(ids: &[u32]) -> u32 {
    let used: HashSet<u32> = ids.iter().copied().collect();
    (1..).find(|id| !used.contains(id)).unwrap_or(1)
}

/// A rectangular region of the monitored space with its member sensors.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyZone {
    pub id: u32,
    pub name: String,
    pub rect: Rect,
    pub sensor_ids: Vec<u32>,
    /// Derived: at least one member sensor is armed.
    pub armed: bool,
}

/// A named target configuration: exactly these sensors are armed.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeHomeMode {
    pub id: u32,
    pub name: String,
    pub sensor_ids: Vec<u32>,
}

/// Input for [`ZoneConfigurationEngine::add_zone`].
#[derive(Debug, Clone)]
pub struct ZoneDraft {
    pub name: String,
    pub rect: Rect,
    pub sensor_ids: Vec<u32>,
}

/// Input for [`ZoneConfigurationEngine::update_zone`].
#[derive(Debug, Clone)]
pub struct ZoneUpdate {
    pub id: u32,
    pub name: String,
    pub rect: Rect,
    pub sensor_ids: Vec<u32>,
}

/// Owner of the zone and mode tables.
pub struct ZoneConfigurationEngine {
    zones: HashMap<u32, SafetyZone>,
    modes: HashMap<u32, SafeHomeMode>,
    settings: SystemSettingsRow,
    registry: SensorRegistry,
    storage: Arc<dyn Storage>,
    events: EventSender,
}

impl ZoneConfigurationEngine {
    pub fn new(registry: SensorRegistry, storage: Arc<dyn Storage>, events: EventSender) -> Self {
        Self {
            zones: HashMap::new(),
            modes: HashMap::new(),
            settings: SystemSettingsRow {
                active_mode_id: None,
                call_numbers: Vec::new(),
            },
            registry,
            storage,
            events,
        }
    }

    /// Load zones, modes, and settings from storage. Fatal on failure.
    pub fn load(&mut self) -> Result<()> {
        self.zones.clear();
        for row in self.storage.get_all_zones()? {
            let armed = self.derive_armed(&row.sensor_ids);
            self.zones.insert(
                row.id,
                SafetyZone {
                    id: row.id,
                    name: row.name,
                    rect: Rect::new(row.x1, row.y1, row.x2, row.y2),
                    sensor_ids: row.sensor_ids,
                    armed,
                },
            );
        }
        self.modes.clear();
        for row in self.storage.get_all_modes()? {
            self.modes.insert(
                row.id,
                SafeHomeMode {
                    id: row.id,
                    name: row.name,
                    sensor_ids: row.sensor_ids,
                },
            );
        }
        self.settings = self.storage.get_system_settings()?;
        info!(
            zones = self.zones.len(),
            modes = self.modes.len(),
            "zone configuration loaded"
        );
        Ok(())
    }

    /// Switch the whole system to a named mode.
    ///
    /// A full resync, not a diff: every sensor in the mode's target set is
    /// armed and every other sensor is disarmed, whatever armed them.
    pub fn change_to_mode(&mut self, name: &str) -> bool {
        let mode = match self
            .modes
            .values()
            .find(|m| m.name.eq_ignore_ascii_case(name))
        {
            Some(mode) => mode.clone(),
            None => {
                debug!(mode = name, "change_to_mode: unknown mode");
                return false;
            }
        };
        let target: HashSet<u32> = mode.sensor_ids.iter().copied().collect();
        for id in self.registry.ids() {
            if target.contains(&id) {
                self.registry.arm(id);
            } else {
                self.registry.disarm(id);
            }
        }
        self.refresh_zone_statuses();

        self.settings.active_mode_id = Some(mode.id);
        if let Err(err) = self.storage.update_system_settings(&self.settings) {
            warn!(error = %err, "failed to persist active mode");
        }
        info!(mode = %mode.name, "safehome mode changed");
        let _ = self.events.send(EngineEvent::ModeChanged {
            name: mode.name.clone(),
        });
        true
    }

    /// Arm every sensor in the zone. Returns `false` for an unknown id.
    pub fn arm_zone(&mut self, id: u32) -> bool {
        let sensor_ids = match self.zones.get(&id) {
            Some(zone) => zone.sensor_ids.clone(),
            None => return false,
        };
        self.registry.arm_many(&sensor_ids);
        self.refresh_zone_statuses();
        true
    }

    /// Disarm the zone, honoring the shared-sensor rule.
    ///
    /// Window/door sensors disarm unconditionally. A motion detector stays
    /// armed while some other armed zone both contains it and has at least
    /// one other member sensor still armed — that zone still depends on it
    /// for coverage. If the motion detector is the only live sensor left
    /// in the other zone, it may be released.
    pub fn disarm_zone(&mut self, id: u32) -> bool {
        let sensor_ids = match self.zones.get(&id) {
            Some(zone) => zone.sensor_ids.clone(),
            None => return false,
        };
        for sensor_id in sensor_ids {
            let is_motion = self.registry.kind_of(sensor_id) == Some(SensorKind::MotionDetector);
            if !is_motion || !self.motion_sensor_is_needed(id, sensor_id) {
                self.registry.disarm(sensor_id);
            } else {
                debug!(
                    sensor_id,
                    zone_id = id,
                    "motion detector kept armed, still covering another zone"
                );
            }
        }
        self.refresh_zone_statuses();
        true
    }

    /// Create a zone. Rejects duplicate (case-insensitive) names and
    /// overlapping rectangles; assigns the lowest unused positive id.
    /// Atomic: memory changes only after the storage insert succeeds.
    pub fn add_zone(&mut self, draft: ZoneDraft) -> bool {
        let name = draft.name.trim();
        if name.is_empty() {
            return false;
        }
        if self.zone_name_taken(name, None) {
            debug!(name, "add_zone: duplicate zone name");
            return false;
        }
        if self.overlaps_any(&draft.rect, None) {
            debug!(name, "add_zone: rectangle overlaps an existing zone");
            return false;
        }
        let ids: Vec<u32> = self.zones.keys().copied().collect();
        let id = find_lowest_empty_id(&ids);
        let armed = self.derive_armed(&draft.sensor_ids);
        let zone = SafetyZone {
            id,
            name: name.to_string(),
            rect: draft.rect,
            sensor_ids: draft.sensor_ids,
            armed,
        };
        if let Err(err) = self.storage.insert_zone(&Self::to_row(&zone)) {
            warn!(zone_id = id, error = %err, "add_zone: storage insert rejected");
            return false;
        }
        info!(zone_id = id, name = %zone.name, "zone added");
        self.zones.insert(id, zone);
        true
    }

    /// Rewrite a zone's name, rectangle, and membership. Same validation
    /// as [`Self::add_zone`], excluding the zone itself from both checks.
    pub fn update_zone(&mut self, update: ZoneUpdate) -> bool {
        if !self.zones.contains_key(&update.id) {
            return false;
        }
        let name = update.name.trim();
        if name.is_empty() {
            return false;
        }
        if self.zone_name_taken(name, Some(update.id)) {
            debug!(name, "update_zone: duplicate zone name");
            return false;
        }
        if self.overlaps_any(&update.rect, Some(update.id)) {
            debug!(zone_id = update.id, "update_zone: rectangle overlaps another zone");
            return false;
        }
        let armed = self.derive_armed(&update.sensor_ids);
        let zone = SafetyZone {
            id: update.id,
            name: name.to_string(),
            rect: update.rect,
            sensor_ids: update.sensor_ids,
            armed,
        };
        if let Err(err) = self.storage.update_zone(&Self::to_row(&zone)) {
            warn!(zone_id = zone.id, error = %err, "update_zone: storage write rejected");
            return false;
        }
        self.zones.insert(zone.id, zone);
        true
    }

    /// Delete a zone. Member sensors keep their current arm state.
    pub fn delete_zone(&mut self, id: u32) -> bool {
        if !self.zones.contains_key(&id) {
            return false;
        }
        if let Err(err) = self.storage.delete_zone(id) {
            warn!(zone_id = id, error = %err, "delete_zone: storage delete rejected");
            return false;
        }
        self.zones.remove(&id);
        info!(zone_id = id, "zone deleted");
        true
    }

    /// Rewrite a mode's name and target sensor set. Atomic: the cache
    /// changes only after the storage write succeeds.
    pub fn update_mode(&mut self, mode: SafeHomeMode) -> bool {
        if !self.modes.contains_key(&mode.id) {
            return false;
        }
        let name = mode.name.trim();
        if name.is_empty() {
            return false;
        }
        if self
            .modes
            .values()
            .any(|m| m.id != mode.id && m.name.eq_ignore_ascii_case(name))
        {
            debug!(name, "update_mode: duplicate mode name");
            return false;
        }
        let mode = SafeHomeMode {
            id: mode.id,
            name: name.to_string(),
            sensor_ids: mode.sensor_ids,
        };
        let row = ModeRow {
            id: mode.id,
            name: mode.name.clone(),
            sensor_ids: mode.sensor_ids.clone(),
        };
        if let Err(err) = self.storage.update_mode(&row) {
            warn!(mode_id = mode.id, error = %err, "update_mode: storage write rejected");
            return false;
        }
        info!(mode_id = mode.id, name = %mode.name, "mode updated");
        self.modes.insert(mode.id, mode);
        true
    }

    /// Current global settings (active mode, escalation numbers).
    pub fn settings(&self) -> SystemSettingsRow {
        self.settings.clone()
    }

    /// Replace the global settings. Atomic like the other writes.
    pub fn update_settings(&mut self, settings: SystemSettingsRow) -> bool {
        if let Err(err) = self.storage.update_system_settings(&settings) {
            warn!(error = %err, "update_settings: storage write rejected");
            return false;
        }
        self.settings = settings;
        true
    }

    pub fn zone(&self, id: u32) -> Option<SafetyZone> {
        self.zones.get(&id).cloned()
    }

    pub fn mode(&self, id: u32) -> Option<SafeHomeMode> {
        self.modes.get(&id).cloned()
    }

    pub fn mode_by_name(&self, name: &str) -> Option<SafeHomeMode> {
        self.modes
            .values()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// All zones, sorted by id.
    pub fn all_zones(&self) -> Vec<SafetyZone> {
        let mut zones: Vec<_> = self.zones.values().cloned().collect();
        zones.sort_by_key(|z| z.id);
        zones
    }

    /// All modes, sorted by id.
    pub fn all_modes(&self) -> Vec<SafeHomeMode> {
        let mut modes: Vec<_> = self.modes.values().cloned().collect();
        modes.sort_by_key(|m| m.id);
        modes
    }

    /// Zone ids in display order (ascending), for panel navigation.
    pub fn zone_ids(&self) -> Vec<u32> {
        let mut ids: Vec<_> = self.zones.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn active_mode_id(&self) -> Option<u32> {
        self.settings.active_mode_id
    }

    /// Escalation phone numbers, dial order.
    pub fn call_numbers(&self) -> Vec<String> {
        self.settings.call_numbers.clone()
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    /// True while some other armed zone contains the motion sensor and has
    /// at least one other member sensor currently armed.
    fn motion_sensor_is_needed(&self, disarming_zone: u32, sensor_id: u32) -> bool {
        self.zones.values().any(|other| {
            other.id != disarming_zone
                && other.armed
                && other.sensor_ids.contains(&sensor_id)
                && other
                    .sensor_ids
                    .iter()
                    .any(|&sid| sid != sensor_id && self.sensor_armed(sid))
        })
    }

    /// Recompute every zone's derived armed flag; persist and announce the
    /// ones that changed. Persistence failures here are logged, not rolled
    /// back — the flag is a derivation of sensor state, which has already
    /// committed.
    fn refresh_zone_statuses(&mut self) {
        let mut changed: Vec<u32> = Vec::new();
        let derived: Vec<(u32, bool)> = self
            .zones
            .values()
            .map(|z| (z.id, self.derive_armed(&z.sensor_ids)))
            .collect();
        for (id, armed) in derived {
            if let Some(zone) = self.zones.get_mut(&id) {
                if zone.armed != armed {
                    zone.armed = armed;
                    changed.push(id);
                }
            }
        }
        for id in changed {
            if let Some(zone) = self.zones.get(&id) {
                if let Err(err) = self.storage.update_zone(&Self::to_row(zone)) {
                    warn!(zone_id = id, error = %err, "failed to persist zone arm status");
                }
                let _ = self.events.send(EngineEvent::ZoneArmChanged {
                    zone_id: id,
                    armed: zone.armed,
                });
            }
        }
    }

    fn derive_armed(&self, sensor_ids: &[u32]) -> bool {
        sensor_ids.iter().any(|&id| self.sensor_armed(id))
    }

    fn sensor_armed(&self, id: u32) -> bool {
        self.registry.snapshot(id).is_some_and(|s| s.is_armed())
    }

    /// Name uniqueness is checked against storage, the system of record
    /// for committed zones (the cache is write-through, so the answer is
    /// the same — but an unreadable store must reject, not admit).
    fn zone_name_taken(&self, name: &str, exclude: Option<u32>) -> bool {
        match self.storage.get_zone_by_name(name) {
            Ok(Some(row)) => Some(row.id) != exclude,
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "zone name lookup failed, rejecting");
                true
            }
        }
    }

    fn overlaps_any(&self, rect: &Rect, exclude: Option<u32>) -> bool {
        self.zones
            .values()
            .any(|z| Some(z.id) != exclude && z.rect.overlaps(rect))
    }

    fn to_row(zone: &SafetyZone) -> ZoneRow {
        ZoneRow {
            id: zone.id,
            name: zone.name.clone(),
            x1: zone.rect.x1,
            y1: zone.rect.y1,
            x2: zone.rect.x2,
            y2: zone.rect.y2,
            sensor_ids: zone.sensor_ids.clone(),
            armed: zone.armed,
        }
    }
}

impl std::fmt::Debug for ZoneConfigurationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneConfigurationEngine")
            .field("zones", &self.zones.len())
            .field("modes", &self.modes.len())
            .field("active_mode_id", &self.settings.active_mode_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::devices::sensor::SensorGeometry;
    use crate::event::event_channel;
    use crate::storage::{MemoryStorage, SensorRow};

    fn seed_sensor(store: &MemoryStorage, id: u32, kind: SensorKind) {
        store.seed_sensor(SensorRow {
            id,
            kind,
            geometry: match kind {
                SensorKind::WindowDoor => SensorGeometry::Point { x: 0, y: 0 },
                SensorKind::MotionDetector => SensorGeometry::Segment {
                    x1: 0,
                    y1: 0,
                    x2: 5,
                    y2: 0,
                },
            },
            armed: false,
        });
    }

    fn seed_zone(store: &MemoryStorage, id: u32, name: &str, rect: (f64, f64, f64, f64), sensors: &[u32]) {
        store.seed_zone(ZoneRow {
            id,
            name: name.to_string(),
            x1: rect.0,
            y1: rect.1,
            x2: rect.2,
            y2: rect.3,
            sensor_ids: sensors.to_vec(),
            armed: false,
        });
    }

    fn engine(store: Arc<MemoryStorage>) -> ZoneConfigurationEngine {
        store.seed_settings(SystemSettingsRow {
            active_mode_id: None,
            call_numbers: vec!["119".into()],
        });
        let (tx, _rx) = event_channel(64);
        let registry = SensorRegistry::new(
            store.clone() as Arc<dyn Storage>,
            tx.clone(),
            Duration::from_secs(1),
        );
        registry.load().unwrap();
        let mut engine = ZoneConfigurationEngine::new(registry, store as Arc<dyn Storage>, tx);
        engine.load().unwrap();
        engine
    }

    #[test]
    fn test_find_lowest_empty_id() {
        assert_eq!(find_lowest_empty_id(&[2, 3, 4]), 1);
        assert_eq!(find_lowest_empty_id(&[1, 2, 3]), 4);
        assert_eq!(find_lowest_empty_id(&[]), 1);
    }

    #[test]
    fn test_overlap_is_symmetric_and_edges_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 15.0, 15.0);
        let c = Rect::new(10.0, 0.0, 20.0, 10.0); // shares an edge with a
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn test_arm_zone_arms_members_and_sets_status() {
        let store = Arc::new(MemoryStorage::new());
        seed_sensor(&store, 1, SensorKind::WindowDoor);
        seed_sensor(&store, 2, SensorKind::WindowDoor);
        seed_zone(&store, 1, "Porch", (0.0, 0.0, 10.0, 10.0), &[1, 2]);
        let mut engine = engine(store);

        assert!(engine.arm_zone(1));
        let zone = engine.zone(1).unwrap();
        assert!(zone.armed);
        assert!(!engine.arm_zone(99));
    }

    #[test]
    fn test_shared_window_door_sensor_disarms_unconditionally() {
        // Sensor 7 (window/door) shared by zones 2 and 3; sensor 9 in zone 3.
        let store = Arc::new(MemoryStorage::new());
        seed_sensor(&store, 7, SensorKind::WindowDoor);
        seed_sensor(&store, 9, SensorKind::WindowDoor);
        seed_zone(&store, 2, "Hall", (0.0, 0.0, 10.0, 10.0), &[7]);
        seed_zone(&store, 3, "Study", (20.0, 0.0, 30.0, 10.0), &[7, 9]);
        let mut engine = engine(store);

        assert!(engine.arm_zone(2));
        assert!(engine.arm_zone(3));

        assert!(engine.disarm_zone(2));
        assert!(!engine.registry().snapshot(7).unwrap().is_armed());

        assert!(engine.disarm_zone(3));
        assert!(!engine.registry().snapshot(9).unwrap().is_armed());
        assert!(!engine.zone(2).unwrap().armed);
        assert!(!engine.zone(3).unwrap().armed);
    }

    #[test]
    fn test_shared_motion_sensor_lingers_until_both_zones_disarm() {
        let store = Arc::new(MemoryStorage::new());
        seed_sensor(&store, 1, SensorKind::WindowDoor);
        seed_sensor(&store, 2, SensorKind::WindowDoor);
        seed_sensor(&store, 5, SensorKind::MotionDetector);
        seed_zone(&store, 1, "Kitchen", (0.0, 0.0, 10.0, 10.0), &[1, 5]);
        seed_zone(&store, 2, "Lounge", (20.0, 0.0, 30.0, 10.0), &[2, 5]);
        let mut engine = engine(store);

        assert!(engine.arm_zone(1));
        assert!(engine.arm_zone(2));

        // Lounge is still armed and has sensor 2 live, so 5 must linger.
        assert!(engine.disarm_zone(1));
        assert!(engine.registry().snapshot(5).unwrap().is_armed());
        assert!(!engine.registry().snapshot(1).unwrap().is_armed());
        assert!(engine.zone(1).unwrap().armed, "lingering motion sensor keeps zone derived-armed");

        assert!(engine.disarm_zone(2));
        assert!(!engine.registry().snapshot(5).unwrap().is_armed());
        assert!(!engine.zone(1).unwrap().armed);
        assert!(!engine.zone(2).unwrap().armed);
    }

    #[test]
    fn test_motion_sensor_releases_when_it_is_the_only_live_sensor_elsewhere() {
        let store = Arc::new(MemoryStorage::new());
        seed_sensor(&store, 1, SensorKind::WindowDoor);
        seed_sensor(&store, 5, SensorKind::MotionDetector);
        seed_zone(&store, 1, "Kitchen", (0.0, 0.0, 10.0, 10.0), &[1, 5]);
        seed_zone(&store, 2, "Lounge", (20.0, 0.0, 30.0, 10.0), &[5]);
        let mut engine = engine(store);

        assert!(engine.arm_zone(1));
        assert!(engine.arm_zone(2));

        // The lounge's only sensor is 5 itself, so 5 may be released.
        assert!(engine.disarm_zone(1));
        assert!(!engine.registry().snapshot(5).unwrap().is_armed());
    }

    #[test]
    fn test_change_to_mode_is_a_full_resync() {
        let store = Arc::new(MemoryStorage::new());
        seed_sensor(&store, 1, SensorKind::WindowDoor);
        seed_sensor(&store, 2, SensorKind::WindowDoor);
        seed_sensor(&store, 3, SensorKind::MotionDetector);
        store.seed_mode(ModeRow {
            id: 1,
            name: "Away".to_string(),
            sensor_ids: vec![1, 3],
        });
        let mut engine = engine(store);

        // Sensor 2 armed by an unrelated path; the resync must disarm it.
        engine.registry().arm(2);
        assert!(engine.change_to_mode("Away"));
        assert!(engine.registry().snapshot(1).unwrap().is_armed());
        assert!(!engine.registry().snapshot(2).unwrap().is_armed());
        assert!(engine.registry().snapshot(3).unwrap().is_armed());
        assert_eq!(engine.active_mode_id(), Some(1));

        // Idempotent.
        assert!(engine.change_to_mode("Away"));
        assert!(engine.registry().snapshot(1).unwrap().is_armed());
        assert!(!engine.registry().snapshot(2).unwrap().is_armed());

        assert!(!engine.change_to_mode("Vacation"));
    }

    #[test]
    fn test_add_zone_rejects_overlap_and_duplicate_name() {
        let store = Arc::new(MemoryStorage::new());
        let mut engine = engine(store);

        assert!(engine.add_zone(ZoneDraft {
            name: "Garage".to_string(),
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            sensor_ids: vec![],
        }));
        assert!(!engine.add_zone(ZoneDraft {
            name: "Cellar".to_string(),
            rect: Rect::new(5.0, 5.0, 15.0, 15.0),
            sensor_ids: vec![],
        }));
        assert!(!engine.add_zone(ZoneDraft {
            name: "garage".to_string(),
            rect: Rect::new(40.0, 40.0, 50.0, 50.0),
            sensor_ids: vec![],
        }));
        assert!(engine.add_zone(ZoneDraft {
            name: "Cellar".to_string(),
            rect: Rect::new(20.0, 20.0, 30.0, 30.0),
            sensor_ids: vec![],
        }));
    }

    #[test]
    fn test_add_zone_assigns_lowest_unused_id() {
        let store = Arc::new(MemoryStorage::new());
        seed_zone(&store, 2, "Hall", (0.0, 0.0, 10.0, 10.0), &[]);
        seed_zone(&store, 3, "Study", (20.0, 0.0, 30.0, 10.0), &[]);
        let mut engine = engine(store);

        assert!(engine.add_zone(ZoneDraft {
            name: "Attic".to_string(),
            rect: Rect::new(0.0, 20.0, 10.0, 30.0),
            sensor_ids: vec![],
        }));
        assert!(engine.zone(1).is_some());
        assert_eq!(engine.zone(1).unwrap().name, "Attic");
    }

    #[test]
    fn test_add_zone_is_atomic_on_storage_failure() {
        let store = Arc::new(MemoryStorage::new());
        let mut engine = engine(store.clone());

        store.set_fail_writes(true);
        assert!(!engine.add_zone(ZoneDraft {
            name: "Garage".to_string(),
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            sensor_ids: vec![],
        }));
        assert!(engine.all_zones().is_empty());
        assert!(store.get_all_zones().unwrap().is_empty());
    }

    #[test]
    fn test_update_zone_is_atomic_on_storage_failure() {
        let store = Arc::new(MemoryStorage::new());
        seed_zone(&store, 1, "Hall", (0.0, 0.0, 10.0, 10.0), &[]);
        let mut engine = engine(store.clone());

        store.set_fail_writes(true);
        assert!(!engine.update_zone(ZoneUpdate {
            id: 1,
            name: "Hallway".to_string(),
            rect: Rect::new(0.0, 0.0, 12.0, 12.0),
            sensor_ids: vec![],
        }));
        assert_eq!(engine.zone(1).unwrap().name, "Hall");
        assert_eq!(engine.zone(1).unwrap().rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(store.get_all_zones().unwrap()[0].name, "Hall");
    }

    #[test]
    fn test_update_mode_rewrites_target_set_atomically() {
        let store = Arc::new(MemoryStorage::new());
        seed_sensor(&store, 1, SensorKind::WindowDoor);
        seed_sensor(&store, 2, SensorKind::WindowDoor);
        store.seed_mode(ModeRow {
            id: 1,
            name: "Away".to_string(),
            sensor_ids: vec![1],
        });
        store.seed_mode(ModeRow {
            id: 2,
            name: "Home".to_string(),
            sensor_ids: vec![],
        });
        let mut engine = engine(store.clone());

        assert!(engine.update_mode(SafeHomeMode {
            id: 1,
            name: "Away".to_string(),
            sensor_ids: vec![1, 2],
        }));
        assert!(engine.change_to_mode("Away"));
        assert!(engine.registry().snapshot(2).unwrap().is_armed());

        // Renaming over another mode is rejected.
        assert!(!engine.update_mode(SafeHomeMode {
            id: 1,
            name: "home".to_string(),
            sensor_ids: vec![1],
        }));
        assert!(!engine.update_mode(SafeHomeMode {
            id: 99,
            name: "Night".to_string(),
            sensor_ids: vec![],
        }));

        store.set_fail_writes(true);
        assert!(!engine.update_mode(SafeHomeMode {
            id: 1,
            name: "Away".to_string(),
            sensor_ids: vec![1],
        }));
        assert_eq!(engine.mode(1).unwrap().sensor_ids, vec![1, 2]);
    }

    #[test]
    fn test_update_settings_is_atomic() {
        let store = Arc::new(MemoryStorage::new());
        let mut engine = engine(store.clone());

        assert!(engine.update_settings(SystemSettingsRow {
            active_mode_id: None,
            call_numbers: vec!["112".to_string()],
        }));
        assert_eq!(engine.call_numbers(), vec!["112"]);
        assert_eq!(store.get_system_settings().unwrap().call_numbers, vec!["112"]);

        store.set_fail_writes(true);
        assert!(!engine.update_settings(SystemSettingsRow {
            active_mode_id: None,
            call_numbers: vec![],
        }));
        assert_eq!(engine.settings().call_numbers, vec!["112"]);
    }

    #[test]
    fn test_update_zone_excludes_self_from_overlap_check() {
        let store = Arc::new(MemoryStorage::new());
        seed_zone(&store, 1, "Hall", (0.0, 0.0, 10.0, 10.0), &[]);
        let mut engine = engine(store);

        // Growing the zone over its own old footprint is fine.
        assert!(engine.update_zone(ZoneUpdate {
            id: 1,
            name: "Hall".to_string(),
            rect: Rect::new(0.0, 0.0, 12.0, 12.0),
            sensor_ids: vec![],
        }));
        assert!(!engine.update_zone(ZoneUpdate {
            id: 99,
            name: "Hall".to_string(),
            rect: Rect::new(0.0, 0.0, 1.0, 1.0),
            sensor_ids: vec![],
        }));
    }

    #[test]
    fn test_delete_zone() {
        let store = Arc::new(MemoryStorage::new());
        seed_zone(&store, 1, "Hall", (0.0, 0.0, 10.0, 10.0), &[]);
        let mut engine = engine(store.clone());

        assert!(engine.delete_zone(1));
        assert!(engine.zone(1).is_none());
        assert!(store.get_all_zones().unwrap().is_empty());
        assert!(!engine.delete_zone(1));
    }
}

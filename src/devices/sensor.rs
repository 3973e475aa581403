// MIT License - Copyright (c) 2026 SafeHome Project

//! Simulated intrusion sensors.
//!
//! Two hardware variants exist: window/door contacts anchored at a point,
//! and motion detectors covering a line segment. Both share the same
//! armed/detected contract: `intrude()` latches `detected`, and `read()`
//! reports the latch only while the sensor is armed — disarming masks the
//! latch without clearing it.

use chrono::{DateTime, Utc};

/// Sensor hardware variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Magnetic contact on a window or door.
    WindowDoor,
    /// Passive infrared motion detector.
    MotionDetector,
}

impl SensorKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::WindowDoor => "Window/Door Sensor",
            Self::MotionDetector => "Motion Detector",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Where a sensor sits on the floor plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorGeometry {
    /// Window/door contacts anchor at a single point.
    Point { x: i32, y: i32 },
    /// Motion detectors cover a line segment.
    Segment { x1: i32, y1: i32, x2: i32, y2: i32 },
}

/// A single simulated sensor.
#[derive(Debug, Clone)]
pub struct Sensor {
    pub id: u32,
    pub kind: SensorKind,
    pub geometry: SensorGeometry,
    armed: bool,
    detected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sensor {
    pub fn new(id: u32, kind: SensorKind, geometry: SensorGeometry, armed: bool) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            geometry,
            armed,
            detected: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
        self.updated_at = Utc::now();
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.updated_at = Utc::now();
    }

    /// Latch the intrusion flag (simulated physical trigger).
    pub fn intrude(&mut self) {
        self.detected = true;
    }

    /// Clear the intrusion latch.
    pub fn release(&mut self) {
        self.detected = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_detected(&self) -> bool {
        self.detected
    }

    /// Intrusion query: the latch is only observable while armed.
    pub fn read(&self) -> bool {
        self.armed && self.detected
    }

    /// Move the sensor on the floor plan.
    pub fn relocate(&mut self, geometry: SensorGeometry) {
        self.geometry = geometry;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windoor(id: u32) -> Sensor {
        Sensor::new(id, SensorKind::WindowDoor, SensorGeometry::Point { x: 0, y: 0 }, false)
    }

    #[test]
    fn test_read_requires_armed() {
        let mut s = windoor(1);
        s.intrude();
        assert!(!s.read(), "latch must be masked while disarmed");
        s.arm();
        assert!(s.read());
    }

    #[test]
    fn test_disarm_masks_latch_without_clearing() {
        let mut s = windoor(1);
        s.arm();
        s.intrude();
        assert!(s.read());
        s.disarm();
        assert!(!s.read());
        assert!(s.is_detected(), "disarm must not clear the latch");
        s.arm();
        assert!(s.read(), "latch visible again after re-arm");
    }

    #[test]
    fn test_release_clears_latch() {
        let mut s = windoor(1);
        s.arm();
        s.intrude();
        s.release();
        assert!(!s.read());
        assert!(!s.is_detected());
    }
}

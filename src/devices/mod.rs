// MIT License - Copyright (c) 2026 SafeHome Project

//! Simulated device layer: sensors and the alarm sounder.

pub mod alarm;
pub mod sensor;

pub use alarm::{AlarmHardware, SimulatedAlarm};
pub use sensor::{Sensor, SensorGeometry, SensorKind};

// MIT License - Copyright (c) 2026 SafeHome Project

//! Panel state machine, controller, and runtime task.

pub mod control;
pub mod runtime;
pub mod state;

pub use control::{ControlPanel, NullHooks, SystemHooks};
pub use runtime::{CommandSender, PanelCommand};
pub use state::{PanelIndicators, PanelState};

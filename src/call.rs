// MIT License - Copyright (c) 2026 SafeHome Project

//! External emergency/homeowner call collaborator.

use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

/// Places the external calls used by panic and ring-timer escalation.
pub trait CallService: Send + Sync {
    /// Dial one number. `false` means the call could not be placed; the
    /// engine continues with the remaining numbers regardless.
    fn call(&self, number: &str) -> bool;
}

/// [`CallService`] that only logs and records the numbers it "dialed".
#[derive(Debug, Default)]
pub struct SimulatedCallService {
    placed: Mutex<Vec<String>>,
}

impl SimulatedCallService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every number dialed so far, in order.
    pub fn placed(&self) -> Vec<String> {
        self.placed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CallService for SimulatedCallService {
    fn call(&self, number: &str) -> bool {
        if number.is_empty() {
            warn!("refusing to dial an empty number");
            return false;
        }
        info!(number, "placing external call");
        self.placed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(number.to_string());
        true
    }
}

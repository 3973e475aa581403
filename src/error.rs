// MIT License - Copyright (c) 2026 SafeHome Project

//! Engine error type.
//!
//! Only initialization and storage plumbing surface as [`EngineError`].
//! Everything user-facing (validation failures, unknown ids, failed
//! logins) is a boolean/optional result at the engine boundary, never an
//! error — the panel must stay in a safe state rather than crash.

/// All errors that can occur inside the security control engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage rejected {entity} write")]
    WriteRejected { entity: &'static str },

    #[error("system settings row missing from storage")]
    MissingSystemSettings,

    #[error("panel runtime channel closed")]
    ChannelClosed,
}

impl EngineError {
    /// Whether the error is fatal for engine startup. Write rejections are
    /// recoverable (the engine reports `false` and keeps its cache
    /// consistent); an incomplete store at init time is not.
    pub fn is_fatal_at_init(&self) -> bool {
        matches!(self, EngineError::MissingSystemSettings)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Error types for Synheart Behavior

use thiserror::Error;

/// Errors surfaced by the behavior engine.
///
/// Session-boundary violations are always returned to the caller. Problems with individual
/// events are never errors: they are counted in [`crate::engine::EngineDiagnostics`].
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("A session is already active: {0}")]
    AlreadyActive(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Incomplete context, missing field: {0}")]
    IncompleteContext(String),

    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl BehaviorError {
    /// Stable machine-readable code, used by the FFI and CLI error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            BehaviorError::Configuration(_) => "CONFIGURATION_ERROR",
            BehaviorError::NotInitialized => "NOT_INITIALIZED",
            BehaviorError::AlreadyActive(_) => "ALREADY_ACTIVE",
            BehaviorError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            BehaviorError::IncompleteContext(_) => "INCOMPLETE_CONTEXT",
            BehaviorError::ParseError(_) => "PARSE_ERROR",
            BehaviorError::JsonError(_) => "JSON_ERROR",
            BehaviorError::EncodingError(_) => "ENCODING_ERROR",
        }
    }
}

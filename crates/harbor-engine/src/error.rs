//! Error types for the engine backends.

use thiserror::Error;

/// Result type for engine backend operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur starting or talking to an engine backend.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine library failed to load.
    #[error("failed to load engine library: {0}")]
    LibraryLoad(String),

    /// Symbol lookup failed.
    #[error("engine symbol not found: {0}")]
    SymbolNotFound(String),

    /// Engine start failed.
    #[error("engine start failed: {0}")]
    StartFailed(String),

    /// Start requested twice on the same backend.
    #[error("engine already started")]
    AlreadyStarted,

    /// The engine worker is gone; the record could not be delivered.
    #[error("engine is not running")]
    NotRunning,
}

impl From<EngineError> for harbor_bridge::BridgeError {
    fn from(err: EngineError) -> Self {
        harbor_bridge::BridgeError::Engine(err.to_string())
    }
}

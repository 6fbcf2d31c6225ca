//! Error types for the bridge.

use crate::state::LaunchState;
use thiserror::Error;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can surface from the coordination layer.
///
/// None of these are fatal: a rejected launch is an idempotent no-op for
/// the caller, and a failed engine call only loses the one record involved.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No engine collaborator has been attached yet.
    #[error("no engine attached to the bridge")]
    EngineNotAttached,

    /// Engine start requested outside the `Launching` state.
    #[error("engine launch rejected in state {0:?}")]
    LaunchRejected(LaunchState),

    /// A call into the engine collaborator failed.
    #[error("engine call failed: {0}")]
    Engine(String),
}

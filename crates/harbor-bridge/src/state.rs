//! Launch lifecycle state machine.
//!
//! Every other bridge component consults or mutates this one cell. All
//! three operations share a single lock, so no caller can observe a torn
//! read or lose a transition to a concurrent writer.

use parking_lot::Mutex;

/// Where the embedded engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    /// Process started, engine not yet asked to run.
    Launching,
    /// Launch deferred until a manual trigger fires (debug gate).
    AwaitingManualTrigger,
    /// `Engine::start` has been issued; the engine is initializing.
    Launched,
    /// The engine finished initializing and accepts events directly.
    Ready,
    /// The engine reported exit. Terminal.
    ShuttingDown,
}

/// Serialized launch-state cell shared by every bridge component.
pub struct LaunchStateMachine {
    state: Mutex<LaunchState>,
}

impl LaunchStateMachine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LaunchState::Launching),
        }
    }

    pub fn read(&self) -> LaunchState {
        *self.state.lock()
    }

    pub fn is(&self, expected: LaunchState) -> bool {
        self.read() == expected
    }

    /// Unconditional transition. Once `ShuttingDown` is reached the cell is
    /// frozen and further changes are logged and ignored.
    pub fn set(&self, next: LaunchState) {
        let mut state = self.state.lock();
        if *state == LaunchState::ShuttingDown && next != LaunchState::ShuttingDown {
            log::warn!("ignoring launch state change to {next:?} after shutdown");
            return;
        }
        log::debug!("launch state {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Transition to `next` only if the current state is `expected`,
    /// returning whether the transition happened. Concurrent competing
    /// calls produce exactly one winner.
    pub fn compare_and_set(&self, expected: LaunchState, next: LaunchState) -> bool {
        let mut state = self.state.lock();
        if *state != expected || *state == LaunchState::ShuttingDown {
            return false;
        }
        log::debug!("launch state {:?} -> {:?}", *state, next);
        *state = next;
        true
    }
}

impl Default for LaunchStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

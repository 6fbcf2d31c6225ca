//! Event delivery to the engine: direct once ready, buffered before that.

use std::collections::VecDeque;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::event::EngineEvent;
use crate::state::{LaunchState, LaunchStateMachine};
use crate::Engine;

/// Routes engine-bound records.
///
/// Until the engine reports ready every record is appended to the pending
/// queue; the transition into `Ready` drains that queue once, in insertion
/// order. The queue lock is held across the ready check on delivery and
/// across the whole drain, so a record enqueued before the transition can
/// never be observed by the engine after one enqueued later.
///
/// The engine sink must not call back into `deliver` synchronously from
/// `notify`; delivery happens under the queue lock.
pub struct EventDispatcher {
    launch: Arc<LaunchStateMachine>,
    engine: OnceCell<Arc<dyn Engine>>,
    pending: Mutex<VecDeque<EngineEvent>>,
}

impl EventDispatcher {
    pub fn new(launch: Arc<LaunchStateMachine>) -> Self {
        Self {
            launch,
            engine: OnceCell::new(),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Attach the engine collaborator. Later calls are ignored.
    pub fn attach_engine(&self, engine: Arc<dyn Engine>) {
        if self.engine.set(engine).is_err() {
            log::warn!("engine already attached; ignoring");
        }
    }

    pub fn engine(&self) -> Option<&Arc<dyn Engine>> {
        self.engine.get()
    }

    /// Deliver one record, or buffer it while the engine is not ready.
    pub fn deliver(&self, event: EngineEvent) {
        let mut pending = self.pending.lock();
        if self.launch.is(LaunchState::Ready) {
            self.notify(event);
        } else {
            log::trace!("buffering {event:?} in state {:?}", self.launch.read());
            pending.push_back(event);
        }
    }

    /// Invoked when the engine signals readiness: transition
    /// `Launched -> Ready`, then hand over everything buffered, in order.
    /// A ready signal in any other state is ignored.
    pub fn on_engine_ready(&self) {
        let mut pending = self.pending.lock();
        if !self
            .launch
            .compare_and_set(LaunchState::Launched, LaunchState::Ready)
        {
            log::warn!(
                "ready signal in state {:?}; ignoring",
                self.launch.read()
            );
            return;
        }
        log::info!("engine ready; draining {} buffered event(s)", pending.len());
        while let Some(event) = pending.pop_front() {
            self.notify(event);
        }
    }

    /// Hand one record to the engine. A failed record is logged and dropped
    /// so it cannot block the ones behind it.
    fn notify(&self, event: EngineEvent) {
        match self.engine.get() {
            Some(engine) => {
                if let Err(err) = engine.notify(event) {
                    log::error!("dropping engine event after delivery failure: {err}");
                }
            }
            None => log::error!("dropping engine event: no engine attached"),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

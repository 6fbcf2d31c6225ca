//! Synchronous flush barrier between the caller and the engine context.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot rendezvous that blocks a caller until the engine acknowledges
/// it has drained every record delivered before the barrier was raised.
///
/// At most one barrier is outstanding at a time: later callers queue on an
/// internal owner lock behind the current waiter. Acknowledgments with no
/// waiter outstanding are no-ops, so an engine-side ack racing a timed-out
/// waiter is harmless.
pub struct SyncBarrier {
    serial: Mutex<()>,
    pending: Mutex<bool>,
    acked: Condvar,
}

impl SyncBarrier {
    pub fn new() -> Self {
        Self {
            serial: Mutex::new(()),
            pending: Mutex::new(false),
            acked: Condvar::new(),
        }
    }

    /// Raise the barrier, invoke `deliver_marker` to push the sync marker
    /// through the dispatcher, then block until acknowledged.
    pub fn wait_for_drain(&self, deliver_marker: impl FnOnce()) {
        let _owner = self.serial.lock();
        *self.pending.lock() = true;
        deliver_marker();

        let mut pending = self.pending.lock();
        while *pending {
            self.acked.wait(&mut pending);
        }
    }

    /// Bounded variant of [`wait_for_drain`](Self::wait_for_drain). Returns
    /// `false` if the acknowledgment did not arrive within `timeout`;
    /// expiry lowers the barrier so a late ack is a no-op.
    pub fn wait_for_drain_timeout(&self, timeout: Duration, deliver_marker: impl FnOnce()) -> bool {
        let _owner = self.serial.lock();
        *self.pending.lock() = true;
        deliver_marker();

        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while *pending {
            if self.acked.wait_until(&mut pending, deadline).timed_out() {
                log::warn!("sync barrier expired after {timeout:?}");
                *pending = false;
                return false;
            }
        }
        true
    }

    /// Release the blocked waiter, if any. Called from the engine-side
    /// callback path once the sync marker has been processed. Safe to call
    /// with no barrier outstanding; repeated acks release only one waiter.
    pub fn acknowledge(&self) {
        let mut pending = self.pending.lock();
        if *pending {
            *pending = false;
            self.acked.notify_one();
        } else {
            log::debug!("sync acknowledge with no barrier outstanding");
        }
    }
}

impl Default for SyncBarrier {
    fn default() -> Self {
        Self::new()
    }
}

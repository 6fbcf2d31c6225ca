//! Blocking cross-thread request/response exchanges.
//!
//! A UI-only capability (file chooser, clipboard, input-method query) is
//! invoked on behalf of the engine thread by posting the privileged
//! operation to the UI context and blocking on a single-slot rendezvous
//! until the result comes back. One uniform primitive serves every
//! exchange kind.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// How long the cooperative variant sleeps between polls of the slot.
const STEP_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The exchange kinds the bridge maintains a slot for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    FilePick,
    ClipboardText,
    ImeQuery,
}

/// Composition text and selection reported by the input-method surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImeQueryReply {
    pub text: String,
    pub selection_start: usize,
    pub selection_length: usize,
}

/// Reply payloads for [`crate::EngineHooks::fulfil_exchange`], one variant
/// per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeReply {
    FilePick(Option<PathBuf>),
    ClipboardText(Option<String>),
    ImeQuery(ImeQueryReply),
}

struct Slot<T> {
    /// A request round is in flight; replies outside one are dropped.
    open: bool,
    value: Option<T>,
}

/// Single-slot rendezvous between a blocked requester and the UI-capable
/// responder.
///
/// The slot holds at most one value: written once per request by the
/// responder, emptied by the requester's wait, then discarded. Requests on
/// the same exchange serialize behind an internal owner lock.
pub struct Exchange<T> {
    serial: Mutex<()>,
    slot: Mutex<Slot<T>>,
    filled: Condvar,
}

impl<T> Exchange<T> {
    pub fn new() -> Self {
        Self {
            serial: Mutex::new(()),
            slot: Mutex::new(Slot {
                open: false,
                value: None,
            }),
            filled: Condvar::new(),
        }
    }

    /// Run one blocking request round: open the slot, invoke `post` to hand
    /// the privileged operation to the responder context, then block until
    /// the reply arrives or `timeout` elapses. Timeout yields `None`, the
    /// caller's "nothing selected" sentinel.
    pub fn request(&self, timeout: Duration, post: impl FnOnce()) -> Option<T> {
        let _owner = self.serial.lock();
        self.open_round();
        post();

        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.value.take() {
                slot.open = false;
                return Some(value);
            }
            if self.filled.wait_until(&mut slot, deadline).timed_out() {
                log::warn!("exchange request expired after {timeout:?}");
                slot.open = false;
                slot.value = None;
                return None;
            }
        }
    }

    /// Cooperative variant: poll the slot at a short interval, invoking
    /// `step` between polls so the calling thread keeps servicing its own
    /// event-processing loop while it waits.
    pub fn request_with(
        &self,
        timeout: Duration,
        post: impl FnOnce(),
        mut step: impl FnMut(),
    ) -> Option<T> {
        let _owner = self.serial.lock();
        self.open_round();
        post();

        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut slot = self.slot.lock();
                if let Some(value) = slot.value.take() {
                    slot.open = false;
                    return Some(value);
                }
                if Instant::now() >= deadline {
                    log::warn!("exchange request expired after {timeout:?}");
                    slot.open = false;
                    return None;
                }
            }
            step();
            std::thread::sleep(STEP_POLL_INTERVAL);
        }
    }

    /// Hand back the result. Called once per request from the responder
    /// context; a reply with no request outstanding, or a second reply in
    /// the same round, is dropped with a warning.
    pub fn fulfil(&self, value: T) {
        let mut slot = self.slot.lock();
        if !slot.open {
            log::warn!("dropping exchange reply with no request outstanding");
            return;
        }
        if slot.value.is_some() {
            log::warn!("dropping duplicate exchange reply; keeping the first");
            return;
        }
        slot.value = Some(value);
        self.filled.notify_one();
    }

    fn open_round(&self) {
        let mut slot = self.slot.lock();
        slot.open = true;
        slot.value = None;
    }
}

impl<T> Default for Exchange<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_request_returns_fulfilled_value() {
        let exchange = Arc::new(Exchange::new());
        let responder = Arc::clone(&exchange);

        let result = exchange.request(Duration::from_secs(1), move || {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                responder.fulfil(42u32);
            });
        });
        assert_eq!(result, Some(42));
    }

    #[test]
    fn test_request_times_out_to_sentinel() {
        let exchange: Exchange<u32> = Exchange::new();
        let result = exchange.request(Duration::from_millis(20), || {});
        assert_eq!(result, None);
    }

    #[test]
    fn test_fulfilment_racing_the_post_is_not_lost() {
        // The responder may run before the requester starts waiting; the
        // round is opened before `post`, so the value is kept.
        let exchange = Arc::new(Exchange::new());
        let responder = Arc::clone(&exchange);

        let result =
            exchange.request(Duration::from_secs(1), move || responder.fulfil("ready"));
        assert_eq!(result, Some("ready"));
    }

    #[test]
    fn test_spurious_fulfilment_is_dropped() {
        let exchange: Exchange<u32> = Exchange::new();
        exchange.fulfil(7);

        // The dropped reply must not satisfy the next request.
        let result = exchange.request(Duration::from_millis(20), || {});
        assert_eq!(result, None);
    }

    #[test]
    fn test_request_with_invokes_step_while_waiting() {
        let exchange = Arc::new(Exchange::new());
        let responder = Arc::clone(&exchange);
        let steps = AtomicUsize::new(0);

        let result = exchange.request_with(
            Duration::from_secs(1),
            move || {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(30));
                    responder.fulfil(1u32);
                });
            },
            || {
                steps.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(result, Some(1));
        assert!(steps.load(Ordering::SeqCst) > 0);
    }
}

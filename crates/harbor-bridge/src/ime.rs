//! Input-method state coalescing.
//!
//! Focus moves inside the content arrive from the engine as bursts of
//! enable/reset requests. Applying each one flickers the input method and
//! repeats system calls, so requests are merged over a short window and
//! applied once, on the UI context.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{HostShell, ImeHost};

/// Default coalescing window.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(200);

/// Processing state of the input-method surface, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImeState {
    /// No input-method processing; the surface is hidden.
    #[default]
    Disabled,
    /// Ordinary text entry.
    Enabled,
    /// Password entry.
    Password,
    /// Input is owned by embedded plugin content; the surface is hidden.
    Plugin,
}

impl ImeState {
    /// Whether the input-method surface should be shown for this state.
    pub fn wants_surface(self) -> bool {
        matches!(self, ImeState::Enabled | ImeState::Password)
    }
}

/// IME configuration reported by the engine alongside the state.
#[derive(Debug, Clone, Default)]
pub struct ImeSurfaceState {
    pub state: ImeState,
    pub type_hint: String,
    pub action_hint: String,
}

/// Selection or text change inside the focused editor, forwarded to the
/// input-method surface without coalescing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImeChange {
    Selection {
        start: usize,
        end: usize,
    },
    Text {
        text: String,
        start: usize,
        old_end: usize,
        new_end: usize,
    },
}

struct CoalescerFlags {
    enable: bool,
    reset: bool,
    /// A timer is scheduled and has not fired yet.
    armed: bool,
}

struct CoalescerInner {
    flags: Mutex<CoalescerFlags>,
    surface: Mutex<ImeSurfaceState>,
    window: Duration,
    shell: Arc<dyn HostShell>,
    host: Arc<dyn ImeHost>,
}

/// Merges bursts of input-method state change requests into a single
/// applied change.
///
/// Each instance owns its flags and its armed-timer marker; arming spawns
/// a dedicated timer thread for one window. When the timer fires, the
/// armed marker is cleared before anything is applied, so a request
/// landing during the apply arms a fresh timer instead of being swallowed.
pub struct ImeCoalescer {
    inner: Arc<CoalescerInner>,
}

impl ImeCoalescer {
    pub fn new(window: Duration, shell: Arc<dyn HostShell>, host: Arc<dyn ImeHost>) -> Self {
        Self {
            inner: Arc::new(CoalescerInner {
                flags: Mutex::new(CoalescerFlags {
                    enable: false,
                    reset: false,
                    armed: false,
                }),
                surface: Mutex::new(ImeSurfaceState::default()),
                window,
                shell,
                host,
            }),
        }
    }

    /// Record the surface configuration the engine reported. Consulted
    /// when the coalescing window closes, not when the report arrives.
    pub fn set_surface(&self, surface: ImeSurfaceState) {
        log::debug!(
            "ime surface state {:?} (type '{}', action '{}')",
            surface.state,
            surface.type_hint,
            surface.action_hint
        );
        *self.inner.surface.lock() = surface;
    }

    pub fn surface(&self) -> ImeSurfaceState {
        self.inner.surface.lock().clone()
    }

    /// Ask for the input-method surface to be shown or hidden according to
    /// the current surface state, once the window closes.
    pub fn request_enable(&self) {
        self.request(|flags| flags.enable = true);
    }

    /// Ask for the input-method composition to be restarted, once the
    /// window closes. Reset is applied before any visibility change.
    pub fn request_reset(&self) {
        self.request(|flags| flags.reset = true);
    }

    fn request(&self, set: impl FnOnce(&mut CoalescerFlags)) {
        let mut flags = self.inner.flags.lock();
        set(&mut flags);
        if !flags.armed {
            flags.armed = true;
            let inner = Arc::clone(&self.inner);
            thread::spawn(move || {
                thread::sleep(inner.window);
                fire(&inner);
            });
        }
    }
}

fn fire(inner: &CoalescerInner) {
    // Clear the armed marker and take the flags before applying, so a
    // request arriving while we apply arms a fresh timer.
    let (enable, reset) = {
        let mut flags = inner.flags.lock();
        flags.armed = false;
        (
            std::mem::take(&mut flags.enable),
            std::mem::take(&mut flags.reset),
        )
    };
    if !enable && !reset {
        return;
    }

    let visible = inner.surface.lock().state.wants_surface();
    let host = Arc::clone(&inner.host);
    inner.shell.post(Box::new(move || {
        if reset {
            host.restart_input();
        }
        if enable {
            host.set_ime_visible(visible);
        }
    }));
}

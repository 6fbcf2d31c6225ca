//! harbor-bridge: coordination between the host UI thread and the embedded
//! engine's own execution context.
//!
//! Responsibilities:
//! - Gate all engine interaction behind a launch state machine.
//! - Buffer engine-bound events until the engine reports ready, then drain
//!   them in order.
//! - Provide a synchronous barrier that flushes the event stream on demand.
//! - Run blocking request/response exchanges so UI-only capabilities can be
//!   invoked from the engine thread.
//! - Coalesce bursts of input-method state changes into one applied change.
//!
//! Nothing in this crate performs engine work; the engine is an opaque
//! collaborator reached through the [`Engine`] trait, and it reaches back
//! through [`EngineHooks`].

pub mod barrier;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod exchange;
pub mod ime;
pub mod state;

pub use context::{BridgeConfig, BridgeContext};
pub use error::{BridgeError, Result};
pub use event::{EngineEvent, Region};
pub use exchange::{Exchange, ExchangeKind, ExchangeReply, ImeQueryReply};
pub use ime::{ImeChange, ImeCoalescer, ImeState, ImeSurfaceState};
pub use state::{LaunchState, LaunchStateMachine};

use std::path::PathBuf;

/// Job marshalled onto the UI thread.
pub type UiJob = Box<dyn FnOnce() + Send>;

/// Arguments for the one-time engine start.
#[derive(Debug, Clone, Default)]
pub struct LaunchArgs {
    /// URI to load once the engine is up.
    pub uri: Option<String>,
    /// Additional engine command-line style arguments.
    pub args: Vec<String>,
}

/// Calls this layer makes into the engine collaborator.
pub trait Engine: Send + Sync {
    /// One-time start. Issued only during the `Launching -> Launched`
    /// transition; the engine spawns its own thread(s) and later reports
    /// back through [`EngineHooks::on_engine_ready`].
    fn start(&self, args: &LaunchArgs) -> Result<()>;

    /// Deliver one record. Fire-and-forget: the engine processes it
    /// asynchronously and must not call back into the dispatcher from
    /// inside this call.
    fn notify(&self, event: EngineEvent) -> Result<()>;
}

/// Callbacks the engine collaborator makes into this layer. All of them
/// are accepted from the engine's thread.
pub trait EngineHooks: Send + Sync {
    /// The engine finished initializing; triggers `Launched -> Ready` and
    /// the pending-queue drain.
    fn on_engine_ready(&self);

    /// The engine exited; triggers `-> ShuttingDown`. When `restart` is
    /// set the surrounding process is expected to relaunch afterwards.
    fn on_engine_exit(&self, restart: bool);

    /// The engine processed a sync marker; releases a barrier waiter.
    fn on_sync_acknowledge(&self);

    /// Resolve the matching cross-thread exchange.
    fn fulfil_exchange(&self, kind: ExchangeKind, reply: ExchangeReply);
}

/// The UI-capable side of the process: a serialized thread owning the
/// window, able to run jobs and the privileged platform operations.
pub trait HostShell: Send + Sync {
    /// Queue a job for execution on the UI thread.
    fn post(&self, job: UiJob);

    /// The engine exited; tear the process down (and relaunch when
    /// `restart` is set).
    fn request_exit(&self, restart: bool);

    /// Show the platform file chooser. UI thread only.
    fn choose_file(&self, filters: &str) -> Option<PathBuf>;

    /// Read the platform clipboard. UI thread only.
    fn clipboard_text(&self) -> Option<String>;

    /// Write the platform clipboard. UI thread only.
    fn set_clipboard_text(&self, text: &str);

    /// Current composition text and selection. UI thread only.
    fn ime_query(&self) -> ImeQueryReply;
}

/// The input-method surface attached to the content window.
pub trait ImeHost: Send + Sync {
    /// Restart the current composition.
    fn restart_input(&self);

    /// Show or hide the input-method surface.
    fn set_ime_visible(&self, visible: bool);

    /// A text or selection change in the focused editor.
    fn composition_changed(&self, change: ImeChange);
}

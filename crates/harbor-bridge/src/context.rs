//! The assembled coordination context.
//!
//! One `BridgeContext` is constructed at process start and shared (by
//! `Arc`) with everything that talks to the engine. It owns the launch
//! state machine, the event dispatcher, the sync barrier, the exchange
//! slots and the IME coalescer; there is no global state anywhere in the
//! bridge.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::barrier::SyncBarrier;
use crate::dispatch::EventDispatcher;
use crate::error::{BridgeError, Result};
use crate::event::EngineEvent;
use crate::exchange::{Exchange, ExchangeKind, ExchangeReply, ImeQueryReply};
use crate::ime::{ImeChange, ImeCoalescer, ImeSurfaceState, DEFAULT_COALESCE_WINDOW};
use crate::state::{LaunchState, LaunchStateMachine};
use crate::{Engine, EngineHooks, HostShell, ImeHost, LaunchArgs};

/// Tuning knobs for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bound on every blocking exchange wait.
    pub exchange_timeout: Duration,
    /// IME coalescing window.
    pub ime_coalesce_window: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_secs(30),
            ime_coalesce_window: DEFAULT_COALESCE_WINDOW,
        }
    }
}

/// Coordination context shared by the UI thread and the engine context.
pub struct BridgeContext {
    config: BridgeConfig,
    launch: Arc<LaunchStateMachine>,
    dispatcher: EventDispatcher,
    barrier: SyncBarrier,
    file_pick: Arc<Exchange<Option<PathBuf>>>,
    clipboard: Arc<Exchange<Option<String>>>,
    ime_query: Arc<Exchange<ImeQueryReply>>,
    ime: ImeCoalescer,
    shell: Arc<dyn HostShell>,
    ime_host: Arc<dyn ImeHost>,
}

impl BridgeContext {
    pub fn new(
        config: BridgeConfig,
        shell: Arc<dyn HostShell>,
        ime_host: Arc<dyn ImeHost>,
    ) -> Arc<Self> {
        let launch = Arc::new(LaunchStateMachine::new());
        let ime = ImeCoalescer::new(
            config.ime_coalesce_window,
            Arc::clone(&shell),
            Arc::clone(&ime_host),
        );
        Arc::new(Self {
            dispatcher: EventDispatcher::new(Arc::clone(&launch)),
            barrier: SyncBarrier::new(),
            file_pick: Arc::new(Exchange::new()),
            clipboard: Arc::new(Exchange::new()),
            ime_query: Arc::new(Exchange::new()),
            ime,
            launch,
            shell,
            ime_host,
            config,
        })
    }

    /// Attach the engine collaborator. Must happen before
    /// [`request_launch`](Self::request_launch); later calls are ignored.
    pub fn attach_engine(&self, engine: Arc<dyn Engine>) {
        self.dispatcher.attach_engine(engine);
    }

    pub fn launch_state(&self) -> LaunchState {
        self.launch.read()
    }

    /// Start the engine. Rejected (state unchanged, engine untouched)
    /// unless the state is `Launching`, so a racing double-launch resolves
    /// to exactly one start.
    pub fn request_launch(&self, args: &LaunchArgs) -> Result<()> {
        let engine = self
            .dispatcher
            .engine()
            .ok_or(BridgeError::EngineNotAttached)?;
        if !self
            .launch
            .compare_and_set(LaunchState::Launching, LaunchState::Launched)
        {
            let state = self.launch.read();
            log::warn!("engine launch rejected in state {state:?}");
            return Err(BridgeError::LaunchRejected(state));
        }
        log::info!("starting engine (initial uri: {:?})", args.uri);
        engine.start(args)
    }

    /// Defer the launch until [`release_trigger`](Self::release_trigger)
    /// fires. Returns whether the gate was taken (only possible from
    /// `Launching`).
    pub fn hold_for_trigger(&self) -> bool {
        self.launch
            .compare_and_set(LaunchState::Launching, LaunchState::AwaitingManualTrigger)
    }

    /// Fire the manual trigger and launch.
    pub fn release_trigger(&self, args: &LaunchArgs) -> Result<()> {
        if !self
            .launch
            .compare_and_set(LaunchState::AwaitingManualTrigger, LaunchState::Launching)
        {
            let state = self.launch.read();
            return Err(BridgeError::LaunchRejected(state));
        }
        self.request_launch(args)
    }

    /// Deliver one engine-bound record (buffered until the engine is
    /// ready).
    pub fn deliver(&self, event: EngineEvent) {
        self.dispatcher.deliver(event);
    }

    /// Block until the engine has drained every record delivered so far.
    pub fn flush(&self) {
        self.barrier
            .wait_for_drain(|| self.dispatcher.deliver(EngineEvent::Sync));
    }

    /// Bounded [`flush`](Self::flush); `false` means the engine did not
    /// acknowledge within `timeout`.
    pub fn flush_timeout(&self, timeout: Duration) -> bool {
        self.barrier
            .wait_for_drain_timeout(timeout, || self.dispatcher.deliver(EngineEvent::Sync))
    }

    /// The IME coalescer (engine IME notifications land here).
    pub fn ime(&self) -> &ImeCoalescer {
        &self.ime
    }

    /// Record the IME surface configuration the engine reported and ask for
    /// the surface to be (re)applied after the coalescing window.
    pub fn notify_ime_enabled(&self, surface: ImeSurfaceState) {
        self.ime.set_surface(surface);
        self.ime.request_enable();
    }

    /// Forward a text/selection change to the input-method surface. Not
    /// coalesced; composition state must track the editor exactly.
    pub fn notify_ime_change(&self, change: ImeChange) {
        let host = Arc::clone(&self.ime_host);
        self.shell
            .post(Box::new(move || host.composition_changed(change)));
    }

    /// Show the file chooser on the UI thread and block until the user
    /// picks a file or cancels. `None` covers cancel and timeout alike.
    /// Callable from the engine thread.
    pub fn pick_file(&self, filters: &str) -> Option<PathBuf> {
        let outer = Arc::clone(&self.shell);
        let shell = Arc::clone(&self.shell);
        let slot = Arc::clone(&self.file_pick);
        let filters = filters.to_string();
        self.file_pick
            .request(self.config.exchange_timeout, move || {
                outer.post(Box::new(move || slot.fulfil(shell.choose_file(&filters))))
            })
            .flatten()
    }

    /// [`pick_file`](Self::pick_file) for callers that must keep servicing
    /// their own event loop while blocked; `step` is invoked between polls.
    pub fn pick_file_with(&self, filters: &str, step: impl FnMut()) -> Option<PathBuf> {
        let outer = Arc::clone(&self.shell);
        let shell = Arc::clone(&self.shell);
        let slot = Arc::clone(&self.file_pick);
        let filters = filters.to_string();
        self.file_pick
            .request_with(
                self.config.exchange_timeout,
                move || {
                    outer.post(Box::new(move || slot.fulfil(shell.choose_file(&filters))))
                },
                step,
            )
            .flatten()
    }

    /// Read the clipboard from the UI thread and block for the text.
    /// Callable from the engine thread.
    pub fn clipboard_text(&self) -> Option<String> {
        let outer = Arc::clone(&self.shell);
        let shell = Arc::clone(&self.shell);
        let slot = Arc::clone(&self.clipboard);
        self.clipboard
            .request(self.config.exchange_timeout, move || {
                outer.post(Box::new(move || slot.fulfil(shell.clipboard_text())))
            })
            .flatten()
    }

    /// Write the clipboard from the UI thread. Fire-and-forget; there is
    /// no reply to wait for.
    pub fn set_clipboard_text(&self, text: String) {
        let shell = Arc::clone(&self.shell);
        self.shell
            .post(Box::new(move || shell.set_clipboard_text(&text)));
    }

    /// Query the current composition text and selection from the UI
    /// thread. Times out to the empty reply. Callable from the engine
    /// thread.
    pub fn ime_query(&self) -> ImeQueryReply {
        let outer = Arc::clone(&self.shell);
        let shell = Arc::clone(&self.shell);
        let slot = Arc::clone(&self.ime_query);
        self.ime_query
            .request(self.config.exchange_timeout, move || {
                outer.post(Box::new(move || slot.fulfil(shell.ime_query())))
            })
            .unwrap_or_default()
    }
}

impl EngineHooks for BridgeContext {
    fn on_engine_ready(&self) {
        self.dispatcher.on_engine_ready();
    }

    fn on_engine_exit(&self, restart: bool) {
        log::info!("engine exited (restart: {restart})");
        self.launch.set(LaunchState::ShuttingDown);
        self.shell.request_exit(restart);
    }

    fn on_sync_acknowledge(&self) {
        self.barrier.acknowledge();
    }

    fn fulfil_exchange(&self, kind: ExchangeKind, reply: ExchangeReply) {
        match (kind, reply) {
            (ExchangeKind::FilePick, ExchangeReply::FilePick(path)) => {
                self.file_pick.fulfil(path);
            }
            (ExchangeKind::ClipboardText, ExchangeReply::ClipboardText(text)) => {
                self.clipboard.fulfil(text);
            }
            (ExchangeKind::ImeQuery, ExchangeReply::ImeQuery(reply)) => {
                self.ime_query.fulfil(reply);
            }
            (kind, reply) => {
                log::warn!("dropping mismatched exchange reply {reply:?} for {kind:?}");
            }
        }
    }
}

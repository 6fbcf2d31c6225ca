//! In-process engine backend.
//!
//! Runs a worker thread that drains an event channel and honours the host
//! callback contract: reports ready once it is up, acknowledges sync
//! markers, and reports exit when it processes `Shutdown`. The worker does
//! no content work of its own; an observer hook lets the shell (and the
//! integration tests) watch the records as the engine sees them.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use harbor_bridge::{BridgeError, Engine, EngineEvent, EngineHooks, LaunchArgs};

use crate::error::EngineError;

/// Called for every record the engine thread processes.
pub type EventObserver = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

struct Inner {
    sender: Option<Sender<EngineEvent>>,
    worker: Option<JoinHandle<()>>,
    started: bool,
}

/// Engine collaborator running on an in-process thread.
pub struct ChannelEngine {
    hooks: Arc<dyn EngineHooks>,
    observer: Option<EventObserver>,
    inner: Mutex<Inner>,
}

impl ChannelEngine {
    pub fn new(hooks: Arc<dyn EngineHooks>) -> Self {
        Self {
            hooks,
            observer: None,
            inner: Mutex::new(Inner {
                sender: None,
                worker: None,
                started: false,
            }),
        }
    }

    /// Like [`new`](Self::new), with an observer invoked for each record
    /// the engine thread processes, in processing order.
    pub fn with_observer(hooks: Arc<dyn EngineHooks>, observer: EventObserver) -> Self {
        Self {
            hooks,
            observer: Some(observer),
            inner: Mutex::new(Inner {
                sender: None,
                worker: None,
                started: false,
            }),
        }
    }
}

impl Engine for ChannelEngine {
    fn start(&self, args: &LaunchArgs) -> harbor_bridge::Result<()> {
        let (sender, receiver) = mpsc::channel();
        {
            let mut inner = self.inner.lock();
            if inner.started {
                return Err(EngineError::AlreadyStarted.into());
            }
            inner.started = true;
            inner.sender = Some(sender);
        }

        let hooks = Arc::clone(&self.hooks);
        let observer = self.observer.clone();
        let args = args.clone();
        let worker = thread::Builder::new()
            .name("harbor-engine".into())
            .spawn(move || run_engine(receiver, hooks, observer, args))
            .map_err(|err| EngineError::StartFailed(err.to_string()))?;

        self.inner.lock().worker = Some(worker);
        Ok(())
    }

    fn notify(&self, event: EngineEvent) -> harbor_bridge::Result<()> {
        let inner = self.inner.lock();
        match &inner.sender {
            Some(sender) => sender
                .send(event)
                .map_err(|_| BridgeError::from(EngineError::NotRunning)),
            None => Err(EngineError::NotRunning.into()),
        }
    }
}

impl Drop for ChannelEngine {
    fn drop(&mut self) {
        let (sender, worker) = {
            let mut inner = self.inner.lock();
            (inner.sender.take(), inner.worker.take())
        };
        // Disconnect the channel so the worker's recv loop ends.
        drop(sender);
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

fn run_engine(
    receiver: mpsc::Receiver<EngineEvent>,
    hooks: Arc<dyn EngineHooks>,
    observer: Option<EventObserver>,
    args: LaunchArgs,
) {
    log::info!("engine thread running (initial uri: {:?})", args.uri);
    hooks.on_engine_ready();

    while let Ok(event) = receiver.recv() {
        if let Some(observer) = &observer {
            observer(&event);
        }
        match event {
            EngineEvent::Sync => hooks.on_sync_acknowledge(),
            EngineEvent::Shutdown => {
                log::info!("engine processing shutdown");
                hooks.on_engine_exit(false);
                return;
            }
            other => log::debug!("engine processed {other:?}"),
        }
    }
    log::info!("engine channel closed; worker stopping");
}

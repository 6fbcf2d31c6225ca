//! harbor-shell: the host application shell.
//!
//! Responsibilities:
//! - Create the window and run the winit event loop (the UI context).
//! - Drain jobs other threads marshal onto the UI thread.
//! - Translate window lifecycle into engine-bound events through the
//!   bridge, and hand engine exit back to the event loop.
//! - Implement the privileged platform operations (file chooser,
//!   clipboard, IME surface) the bridge exchanges wrap.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use winit::event::{ElementState, Event, Ime, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use harbor_bridge::{
    BridgeConfig, BridgeContext, Engine, EngineEvent, EngineHooks, HostShell, ImeChange,
    ImeHost, ImeQueryReply, LaunchArgs, LaunchState, UiJob,
};
use harbor_config::HarborConfig;
use harbor_engine::ChannelEngine;

/// Requests other threads send the event loop.
#[derive(Debug, Clone, Copy)]
enum ShellRequest {
    /// Posted jobs are waiting; drain the queue.
    Wake,
    /// The engine exited; leave the loop (and relaunch when `restart`).
    Exit { restart: bool },
}

/// The UI-capable side handed to the bridge: marshals jobs onto the event
/// loop thread and performs the privileged platform operations there.
struct ShellHandle {
    proxy: Mutex<EventLoopProxy<ShellRequest>>,
    jobs: Mutex<VecDeque<UiJob>>,
    composition: Arc<Mutex<ImeQueryReply>>,
}

impl ShellHandle {
    fn wake(&self) {
        if self.proxy.lock().send_event(ShellRequest::Wake).is_err() {
            log::warn!("event loop is gone; dropping wake");
        }
    }

    /// Run everything queued so far. Called on the UI thread.
    fn drain_jobs(&self) {
        loop {
            let job = self.jobs.lock().pop_front();
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }
}

impl HostShell for ShellHandle {
    fn post(&self, job: UiJob) {
        self.jobs.lock().push_back(job);
        self.wake();
    }

    fn request_exit(&self, restart: bool) {
        if self
            .proxy
            .lock()
            .send_event(ShellRequest::Exit { restart })
            .is_err()
        {
            log::warn!("event loop is gone; exit request dropped");
        }
    }

    fn choose_file(&self, filters: &str) -> Option<std::path::PathBuf> {
        harbor_io::choose_file(filters)
    }

    fn clipboard_text(&self) -> Option<String> {
        harbor_io::text()
    }

    fn set_clipboard_text(&self, text: &str) {
        harbor_io::set_text(text);
    }

    fn ime_query(&self) -> ImeQueryReply {
        self.composition.lock().clone()
    }
}

/// The input-method surface backed by the winit window.
struct WindowIme {
    window: Arc<Window>,
    composition: Arc<Mutex<ImeQueryReply>>,
}

impl ImeHost for WindowIme {
    fn restart_input(&self) {
        log::debug!("restarting input method composition");
        *self.composition.lock() = ImeQueryReply::default();
        // Toggling IME support is the portable way to drop a composition.
        self.window.set_ime_allowed(false);
        self.window.set_ime_allowed(true);
    }

    fn set_ime_visible(&self, visible: bool) {
        log::debug!("input method surface visible: {visible}");
        self.window.set_ime_allowed(visible);
    }

    fn composition_changed(&self, change: ImeChange) {
        log::debug!("composition change: {change:?}");
        if let ImeChange::Text { text, .. } = change {
            let mut composition = self.composition.lock();
            composition.text = text;
            composition.selection_start = 0;
            composition.selection_length = 0;
        }
    }
}

fn build_engine(config: &HarborConfig, hooks: Arc<dyn EngineHooks>) -> Result<Arc<dyn Engine>> {
    #[cfg(feature = "native-engine")]
    if let Some(library) = &config.engine.library {
        let engine = harbor_engine::NativeEngine::load(Some(library), hooks)?;
        return Ok(Arc::new(engine));
    }
    #[cfg(not(feature = "native-engine"))]
    if config.engine.library.is_some() {
        log::warn!("engine.library is set but the native-engine feature is off; using the in-process engine");
    }
    Ok(Arc::new(ChannelEngine::new(hooks)))
}

/// Build the window, wire the bridge and the engine, and run the event
/// loop until the engine exits.
pub fn run() -> Result<()> {
    env_logger::init();
    let config = HarborConfig::load();

    let event_loop = EventLoopBuilder::<ShellRequest>::with_user_event().build()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Harbor")
            .build(&event_loop)?,
    );

    let composition = Arc::new(Mutex::new(ImeQueryReply::default()));
    let shell = Arc::new(ShellHandle {
        proxy: Mutex::new(event_loop.create_proxy()),
        jobs: Mutex::new(VecDeque::new()),
        composition: Arc::clone(&composition),
    });
    let ime_host = Arc::new(WindowIme {
        window: Arc::clone(&window),
        composition,
    });

    let bridge_config = BridgeConfig {
        exchange_timeout: Duration::from_millis(config.bridge.exchange_timeout_ms),
        ime_coalesce_window: Duration::from_millis(config.bridge.ime_coalesce_ms),
    };
    let context = BridgeContext::new(
        bridge_config,
        Arc::clone(&shell) as Arc<dyn HostShell>,
        ime_host as Arc<dyn ImeHost>,
    );
    let engine = build_engine(&config, Arc::clone(&context) as Arc<dyn EngineHooks>)?;
    context.attach_engine(engine);

    let launch_args = LaunchArgs {
        uri: config.launch.initial_uri.clone(),
        args: config.launch.args.clone(),
    };

    let restart_on_exit = Arc::new(AtomicBool::new(false));
    let restart_flag = Arc::clone(&restart_on_exit);
    let mut launched = false;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::Resumed => {
                if !launched {
                    launched = true;
                    if config.launch.wait_for_trigger && context.hold_for_trigger() {
                        log::info!("engine launch held; press Enter to launch");
                    } else if let Err(err) = context.request_launch(&launch_args) {
                        log::warn!("engine launch failed: {err}");
                    }
                    context.deliver(EngineEvent::Started);
                } else {
                    context.deliver(EngineEvent::Resumed);
                }
            }
            Event::Suspended => context.deliver(EngineEvent::Paused),
            Event::UserEvent(ShellRequest::Wake) => shell.drain_jobs(),
            Event::UserEvent(ShellRequest::Exit { restart }) => {
                restart_flag.store(restart, Ordering::SeqCst);
                elwt.exit();
            }
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => match context.launch_state() {
                    // The engine processes the shutdown record and reports
                    // exit, which is what actually ends the loop.
                    LaunchState::Launched | LaunchState::Ready => {
                        context.deliver(EngineEvent::Shutdown)
                    }
                    _ => elwt.exit(),
                },
                WindowEvent::RedrawRequested => context.deliver(EngineEvent::Redraw(None)),
                WindowEvent::Resized(_) => context.deliver(EngineEvent::Redraw(None)),
                WindowEvent::Occluded(occluded) => context.deliver(if occluded {
                    EngineEvent::Stopped
                } else {
                    EngineEvent::Started
                }),
                WindowEvent::Focused(focused) => {
                    if focused {
                        // Re-apply the input method for the focused state.
                        context.ime().request_enable();
                    }
                }
                WindowEvent::Ime(ime) => {
                    let mut composition = shell.composition.lock();
                    match ime {
                        Ime::Preedit(text, caret) => {
                            let (start, end) = caret.unwrap_or((text.len(), text.len()));
                            *composition = ImeQueryReply {
                                text,
                                selection_start: start,
                                selection_length: end.saturating_sub(start),
                            };
                        }
                        Ime::Commit(_) | Ime::Disabled => *composition = ImeQueryReply::default(),
                        Ime::Enabled => {}
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed
                        && event.logical_key == Key::Named(NamedKey::Enter)
                        && context.launch_state() == LaunchState::AwaitingManualTrigger
                    {
                        log::info!("manual launch trigger fired");
                        if let Err(err) = context.release_trigger(&launch_args) {
                            log::warn!("manual launch failed: {err}");
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    })?;

    if restart_on_exit.load(Ordering::SeqCst) {
        relaunch()?;
    }
    Ok(())
}

/// Start a fresh copy of this process image. Used when the engine exits
/// with the restart flag set.
fn relaunch() -> Result<()> {
    let exe = std::env::current_exe()?;
    log::info!("relaunching {}", exe.display());
    std::process::Command::new(exe)
        .args(std::env::args().skip(1))
        .spawn()?;
    Ok(())
}

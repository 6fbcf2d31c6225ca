//! End-to-end coordination tests: a real engine worker thread attached to
//! a bridge context, with a simulated UI thread draining posted jobs.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use harbor_bridge::{
    BridgeConfig, BridgeContext, EngineEvent, EngineHooks, ExchangeKind, ExchangeReply, HostShell,
    ImeChange, ImeHost, ImeQueryReply, LaunchArgs, LaunchState, UiJob,
};
use harbor_engine::ChannelEngine;

/// Simulated UI context: a dedicated thread draining posted jobs, plus
/// canned results for the privileged operations.
struct TestShell {
    jobs: Sender<UiJob>,
    file: Option<PathBuf>,
    clipboard: Mutex<Option<String>>,
    exits: Mutex<Vec<bool>>,
}

impl TestShell {
    fn spawn(file: Option<PathBuf>) -> Arc<Self> {
        let (jobs, receiver) = mpsc::channel::<UiJob>();
        thread::spawn(move || {
            for job in receiver {
                job();
            }
        });
        Arc::new(Self {
            jobs,
            file,
            clipboard: Mutex::new(Some("clipboard contents".into())),
            exits: Mutex::new(Vec::new()),
        })
    }
}

impl HostShell for TestShell {
    fn post(&self, job: UiJob) {
        let _ = self.jobs.send(job);
    }

    fn request_exit(&self, restart: bool) {
        self.exits.lock().push(restart);
    }

    fn choose_file(&self, _filters: &str) -> Option<PathBuf> {
        self.file.clone()
    }

    fn clipboard_text(&self) -> Option<String> {
        self.clipboard.lock().clone()
    }

    fn set_clipboard_text(&self, text: &str) {
        *self.clipboard.lock() = Some(text.to_string());
    }

    fn ime_query(&self) -> ImeQueryReply {
        ImeQueryReply {
            text: "composition".into(),
            selection_start: 2,
            selection_length: 3,
        }
    }
}

struct NullImeHost;

impl ImeHost for NullImeHost {
    fn restart_input(&self) {}
    fn set_ime_visible(&self, _visible: bool) {}
    fn composition_changed(&self, _change: ImeChange) {}
}

#[derive(Default)]
struct CountingImeHost {
    shows: Mutex<usize>,
    changes: Mutex<Vec<ImeChange>>,
}

impl ImeHost for CountingImeHost {
    fn restart_input(&self) {}

    fn set_ime_visible(&self, visible: bool) {
        if visible {
            *self.shows.lock() += 1;
        }
    }

    fn composition_changed(&self, change: ImeChange) {
        self.changes.lock().push(change);
    }
}

struct Fixture {
    context: Arc<BridgeContext>,
    shell: Arc<TestShell>,
    seen: Arc<Mutex<Vec<EngineEvent>>>,
}

fn fixture(config: BridgeConfig) -> Fixture {
    let shell = TestShell::spawn(Some(PathBuf::from("/tmp/upload.png")));
    let context = BridgeContext::new(
        config,
        Arc::clone(&shell) as Arc<dyn HostShell>,
        Arc::new(NullImeHost) as Arc<dyn ImeHost>,
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let seen = Arc::clone(&seen);
        Arc::new(move |event: &EngineEvent| seen.lock().push(event.clone()))
    };
    let engine = ChannelEngine::with_observer(
        Arc::clone(&context) as Arc<dyn EngineHooks>,
        observer,
    );
    context.attach_engine(Arc::new(engine));

    Fixture {
        context,
        shell,
        seen,
    }
}

fn wait_for_state(context: &BridgeContext, state: LaunchState) {
    for _ in 0..200 {
        if context.launch_state() == state {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("never reached {state:?}; stuck in {:?}", context.launch_state());
}

#[test]
fn test_pre_launch_events_arrive_in_order_before_later_ones() {
    let fx = fixture(BridgeConfig::default());

    fx.context.deliver(EngineEvent::Started);
    fx.context
        .deliver(EngineEvent::LoadUri("https://example.com".into()));
    fx.context.deliver(EngineEvent::Redraw(None));
    assert!(fx.seen.lock().is_empty());

    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    fx.context.deliver(EngineEvent::Paused);
    assert!(fx.context.flush_timeout(Duration::from_secs(5)));

    let seen: Vec<EngineEvent> = fx
        .seen
        .lock()
        .iter()
        .filter(|event| !event.is_sync_marker())
        .cloned()
        .collect();
    assert_eq!(
        seen,
        vec![
            EngineEvent::Started,
            EngineEvent::LoadUri("https://example.com".into()),
            EngineEvent::Redraw(None),
            EngineEvent::Paused,
        ]
    );
}

#[test]
fn test_second_launch_request_is_rejected() {
    let fx = fixture(BridgeConfig::default());

    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    let err = fx.context.request_launch(&LaunchArgs::default());
    assert!(err.is_err());

    wait_for_state(&fx.context, LaunchState::Ready);
    // Still exactly one engine running; the reject left state alone.
    assert_eq!(fx.context.launch_state(), LaunchState::Ready);
}

#[test]
fn test_manual_trigger_gates_the_launch() {
    let fx = fixture(BridgeConfig::default());

    assert!(fx.context.hold_for_trigger());
    assert_eq!(
        fx.context.launch_state(),
        LaunchState::AwaitingManualTrigger
    );
    assert!(fx.context.request_launch(&LaunchArgs::default()).is_err());

    fx.context.release_trigger(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    // The gate only opens once.
    assert!(!fx.context.hold_for_trigger());
}

#[test]
fn test_flush_blocks_until_engine_acknowledges() {
    let fx = fixture(BridgeConfig::default());
    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    for n in 0..20 {
        fx.context.deliver(EngineEvent::LoadUri(format!("page-{n}")));
    }
    assert!(fx.context.flush_timeout(Duration::from_secs(5)));

    // Everything delivered before the flush has been seen by the engine.
    let seen = fx.seen.lock();
    assert_eq!(
        seen.iter().filter(|e| !e.is_sync_marker()).count(),
        20
    );
}

#[test]
fn test_spurious_acknowledge_is_harmless() {
    let fx = fixture(BridgeConfig::default());
    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    // Acks with no barrier outstanding are no-ops and must not leave a
    // stale token for the next flush.
    let hooks: &dyn EngineHooks = fx.context.as_ref();
    hooks.on_sync_acknowledge();
    hooks.on_sync_acknowledge();

    assert!(fx.context.flush_timeout(Duration::from_secs(5)));
}

#[test]
fn test_file_pick_round_trip_from_engine_thread() {
    let fx = fixture(BridgeConfig::default());
    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    let context = Arc::clone(&fx.context);
    let picked = thread::spawn(move || context.pick_file("jpg, png"))
        .join()
        .unwrap();
    assert_eq!(picked, Some(PathBuf::from("/tmp/upload.png")));
}

#[test]
fn test_unfulfilled_exchange_times_out_to_sentinel() {
    // A shell that never runs its jobs: the responder side is wedged.
    struct DeafShell;
    impl HostShell for DeafShell {
        fn post(&self, _job: UiJob) {}
        fn request_exit(&self, _restart: bool) {}
        fn choose_file(&self, _filters: &str) -> Option<PathBuf> {
            None
        }
        fn clipboard_text(&self) -> Option<String> {
            None
        }
        fn set_clipboard_text(&self, _text: &str) {}
        fn ime_query(&self) -> ImeQueryReply {
            ImeQueryReply::default()
        }
    }

    let config = BridgeConfig {
        exchange_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let context = BridgeContext::new(
        config,
        Arc::new(DeafShell) as Arc<dyn HostShell>,
        Arc::new(NullImeHost) as Arc<dyn ImeHost>,
    );

    assert_eq!(context.pick_file("jpg"), None);
    assert_eq!(context.clipboard_text(), None);
    assert_eq!(context.ime_query(), ImeQueryReply::default());
}

#[test]
fn test_clipboard_round_trip_and_write() {
    let fx = fixture(BridgeConfig::default());
    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    assert_eq!(
        fx.context.clipboard_text(),
        Some("clipboard contents".into())
    );

    fx.context.set_clipboard_text("from the engine".into());
    // The write is fire-and-forget; give the UI thread a moment.
    for _ in 0..100 {
        if fx.shell.clipboard.lock().as_deref() == Some("from the engine") {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("clipboard write never landed");
}

#[test]
fn test_ime_query_round_trip() {
    let fx = fixture(BridgeConfig::default());
    let reply = fx.context.ime_query();
    assert_eq!(reply.text, "composition");
    assert_eq!(reply.selection_start, 2);
    assert_eq!(reply.selection_length, 3);
}

#[test]
fn test_exchange_fulfilment_through_engine_hooks() {
    // A shell that never runs its jobs: the only way the request can
    // resolve is the engine-side fulfilment path.
    struct DeafShell;
    impl HostShell for DeafShell {
        fn post(&self, _job: UiJob) {}
        fn request_exit(&self, _restart: bool) {}
        fn choose_file(&self, _filters: &str) -> Option<PathBuf> {
            None
        }
        fn clipboard_text(&self) -> Option<String> {
            None
        }
        fn set_clipboard_text(&self, _text: &str) {}
        fn ime_query(&self) -> ImeQueryReply {
            ImeQueryReply::default()
        }
    }

    let config = BridgeConfig {
        exchange_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let context = BridgeContext::new(
        config,
        Arc::new(DeafShell) as Arc<dyn HostShell>,
        Arc::new(NullImeHost) as Arc<dyn ImeHost>,
    );

    let responder = Arc::clone(&context);
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let hooks: &dyn EngineHooks = responder.as_ref();
        // A mismatched reply is dropped and must not satisfy the request.
        hooks.fulfil_exchange(
            ExchangeKind::FilePick,
            ExchangeReply::ClipboardText(Some("wrong slot".into())),
        );
        hooks.fulfil_exchange(
            ExchangeKind::FilePick,
            ExchangeReply::FilePick(Some(PathBuf::from("/tmp/from-engine.txt"))),
        );
    });

    assert_eq!(
        context.pick_file("txt"),
        Some(PathBuf::from("/tmp/from-engine.txt"))
    );
}

#[test]
fn test_cooperative_pick_keeps_stepping_while_blocked() {
    struct DeafShell;
    impl HostShell for DeafShell {
        fn post(&self, _job: UiJob) {}
        fn request_exit(&self, _restart: bool) {}
        fn choose_file(&self, _filters: &str) -> Option<PathBuf> {
            None
        }
        fn clipboard_text(&self) -> Option<String> {
            None
        }
        fn set_clipboard_text(&self, _text: &str) {}
        fn ime_query(&self) -> ImeQueryReply {
            ImeQueryReply::default()
        }
    }

    let config = BridgeConfig {
        exchange_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let context = BridgeContext::new(
        config,
        Arc::new(DeafShell) as Arc<dyn HostShell>,
        Arc::new(NullImeHost) as Arc<dyn ImeHost>,
    );

    let responder = Arc::clone(&context);
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let hooks: &dyn EngineHooks = responder.as_ref();
        hooks.fulfil_exchange(
            ExchangeKind::FilePick,
            ExchangeReply::FilePick(Some(PathBuf::from("/tmp/stepped.txt"))),
        );
    });

    // The step closure stands in for the caller's own event pump; it must
    // keep running while the request is blocked.
    let steps = std::sync::atomic::AtomicUsize::new(0);
    let picked = context.pick_file_with("txt", || {
        steps.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    assert_eq!(picked, Some(PathBuf::from("/tmp/stepped.txt")));
    assert!(steps.load(std::sync::atomic::Ordering::SeqCst) > 0);
}

#[test]
fn test_ime_notifications_coalesce_to_one_application() {
    let shell = TestShell::spawn(None);
    let ime_host = Arc::new(CountingImeHost::default());
    let config = BridgeConfig {
        ime_coalesce_window: Duration::from_millis(20),
        ..Default::default()
    };
    let context = BridgeContext::new(
        config,
        Arc::clone(&shell) as Arc<dyn HostShell>,
        Arc::clone(&ime_host) as Arc<dyn ImeHost>,
    );

    // A focus-move volley from the engine: several enable reports inside
    // one coalescing window.
    for _ in 0..3 {
        context.notify_ime_enabled(harbor_bridge::ImeSurfaceState {
            state: harbor_bridge::ImeState::Enabled,
            ..Default::default()
        });
    }
    context.notify_ime_change(ImeChange::Selection { start: 1, end: 4 });

    thread::sleep(Duration::from_millis(150));
    assert_eq!(*ime_host.shows.lock(), 1);
    assert_eq!(
        ime_host.changes.lock().as_slice(),
        [ImeChange::Selection { start: 1, end: 4 }]
    );
}

#[test]
fn test_platform_notifications_flow_like_any_record() {
    let fx = fixture(BridgeConfig::default());

    // Buffered while launching, drained on ready, in order.
    fx.context.deliver(EngineEvent::NetworkChanged(false));
    fx.context.deliver(EngineEvent::MemoryPressure);
    fx.context.deliver(EngineEvent::NetworkChanged(true));

    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);
    assert!(fx.context.flush_timeout(Duration::from_secs(5)));

    let seen: Vec<EngineEvent> = fx
        .seen
        .lock()
        .iter()
        .filter(|event| !event.is_sync_marker())
        .cloned()
        .collect();
    assert_eq!(
        seen,
        vec![
            EngineEvent::NetworkChanged(false),
            EngineEvent::MemoryPressure,
            EngineEvent::NetworkChanged(true),
        ]
    );
}

#[test]
fn test_shutdown_event_reaches_exit_handler() {
    let fx = fixture(BridgeConfig::default());
    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    fx.context.deliver(EngineEvent::Shutdown);
    wait_for_state(&fx.context, LaunchState::ShuttingDown);

    for _ in 0..100 {
        if fx.shell.exits.lock().as_slice() == [false] {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("engine exit never reached the shell");
}

#[test]
fn test_exit_with_restart_reaches_relaunch_path() {
    let fx = fixture(BridgeConfig::default());
    fx.context.request_launch(&LaunchArgs::default()).unwrap();
    wait_for_state(&fx.context, LaunchState::Ready);

    let hooks: &dyn EngineHooks = fx.context.as_ref();
    hooks.on_engine_exit(true);

    assert_eq!(fx.context.launch_state(), LaunchState::ShuttingDown);
    assert_eq!(fx.shell.exits.lock().as_slice(), [true]);
}

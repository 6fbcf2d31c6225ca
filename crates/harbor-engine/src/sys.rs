//! FFI bindings to the native engine library.
//!
//! The engine is expected to be provided as a dynamic library (for example
//! `libharbor_engine.so` on Linux) exposing a small `extern "C"` API: a
//! one-time start taking a callback table, an asynchronous event inbox,
//! and a shutdown hook. The engine owns its own threads; every callback
//! may arrive on any of them.

use std::ffi::{c_char, c_int, c_uint, c_void};
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::error::{EngineError, Result};

pub const EVENT_STARTED: c_int = 0;
pub const EVENT_PAUSED: c_int = 1;
pub const EVENT_RESUMED: c_int = 2;
pub const EVENT_STOPPED: c_int = 3;
pub const EVENT_SHUTDOWN: c_int = 4;
pub const EVENT_LOAD_URI: c_int = 5;
pub const EVENT_REDRAW: c_int = 6;
pub const EVENT_NETWORK_CHANGED: c_int = 7;
pub const EVENT_MEMORY_PRESSURE: c_int = 8;
pub const EVENT_SYNC: c_int = 9;

pub const EXCHANGE_FILE_PICK: c_int = 0;
pub const EXCHANGE_CLIPBOARD_TEXT: c_int = 1;

#[repr(C)]
pub struct HarborEngineEvent {
    pub kind: c_int,
    /// URI for `EVENT_LOAD_URI`; null otherwise.
    pub uri: *const c_char,
    /// Non-zero when the redraw region fields are meaningful.
    pub has_region: c_int,
    pub x: c_int,
    pub y: c_int,
    pub width: c_int,
    pub height: c_int,
    /// Link-up flag for `EVENT_NETWORK_CHANGED`.
    pub flag: c_int,
}

/// Callback table handed to the engine at start. `user_data` is passed
/// back verbatim on every call.
#[repr(C)]
pub struct HarborEngineCallbacks {
    pub user_data: *mut c_void,
    pub on_ready: unsafe extern "C" fn(*mut c_void),
    pub on_exit: unsafe extern "C" fn(*mut c_void, c_int),
    pub on_sync_ack: unsafe extern "C" fn(*mut c_void),
    /// Text-valued exchange fulfilment (`EXCHANGE_*` kinds); null means
    /// "no result".
    pub fulfil_text: unsafe extern "C" fn(*mut c_void, c_int, *const c_char),
    /// IME query fulfilment: composition text plus selection.
    pub fulfil_ime: unsafe extern "C" fn(*mut c_void, *const c_char, c_uint, c_uint),
}

type HarborEngineStartFn =
    unsafe extern "C" fn(*const HarborEngineCallbacks, *const c_char, *const c_char) -> c_int;
type HarborEngineNotifyFn = unsafe extern "C" fn(*const HarborEngineEvent);
type HarborEngineShutdownFn = unsafe extern "C" fn();

/// Dynamically loaded engine library.
pub(crate) struct EngineLibrary {
    #[allow(dead_code)]
    lib: Library,
    pub harbor_engine_start: HarborEngineStartFn,
    pub harbor_engine_notify: HarborEngineNotifyFn,
    pub harbor_engine_shutdown: HarborEngineShutdownFn,
}

impl EngineLibrary {
    /// Load the engine from `path`, or from the platform library name on
    /// the system search path when `path` is `None`.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let lib_path = match path {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => path.join(Self::library_name()),
            None => PathBuf::from(Self::library_name()),
        };
        log::info!("loading engine library from {}", lib_path.display());

        let lib = unsafe { Library::new(&lib_path) }
            .map_err(|e| EngineError::LibraryLoad(format!("{}: {}", lib_path.display(), e)))?;

        let (harbor_engine_start, harbor_engine_notify, harbor_engine_shutdown) = unsafe {
            let harbor_engine_start: Symbol<HarborEngineStartFn> = lib
                .get(b"harbor_engine_start")
                .map_err(|e| EngineError::SymbolNotFound(format!("harbor_engine_start: {e}")))?;
            let harbor_engine_notify: Symbol<HarborEngineNotifyFn> = lib
                .get(b"harbor_engine_notify")
                .map_err(|e| EngineError::SymbolNotFound(format!("harbor_engine_notify: {e}")))?;
            let harbor_engine_shutdown: Symbol<HarborEngineShutdownFn> =
                lib.get(b"harbor_engine_shutdown").map_err(|e| {
                    EngineError::SymbolNotFound(format!("harbor_engine_shutdown: {e}"))
                })?;

            (
                *harbor_engine_start,
                *harbor_engine_notify,
                *harbor_engine_shutdown,
            )
        };

        Ok(Self {
            lib,
            harbor_engine_start,
            harbor_engine_notify,
            harbor_engine_shutdown,
        })
    }

    #[cfg(target_os = "windows")]
    fn library_name() -> String {
        "harbor_engine.dll".to_string()
    }

    #[cfg(target_os = "macos")]
    fn library_name() -> String {
        "libharbor_engine.dylib".to_string()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn library_name() -> String {
        "libharbor_engine.so".to_string()
    }
}

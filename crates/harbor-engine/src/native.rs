//! Engine collaborator backed by the dynamically loaded native library.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use harbor_bridge::{
    Engine, EngineEvent, EngineHooks, ExchangeKind, ExchangeReply, ImeQueryReply, LaunchArgs,
};

use crate::error::{EngineError, Result};
use crate::sys::{self, EngineLibrary, HarborEngineCallbacks, HarborEngineEvent};

/// State handed to the engine as `user_data`. Boxed for a stable address
/// and kept alive for the backend's whole lifetime; callbacks may arrive
/// on any engine thread until shutdown returns.
struct CallbackState {
    hooks: Arc<dyn EngineHooks>,
}

unsafe extern "C" fn on_ready(user_data: *mut c_void) {
    let state = unsafe { &*(user_data as *const CallbackState) };
    state.hooks.on_engine_ready();
}

unsafe extern "C" fn on_exit(user_data: *mut c_void, restart: c_int) {
    let state = unsafe { &*(user_data as *const CallbackState) };
    state.hooks.on_engine_exit(restart != 0);
}

unsafe extern "C" fn on_sync_ack(user_data: *mut c_void) {
    let state = unsafe { &*(user_data as *const CallbackState) };
    state.hooks.on_sync_acknowledge();
}

unsafe extern "C" fn fulfil_text(user_data: *mut c_void, kind: c_int, text: *const c_char) {
    let state = unsafe { &*(user_data as *const CallbackState) };
    let value = if text.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
    };
    match kind {
        sys::EXCHANGE_FILE_PICK => state.hooks.fulfil_exchange(
            ExchangeKind::FilePick,
            ExchangeReply::FilePick(value.map(PathBuf::from)),
        ),
        sys::EXCHANGE_CLIPBOARD_TEXT => state
            .hooks
            .fulfil_exchange(ExchangeKind::ClipboardText, ExchangeReply::ClipboardText(value)),
        other => log::warn!("engine fulfilled unknown exchange kind {other}"),
    }
}

unsafe extern "C" fn fulfil_ime(
    user_data: *mut c_void,
    text: *const c_char,
    selection_start: c_uint,
    selection_length: c_uint,
) {
    let state = unsafe { &*(user_data as *const CallbackState) };
    let text = if text.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    };
    state.hooks.fulfil_exchange(
        ExchangeKind::ImeQuery,
        ExchangeReply::ImeQuery(ImeQueryReply {
            text,
            selection_start: selection_start as usize,
            selection_length: selection_length as usize,
        }),
    );
}

/// Engine collaborator loaded from a shared library.
pub struct NativeEngine {
    library: EngineLibrary,
    callbacks: Box<CallbackState>,
    started: Mutex<bool>,
}

unsafe impl Send for NativeEngine {}
unsafe impl Sync for NativeEngine {}

impl NativeEngine {
    /// Load the engine library. `path` may name the library file itself or
    /// a directory containing it; `None` searches the system path.
    pub fn load(path: Option<&Path>, hooks: Arc<dyn EngineHooks>) -> Result<Self> {
        let library = EngineLibrary::load(path)?;
        Ok(Self {
            library,
            callbacks: Box::new(CallbackState { hooks }),
            started: Mutex::new(false),
        })
    }

    fn callback_table(&self) -> HarborEngineCallbacks {
        HarborEngineCallbacks {
            user_data: &*self.callbacks as *const CallbackState as *mut c_void,
            on_ready,
            on_exit,
            on_sync_ack,
            fulfil_text,
            fulfil_ime,
        }
    }
}

impl Engine for NativeEngine {
    fn start(&self, args: &LaunchArgs) -> harbor_bridge::Result<()> {
        {
            let mut started = self.started.lock();
            if *started {
                return Err(EngineError::AlreadyStarted.into());
            }
            *started = true;
        }

        let uri = args
            .uri
            .as_deref()
            .map(CString::new)
            .transpose()
            .map_err(|e| EngineError::StartFailed(e.to_string()))?;
        let joined = args.args.join(" ");
        let extra = CString::new(joined).map_err(|e| EngineError::StartFailed(e.to_string()))?;

        let table = self.callback_table();
        let result = unsafe {
            (self.library.harbor_engine_start)(
                &table,
                uri.as_ref().map(|c| c.as_ptr()).unwrap_or(ptr::null()),
                extra.as_ptr(),
            )
        };
        if result == 0 {
            return Err(EngineError::StartFailed("harbor_engine_start returned failure".into()).into());
        }
        Ok(())
    }

    fn notify(&self, event: EngineEvent) -> harbor_bridge::Result<()> {
        // Owned C string must outlive the call.
        let mut uri_storage: Option<CString> = None;

        let mut ffi = HarborEngineEvent {
            kind: 0,
            uri: ptr::null(),
            has_region: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            flag: 0,
        };

        match &event {
            EngineEvent::Started => ffi.kind = sys::EVENT_STARTED,
            EngineEvent::Paused => ffi.kind = sys::EVENT_PAUSED,
            EngineEvent::Resumed => ffi.kind = sys::EVENT_RESUMED,
            EngineEvent::Stopped => ffi.kind = sys::EVENT_STOPPED,
            EngineEvent::Shutdown => ffi.kind = sys::EVENT_SHUTDOWN,
            EngineEvent::LoadUri(uri) => {
                ffi.kind = sys::EVENT_LOAD_URI;
                let c = CString::new(uri.as_str())
                    .map_err(|e| harbor_bridge::BridgeError::Engine(e.to_string()))?;
                ffi.uri = c.as_ptr();
                uri_storage = Some(c);
            }
            EngineEvent::Redraw(region) => {
                ffi.kind = sys::EVENT_REDRAW;
                if let Some(region) = region {
                    ffi.has_region = 1;
                    ffi.x = region.x;
                    ffi.y = region.y;
                    ffi.width = region.width;
                    ffi.height = region.height;
                }
            }
            EngineEvent::NetworkChanged(up) => {
                ffi.kind = sys::EVENT_NETWORK_CHANGED;
                ffi.flag = *up as c_int;
            }
            EngineEvent::MemoryPressure => ffi.kind = sys::EVENT_MEMORY_PRESSURE,
            EngineEvent::Sync => ffi.kind = sys::EVENT_SYNC,
        }

        unsafe {
            (self.library.harbor_engine_notify)(&ffi);
        }
        drop(uri_storage);
        Ok(())
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        if *self.started.lock() {
            unsafe {
                (self.library.harbor_engine_shutdown)();
            }
        }
    }
}

//! Engine collaborator backends for the Harbor host shell.
//!
//! The bridge talks to the engine through `harbor_bridge::Engine` and the
//! engine talks back through `harbor_bridge::EngineHooks`. This crate
//! provides the backends:
//!
//! - [`ChannelEngine`]: an in-process worker thread draining an event
//!   channel. The default backend, also used by the integration tests.
//! - `NativeEngine` (feature `native-engine`): the engine loaded from a
//!   dynamic library at runtime, with `extern "C"` callback trampolines.

mod channel;
mod error;

#[cfg(feature = "native-engine")]
mod native;
#[cfg(feature = "native-engine")]
mod sys;

pub use channel::{ChannelEngine, EventObserver};
pub use error::{EngineError, Result};

#[cfg(feature = "native-engine")]
pub use native::NativeEngine;

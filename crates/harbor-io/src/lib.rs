//! UI-privileged platform operations invoked on behalf of the engine
//! thread: file chooser and clipboard access. These are plain wrappers;
//! all coordination lives in harbor-bridge.

pub mod clipboard;
pub mod dialog;

pub use clipboard::{set_text, text};
pub use dialog::choose_file;

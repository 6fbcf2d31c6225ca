//! Platform clipboard access.

/// Read the clipboard. Empty and unreadable clipboards both come back as
/// `None`. Must run on the UI thread; some platforms reject clipboard
/// access from anywhere else.
pub fn text() -> Option<String> {
    let mut clipboard = match arboard::Clipboard::new() {
        Ok(clipboard) => clipboard,
        Err(err) => {
            log::warn!("clipboard unavailable: {err}");
            return None;
        }
    };
    match clipboard.get_text() {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(err) => {
            log::debug!("clipboard read failed: {err}");
            None
        }
    }
}

/// Write the clipboard. Failures are logged and swallowed; there is
/// nothing useful a caller can do about them. Must run on the UI thread.
pub fn set_text(text: &str) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(err) = clipboard.set_text(text.to_string()) {
                log::warn!("clipboard write failed: {err}");
            }
        }
        Err(err) => log::warn!("clipboard unavailable: {err}"),
    }
}

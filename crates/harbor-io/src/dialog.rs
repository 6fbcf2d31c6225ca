//! Platform file chooser.

use std::path::PathBuf;

/// Show the file chooser, filtered to the given extension list. `filters`
/// is the loose "jpg, .png" form produced by content file inputs; an empty
/// or unparseable list means any file. Returns `None` when the user
/// cancels. Must run on the UI thread.
pub fn choose_file(filters: &str) -> Option<PathBuf> {
    let extensions = parse_filters(filters);
    let mut dialog = rfd::FileDialog::new();
    if !extensions.is_empty() {
        dialog = dialog.add_filter("Accepted files", &extensions);
    }
    let picked = dialog.pick_file();
    log::debug!("file chooser returned {picked:?} for filters '{filters}'");
    picked
}

/// Split a content-supplied filter string into bare extensions.
fn parse_filters(filters: &str) -> Vec<String> {
    filters
        .split([',', ' ', '.'])
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

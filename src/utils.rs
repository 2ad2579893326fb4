//! Small filesystem and JSON helpers

use std::path::{Path, PathBuf};

/// First path that does not exist yet, appending `-<n>` before the
/// extension: `chart.json`, `chart-1.json`, `chart-2.json`, …
pub fn nonexistent_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let mut n = 1;
    loop {
        let candidate = parent.join(format!("{stem}-{n}{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

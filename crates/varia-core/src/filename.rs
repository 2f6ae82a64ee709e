//! Filename sanitization applied to every artifact entering the engine.

use crate::constants::MAX_FILENAME_LEN;

/// Reduce an uploaded filename to a safe base name.
///
/// Directory components are dropped and any character outside
/// `[A-Za-z0-9._-]` becomes `_`. Names that are empty or shorter than three
/// characters after cleaning fall back to `"file"`.
pub fn sanitize_filename(filename: &str) -> String {
    let path = std::path::Path::new(filename);
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    if base.contains("..") {
        return "invalid_filename".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim().is_empty() || s.len() < 3 {
        "file".to_string()
    } else {
        s
    }
}

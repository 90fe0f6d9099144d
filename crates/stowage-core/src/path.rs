//! Logical path normalization.
//!
//! Every path is normalized before it is used as a cache key, a backend
//! argument, or stored on a node. Normalization is centralized here so all
//! backends stay consistent.

/// Normalize a logical path: backslashes become forward slashes and any run
/// of consecutive slashes collapses to one. Returns `None` for empty input.
///
/// Idempotent: `normalize_path(&normalize_path(p)?) == normalize_path(p)`.
pub fn normalize_path(path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }

    let mut normalized = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for ch in path.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        normalized.push(ch);
    }

    Some(normalized)
}

/// Normalize a path for use as a logical storage key: normalized and with
/// leading/trailing slashes trimmed, so keys never carry a root prefix.
/// Returns `None` when nothing remains.
pub fn normalize_key(path: &str) -> Option<String> {
    let normalized = normalize_path(path)?;
    let trimmed = normalized.trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parent directory of a logical path. A bare filename has an empty parent.
pub fn parent_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Join a directory path and a segment, tolerating empty directories and
/// stray separators on either side.
pub fn join_path(dir: &str, segment: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    if dir.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", dir, segment)
    }
}

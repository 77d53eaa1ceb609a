//! Path manipulation helpers

/// Appends a single trailing slash unless one is already present.
pub fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Splits an absolute path into `("/directory/", "filename")`.
///
/// A trailing slash on the input is ignored, so `"/a/b"` and `"/a/b/"` both
/// split into `("/a/", "b")`. The root path has no file part.
pub fn split_path(path: &str) -> (String, String) {
    let trimmed = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    match trimmed.rfind('/') {
        Some(at) => (trimmed[..=at].to_string(), trimmed[at + 1..].to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

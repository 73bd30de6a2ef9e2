//! Dotted path helpers.
//!
//! Reference tokens address nodes with `.`-joined property names, e.g.
//! `a.b.0.c`. The single segment `^` stands for the base node itself.

/// Segment that denotes "the base node itself".
pub const ROOT_SEGMENT: &str = "^";

/// Returns true when `s` is empty or whitespace only.
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Joins the non-blank segments with `.`, or returns `^` when none remain.
///
/// ```
/// use json_graph_util::join_path;
///
/// assert_eq!(join_path(&["a", "", "b"]), "a.b");
/// assert_eq!(join_path::<&str>(&[]), "^");
/// ```
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !is_blank(s))
        .collect();
    if parts.is_empty() {
        return ROOT_SEGMENT.to_string();
    }
    parts.join(".")
}

/// Splits a dotted path into segments.
///
/// `^` (alone, or as a terminal segment) contributes no segment. Returns
/// `None` when a segment is empty, as in `a..b` or `.a`.
///
/// ```
/// use json_graph_util::split_path;
///
/// assert_eq!(split_path("a.b"), Some(vec!["a".to_string(), "b".to_string()]));
/// assert_eq!(split_path("^"), Some(vec![]));
/// assert_eq!(split_path("a.^"), Some(vec!["a".to_string()]));
/// assert_eq!(split_path("a..b"), None);
/// ```
pub fn split_path(path: &str) -> Option<Vec<String>> {
    let path = path.trim();
    if path == ROOT_SEGMENT {
        return Some(Vec::new());
    }
    let mut segments: Vec<String> = Vec::new();
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if part.is_empty() {
            return None;
        }
        if part == ROOT_SEGMENT {
            if parts.peek().is_some() {
                return None;
            }
            break;
        }
        segments.push(part.to_string());
    }
    Some(segments)
}

/// Whether `segment` survives a [`join_path`] / [`split_path`] round trip
/// and can sit inside a reference token unchanged.
///
/// ```
/// use json_graph_util::is_addressable;
///
/// assert!(is_addressable("name"));
/// assert!(!is_addressable(""));
/// assert!(!is_addressable("a.b"));
/// assert!(!is_addressable(" padded"));
/// ```
pub fn is_addressable(segment: &str) -> bool {
    !segment.is_empty()
        && segment != ROOT_SEGMENT
        && segment.trim() == segment
        && !segment.contains(&['.', '{', '}'][..])
}

/// Check if a string represents a valid non-negative integer array index.
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|&b| b.is_ascii_digit())
}

//! Path helpers for the hierarchical namespace
//!
//! Paths are absolute, `/`-separated, with no trailing slash (except the
//! root itself) and no empty segments.

use crate::error::CoordError;

/// The namespace root
pub const ROOT: &str = "/";

/// Width of the zero-padded counter appended to sequential nodes
pub const SEQUENCE_WIDTH: usize = 10;

/// Check that a path is well formed
pub fn validate(path: &str) -> Result<(), CoordError> {
    let invalid = |reason: &str| CoordError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path == ROOT {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(invalid("must not end with '/'"));
    }
    if path[1..].split('/').any(str::is_empty) {
        return Err(invalid("empty path segment"));
    }
    Ok(())
}

/// Parent of a path; `None` for the root
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a path
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a parent path and a child name
pub fn join(parent: &str, child: &str) -> String {
    if parent == ROOT {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Append a sequence counter the way sequential nodes are named
pub fn with_sequence(path: &str, sequence: u64) -> String {
    format!("{}{:0width$}", path, sequence, width = SEQUENCE_WIDTH)
}

/// All proper ancestors of a path, outermost first, excluding the root
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        if p == ROOT {
            break;
        }
        out.push(p);
        current = parent(p);
    }
    out.reverse();
    out
}

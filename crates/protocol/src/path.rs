//! Slash-delimited remote path decomposition.
//!
//! Pure string handling, no I/O. Remote paths always use `/` regardless of
//! the local platform.

/// Splits `path` at its last `/` into `(directory, leaf)`.
///
/// The separator itself belongs to neither half. A path without any `/`
/// has an empty directory, which callers treat as the root.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Returns the directory part of `path` (everything before the last `/`).
pub fn parent(path: &str) -> &str {
    split(path).0
}

/// Parent of a resolved absolute path; the root is its own parent.
pub fn parent_or_root(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Returns the leaf part of `path` (everything after the last `/`).
pub fn leaf(path: &str) -> &str {
    split(path).1
}

/// Splits a leaf name at its last `.` into `(stem, extension)`.
///
/// Names without a dot have no extension and the whole name is the stem.
/// A leading dot (`.profile`) is part of the stem, not an extension marker.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
    }
}

/// Returns the non-empty segments of a directory path.
///
/// Leading, trailing and doubled slashes produce no segments.
pub fn segments(dir: &str) -> impl Iterator<Item = &str> {
    dir.split('/').filter(|s| !s.is_empty())
}

/// Joins a directory and a name with exactly one `/` between them.
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Resolves `target` against the working directory `cwd`.
///
/// Absolute targets replace `cwd`. `.` and `..` segments are folded, and
/// `..` at the root stays at the root. The result is always absolute and
/// has no trailing slash (except the root itself).
pub fn resolve(cwd: &str, target: &str) -> String {
    let mut stack: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        segments(cwd).collect()
    };

    for seg in segments(target) {
        match seg {
            "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", stack.join("/"))
    }
}

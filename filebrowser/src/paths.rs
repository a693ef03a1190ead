//! POSIX-style path helpers for the browsed namespace.
//!
//! Paths in the browsed filesystem are always `/`-separated strings,
//! independent of the host platform.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub const SEP: char = '/';

/// Characters left unescaped in view URLs.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// Collapse redundant separators and resolve `.` and `..` components.
pub fn normpath(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = path.starts_with(SEP);

    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split(SEP) {
        match comp {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

pub fn join(base: &str, child: &str) -> String {
    if child.starts_with(SEP) || base.is_empty() {
        child.to_string()
    } else if base.ends_with(SEP) {
        format!("{base}{child}")
    } else {
        format!("{base}/{child}")
    }
}

/// Everything before the final separator, without trailing separators
/// unless the result is the root.
pub fn dirname(path: &str) -> String {
    match path.rfind(SEP) {
        Some(idx) => {
            let head = &path[..=idx];
            let trimmed = head.trim_end_matches(SEP);
            if trimmed.is_empty() {
                head.to_string()
            } else {
                trimmed.to_string()
            }
        }
        None => String::new(),
    }
}

pub fn basename(path: &str) -> &str {
    match path.rfind(SEP) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Percent-encode a path for use in a URL, keeping separators.
pub fn quote_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SAFE).to_string()
}

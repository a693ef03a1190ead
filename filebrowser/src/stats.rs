//! Display shaping of stat records: type tags, `rwx` strings, view URLs
//! and breadcrumb trails.

use serde::Serialize;

use crate::fs::{Stat, S_IFDIR, S_IFLNK, S_IFMT};
use crate::paths::{normpath, quote_path};

/// URL prefix under which paths are browsed.
pub const VIEW_URL_PREFIX: &str = "/filebrowser/view";

/// A stat record ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayRecord {
    pub path: String,
    pub name: String,
    pub stats: Stat,
    #[serde(rename = "type")]
    pub file_type: &'static str,
    pub rwx: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub url: String,
    pub label: String,
}

pub fn filetype(mode: u32) -> &'static str {
    match mode & S_IFMT {
        S_IFDIR => "dir",
        S_IFLNK => "link",
        _ => "file",
    }
}

/// `ls -l` style permission string, e.g. `drwxr-xr-x`. A set sticky bit
/// appends a trailing `t`.
pub fn rwx(mode: u32) -> String {
    let mut out = String::with_capacity(11);
    out.push(match mode & S_IFMT {
        S_IFDIR => 'd',
        S_IFLNK => 'l',
        _ => '-',
    });
    for (shift, letters) in [(6, b"rwx"), (3, b"rwx"), (0, b"rwx")] {
        let bits = (mode >> shift) & 0o7;
        for (i, letter) in letters.iter().enumerate() {
            let mask = 0o4 >> i;
            out.push(if bits & mask != 0 { *letter as char } else { '-' });
        }
    }
    if mode & 0o1000 != 0 {
        out.push('t');
    }
    out
}

/// Build the display record for `stat`. The input is left untouched.
pub fn massage_stats(stat: &Stat) -> DisplayRecord {
    let normalized = normpath(&stat.path);
    DisplayRecord {
        url: format!("{VIEW_URL_PREFIX}{}", quote_path(&normalized)),
        path: normalized,
        name: stat.name.clone(),
        stats: stat.clone(),
        file_type: filetype(stat.mode),
        rwx: rwx(stat.mode),
    }
}

/// Breadcrumb trail from the root down to `path`.
pub fn parse_breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let normalized = normpath(path);
    let mut breadcrumbs = vec![Breadcrumb {
        url: String::new(),
        label: "/".into(),
    }];

    let mut url = String::new();
    for part in normalized.split('/').skip(1) {
        url = format!("{url}/{part}");
        if url != "/" {
            breadcrumbs.push(Breadcrumb {
                url: url.clone(),
                label: part.to_string(),
            });
        }
    }
    breadcrumbs
}

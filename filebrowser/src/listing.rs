//! Directory listing: parent entry, filter, sort, paginate, normalize.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::info;

use hue_common::identity::coerce_bool;
use hue_common::{ConsoleError, ConsoleResult, RequestUser};

use crate::display::parse_number;
use crate::fs::{FileSystem, FsError, Stat};
use crate::paths::{join, normpath};
use crate::stats::{filetype, massage_stats, parse_breadcrumbs, Breadcrumb, DisplayRecord};

pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Attributes a listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Type,
    Atime,
    Mtime,
    Size,
    User,
    Group,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "type" => Ok(Self::Type),
            "atime" => Ok(Self::Atime),
            "mtime" => Ok(Self::Mtime),
            "size" => Ok(Self::Size),
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            other => Err(format!("Invalid sort attribute '{other}'")),
        }
    }
}

impl SortKey {
    fn compare(self, a: &Stat, b: &Stat) -> Ordering {
        match self {
            Self::Name => a.name.cmp(&b.name),
            Self::Type => filetype(a.mode).cmp(filetype(b.mode)),
            Self::Atime => a.atime.cmp(&b.atime),
            Self::Mtime => a.mtime.cmp(&b.mtime),
            Self::Size => a.size.cmp(&b.size),
            Self::User => a.user.cmp(&b.user),
            Self::Group => a.group.cmp(&b.group),
        }
    }
}

/// Query parameters of the paged listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub pagenum: Option<String>,
    pub pagesize: Option<String>,
    pub sortby: Option<String>,
    pub descending: Option<String>,
    pub filter: Option<String>,
}

/// One page of a derived sequence.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub num_pages: usize,
}

impl<T> Page<T> {
    /// Slice page `number` (1-based) out of `items`. Out-of-range pages
    /// are empty.
    pub fn paginate(items: Vec<T>, number: usize, page_size: usize) -> Self {
        let total_count = items.len();
        let num_pages = if page_size == 0 {
            0
        } else {
            total_count.div_ceil(page_size)
        };

        let start = number
            .checked_sub(1)
            .and_then(|n| n.checked_mul(page_size))
            .filter(|start| *start < total_count);
        let page_items = match start {
            Some(start) if page_size > 0 => {
                items.into_iter().skip(start).take(page_size).collect()
            }
            _ => Vec::new(),
        };

        Self {
            items: page_items,
            number,
            page_size,
            total_count,
            num_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            page_size: self.page_size,
            total_count: self.total_count,
            num_pages: self.num_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PagedListing {
    pub path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub page: Page<DisplayRecord>,
    pub home_directory: Option<String>,
    pub filter_str: Option<String>,
    pub sortby: Option<String>,
    pub descending: bool,
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub files: Vec<DisplayRecord>,
    pub file_filter: String,
    pub home_directory: Option<String>,
}

/// Entry filter of the non-paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFilter {
    Any,
    File,
    Dir,
}

impl FromStr for FileFilter {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(Self::Any),
            "file" => Ok(Self::File),
            "dir" => Ok(Self::Dir),
            other => Err(ConsoleError::invalid(format!(
                "file_filter must be one of 'any', 'file' or 'dir', not '{other}'"
            ))),
        }
    }
}

impl FileFilter {
    fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::File => "file",
            Self::Dir => "dir",
        }
    }

    fn accepts(self, stat: &Stat) -> bool {
        match self {
            Self::Any => true,
            Self::File => !stat.is_dir(),
            Self::Dir => stat.is_dir(),
        }
    }
}

/// Stat of the parent of `path`, with its path set to the parent path.
/// `None` at the filesystem root.
pub fn parent_entry(fs: &dyn FileSystem, path: &str) -> Result<Option<Stat>, FsError> {
    if normpath(path) == "/" {
        return Ok(None);
    }
    let parent_path = normpath(&join(path, ".."));
    let mut parent = fs.stats(&parent_path)?;
    parent.path = parent_path;
    Ok(Some(parent))
}

/// Stable sort; equal entries keep their input order in both directions.
pub fn sort_stats(stats: &mut [Stat], key: SortKey, descending: bool) {
    if descending {
        stats.sort_by(|a, b| key.compare(b, a));
    } else {
        stats.sort_by(|a, b| key.compare(a, b));
    }
}

pub fn home_directory(fs: &dyn FileSystem, user: &RequestUser) -> Option<String> {
    let home = user.home_directory();
    fs.isdir(&home).then_some(home)
}

fn require_dir(fs: &dyn FileSystem, path: &str) -> ConsoleResult<()> {
    if fs.isdir(path) {
        Ok(())
    } else {
        Err(ConsoleError::invalid(format!("Not a directory: {path}")))
    }
}

/// A blank or absent value falls back to `default`.
fn page_param(name: &str, value: Option<&str>, default: usize) -> ConsoleResult<usize> {
    match parse_number(name, value)? {
        None => Ok(default),
        Some(n) => usize::try_from(n)
            .map_err(|_| ConsoleError::invalid(format!("Invalid value for {name}: {n}"))),
    }
}

/// Paginated listing of `path`.
pub fn listdir_paged(
    fs: &dyn FileSystem,
    user: &RequestUser,
    path: &str,
    query: &ListingQuery,
    default_page_size: usize,
) -> ConsoleResult<PagedListing> {
    require_dir(fs, path)?;

    let pagenum = page_param("pagenum", query.pagenum.as_deref(), 1)?;
    let pagesize = page_param("pagesize", query.pagesize.as_deref(), default_page_size)?;

    let mut all_stats = fs.listdir_stats(path)?;

    if let Some(mut parent) = parent_entry(fs, path)? {
        parent.name = "..".into();
        all_stats.insert(0, parent);
    }

    let filter_str = query.filter.clone().filter(|f| !f.is_empty());
    if let Some(needle) = &filter_str {
        all_stats.retain(|s| s.name.contains(needle.as_str()));
    }

    let descending = query.descending.as_deref().is_some_and(coerce_bool);
    if let Some(sortby) = &query.sortby {
        match sortby.parse::<SortKey>() {
            Ok(key) => sort_stats(&mut all_stats, key, descending),
            Err(e) => info!("{e} for listdir."),
        }
    }

    let page = Page::paginate(all_stats, pagenum, pagesize).map(|s| massage_stats(&s));

    Ok(PagedListing {
        path: path.to_string(),
        breadcrumbs: parse_breadcrumbs(path),
        page,
        home_directory: home_directory(fs, user),
        filter_str,
        sortby: query.sortby.clone(),
        descending,
    })
}

/// Full listing of `path`, used by the chooser.
pub fn listdir(
    fs: &dyn FileSystem,
    user: &RequestUser,
    path: &str,
    file_filter: FileFilter,
) -> ConsoleResult<Listing> {
    require_dir(fs, path)?;

    let mut stats = fs.listdir_stats(path)?;
    if let Some(parent) = parent_entry(fs, path)? {
        stats.insert(0, parent);
    }

    let files = stats
        .iter()
        .filter(|s| file_filter.accepts(s))
        .map(massage_stats)
        .collect();

    Ok(Listing {
        path: path.to_string(),
        breadcrumbs: parse_breadcrumbs(path),
        files,
        file_filter: file_filter.as_str().to_string(),
        home_directory: home_directory(fs, user),
    })
}

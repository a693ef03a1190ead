//! Filesystem client abstraction.
//!
//! The views talk to the browsed filesystem only through [`FileSystem`].
//! Each request obtains its own client bound to the requesting user from a
//! [`FsFactory`], so switching identity (see `upload`) never leaks across
//! requests.

pub mod local;

use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, Write};
use thiserror::Error;

use hue_common::ConsoleError;

pub use local::LocalFs;

/// File type mask and values of the `mode` field.
pub const S_IFMT: u32 = 0o170_000;
pub const S_IFDIR: u32 = 0o040_000;
pub const S_IFREG: u32 = 0o100_000;
pub const S_IFLNK: u32 = 0o120_000;

/// Metadata for one path, as reported by the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Permission bits plus the `S_IF*` type bits.
    pub mode: u32,
    pub mtime: i64,
    pub atime: i64,
    pub user: String,
    pub group: String,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_link(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }

    /// Permission bits only, including setuid/setgid/sticky.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Cluster health as reported by the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct FsStatus {
    pub health: String,
    pub messages: Vec<String>,
    pub datanode_report: Vec<NodeReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub capacity_bytes: u64,
    pub used_bytes: u64,
    pub remaining_bytes: u64,
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File exists: {0}")]
    AlreadyExists(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl FsError {
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_string()),
            _ => Self::Io {
                path: path.to_string(),
                source: err,
            },
        }
    }
}

impl From<FsError> for ConsoleError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound(path) => ConsoleError::NotFound(format!("File not found: {path}")),
            FsError::PermissionDenied(path) => {
                ConsoleError::PermissionDenied(format!("Permission denied: {path}"))
            }
            other => ConsoleError::upstream("Filesystem operation failed.", other),
        }
    }
}

/// Readable, seekable file handle. Closed on drop.
pub trait ReadHandle: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadHandle for T {}

/// Writable file handle. Closed on drop.
pub type WriteHandle = Box<dyn Write + Send>;

/// Operations the console needs from a filesystem client.
///
/// All calls are blocking. Paths are absolute `/`-separated strings.
pub trait FileSystem: Send + Sync {
    /// Name of the filesystem, shown on the status page.
    fn name(&self) -> &str;

    /// Identity the client currently acts as.
    fn user(&self) -> &str;

    fn setuser(&mut self, user: &str);

    /// The filesystem's privileged identity.
    fn superuser(&self) -> &str;

    fn exists(&self, path: &str) -> bool;
    fn isfile(&self, path: &str) -> bool;
    fn isdir(&self, path: &str) -> bool;

    fn stats(&self, path: &str) -> Result<Stat, FsError>;

    /// Stats of every child of `path`, ordered by name.
    fn listdir_stats(&self, path: &str) -> Result<Vec<Stat>, FsError>;

    fn open(&self, path: &str) -> Result<Box<dyn ReadHandle>, FsError>;

    /// Create `path`, truncating an existing file.
    fn create(&self, path: &str) -> Result<WriteHandle, FsError>;

    /// Rename `src` to `dest`. An existing directory `dest` receives `src`
    /// as a child; any other existing `dest` is an error.
    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError>;

    fn remove(&self, path: &str) -> Result<(), FsError>;
    fn rmdir(&self, path: &str) -> Result<(), FsError>;
    fn rmtree(&self, path: &str) -> Result<(), FsError>;

    /// Create `path` along with any missing parents.
    fn mkdir(&self, path: &str) -> Result<(), FsError>;

    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;

    /// Change owner and group. An empty name leaves that part unchanged.
    fn chown(&self, path: &str, user: &str, group: &str) -> Result<(), FsError>;

    fn status(&self) -> Result<FsStatus, FsError>;
}

/// Hands out filesystem clients bound to a user.
pub trait FsFactory: Send + Sync {
    fn for_user(&self, user: &str) -> Box<dyn FileSystem>;
}

//! Local-disk filesystem client.
//!
//! Maps the absolute browsed namespace onto a root directory on the local
//! disk. Ownership is reported and changed with the host's user database;
//! the acting user is recorded but not enforced, the process' own
//! credentials apply to every call.

use nix::sys::statvfs::statvfs;
use nix::unistd::{chown, Gid, Group, Uid, User};
use std::fs::{self, File};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{FileSystem, FsError, FsFactory, FsStatus, NodeReport, ReadHandle, Stat, WriteHandle};
use crate::paths::{basename, normpath};

#[derive(Debug, Clone)]
pub struct LocalFs {
    name: String,
    root: PathBuf,
    user: String,
    superuser: String,
}

impl LocalFs {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, superuser: impl Into<String>) -> Self {
        let superuser = superuser.into();
        Self {
            name: name.into(),
            root: root.into(),
            user: superuser.clone(),
            superuser,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a browsed path. `normpath` drops leading `..`
    /// components of absolute paths, so the result stays under the root.
    fn resolve(&self, path: &str) -> PathBuf {
        let norm = normpath(&format!("/{path}"));
        self.root.join(norm.trim_start_matches('/'))
    }

    fn stat_host(&self, path: &str, host: &Path) -> Result<Stat, FsError> {
        let metadata = fs::symlink_metadata(host).map_err(|e| FsError::from_io(path, e))?;
        let norm = normpath(path);

        let user = User::from_uid(Uid::from_raw(metadata.uid()))
            .ok()
            .flatten()
            .map(|u| u.name)
            .unwrap_or_else(|| metadata.uid().to_string());
        let group = Group::from_gid(Gid::from_raw(metadata.gid()))
            .ok()
            .flatten()
            .map(|g| g.name)
            .unwrap_or_else(|| metadata.gid().to_string());

        Ok(Stat {
            name: basename(&norm).to_string(),
            path: norm,
            // Directories report no size, as on a distributed filesystem.
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            mode: metadata.mode(),
            mtime: metadata.mtime(),
            atime: metadata.atime(),
            user,
            group,
        })
    }
}

impl FileSystem for LocalFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn setuser(&mut self, user: &str) {
        debug!("Filesystem client now acting as {user}");
        self.user = user.to_string();
    }

    fn superuser(&self) -> &str {
        &self.superuser
    }

    fn exists(&self, path: &str) -> bool {
        fs::symlink_metadata(self.resolve(path)).is_ok()
    }

    fn isfile(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn isdir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn stats(&self, path: &str) -> Result<Stat, FsError> {
        self.stat_host(path, &self.resolve(path))
    }

    fn listdir_stats(&self, path: &str) -> Result<Vec<Stat>, FsError> {
        let host = self.resolve(path);
        let read_dir = fs::read_dir(&host).map_err(|e| FsError::from_io(path, e))?;

        let base = normpath(path);
        let mut stats = Vec::new();
        for entry_result in read_dir {
            let entry = entry_result.map_err(|e| FsError::from_io(path, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let child = crate::paths::join(&base, &name);
            stats.push(self.stat_host(&child, &entry.path())?);
        }
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stats)
    }

    fn open(&self, path: &str) -> Result<Box<dyn ReadHandle>, FsError> {
        let host = self.resolve(path);
        if host.is_dir() {
            return Err(FsError::Other(format!("Is a directory: {path}")));
        }
        let file = File::open(&host).map_err(|e| FsError::from_io(path, e))?;
        Ok(Box::new(file))
    }

    fn create(&self, path: &str) -> Result<WriteHandle, FsError> {
        let file = File::create(self.resolve(path)).map_err(|e| FsError::from_io(path, e))?;
        Ok(Box::new(file))
    }

    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
        let src_host = self.resolve(src);
        if fs::symlink_metadata(&src_host).is_err() {
            return Err(FsError::NotFound(src.to_string()));
        }

        let mut dest_host = self.resolve(dest);
        if dest_host.is_dir() {
            dest_host = dest_host.join(basename(&normpath(src)));
        }
        if fs::symlink_metadata(&dest_host).is_ok() {
            return Err(FsError::AlreadyExists(dest.to_string()));
        }

        fs::rename(&src_host, &dest_host).map_err(|e| FsError::from_io(src, e))
    }

    fn remove(&self, path: &str) -> Result<(), FsError> {
        let host = self.resolve(path);
        if host.is_dir() {
            return Err(FsError::Other(format!("Is a directory: {path}")));
        }
        fs::remove_file(host).map_err(|e| FsError::from_io(path, e))
    }

    fn rmdir(&self, path: &str) -> Result<(), FsError> {
        fs::remove_dir(self.resolve(path)).map_err(|e| FsError::from_io(path, e))
    }

    fn rmtree(&self, path: &str) -> Result<(), FsError> {
        if normpath(path) == "/" {
            return Err(FsError::Other("Refusing to remove the filesystem root".into()));
        }
        fs::remove_dir_all(self.resolve(path)).map_err(|e| FsError::from_io(path, e))
    }

    fn mkdir(&self, path: &str) -> Result<(), FsError> {
        fs::create_dir_all(self.resolve(path)).map_err(|e| FsError::from_io(path, e))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let permissions = fs::Permissions::from_mode(mode & 0o7777);
        fs::set_permissions(self.resolve(path), permissions)
            .map_err(|e| FsError::from_io(path, e))
    }

    /// Names missing from the host account database are skipped with a
    /// warning: the console's users come from the proxy, not /etc/passwd.
    fn chown(&self, path: &str, user: &str, group: &str) -> Result<(), FsError> {
        let uid = if user.is_empty() {
            None
        } else {
            match User::from_name(user).map_err(|e| FsError::from_io(path, e.into()))? {
                Some(found) => Some(found.uid),
                None => {
                    warn!("Unknown user {user}, leaving owner of {path} unchanged");
                    None
                }
            }
        };
        let gid = if group.is_empty() {
            None
        } else {
            match Group::from_name(group).map_err(|e| FsError::from_io(path, e.into()))? {
                Some(found) => Some(found.gid),
                None => {
                    warn!("Unknown group {group}, leaving group of {path} unchanged");
                    None
                }
            }
        };
        if uid.is_none() && gid.is_none() {
            return Ok(());
        }

        chown(self.resolve(path).as_path(), uid, gid).map_err(|e| FsError::from_io(path, e.into()))
    }

    fn status(&self) -> Result<FsStatus, FsError> {
        let stat = statvfs(self.root.as_path()).map_err(|e| FsError::from_io("/", e.into()))?;

        let block_size = stat.fragment_size() as u64;
        let capacity_bytes = stat.blocks() as u64 * block_size;
        let remaining_bytes = stat.blocks_available() as u64 * block_size;

        Ok(FsStatus {
            health: "healthy".into(),
            messages: Vec::new(),
            datanode_report: vec![NodeReport {
                name: self.root.display().to_string(),
                capacity_bytes,
                used_bytes: capacity_bytes.saturating_sub(remaining_bytes),
                remaining_bytes,
            }],
        })
    }
}

impl FsFactory for LocalFs {
    fn for_user(&self, user: &str) -> Box<dyn FileSystem> {
        let mut client = self.clone();
        client.setuser(user);
        Box::new(client)
    }
}

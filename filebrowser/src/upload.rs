//! File upload: the body is staged in a temporary file owned by the
//! filesystem superuser, handed over to the uploader, then renamed into
//! place.

use serde::Serialize;
use std::io::Write;
use tracing::{error, info, warn};
use uuid::Uuid;

use hue_common::{ConsoleError, ConsoleResult, RequestUser};

use crate::fs::{FileSystem, FsError};
use crate::paths::join;
use crate::stats::{massage_stats, DisplayRecord};

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "hdfs_file";

/// Mode given to uploaded files.
pub const UPLOAD_MODE: u32 = 0o644;

#[derive(Debug, Clone, Serialize)]
pub struct UploadForm {
    pub dest: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadDone {
    /// Always 1; read by the upload widget.
    pub status: u8,
    pub path: String,
    pub result: DisplayRecord,
    pub next: Option<String>,
}

/// One received upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub data: Vec<u8>,
}

fn stage(fs: &dyn FileSystem, tmp_path: &str, data: &[u8]) -> Result<(), FsError> {
    let mut out = fs.create(tmp_path)?;
    out.write_all(data).map_err(|e| FsError::from_io(tmp_path, e))?;
    out.flush().map_err(|e| FsError::from_io(tmp_path, e))
}

/// Hand the staged file to `user`, acting as the filesystem superuser.
/// The client's identity is restored whatever the outcome.
fn hand_over(fs: &mut dyn FileSystem, tmp_path: &str, user: &RequestUser) -> Result<(), FsError> {
    let superuser = fs.superuser().to_string();
    fs.setuser(&superuser);
    let result = fs
        .chmod(tmp_path, UPLOAD_MODE)
        .and_then(|()| fs.chown(tmp_path, &user.username, &user.username));
    fs.setuser(&user.username);
    result
}

/// Store `file` at `dest`. When `dest` is a directory the file keeps its
/// own name inside it.
pub fn upload(
    fs: &mut dyn FileSystem,
    tmp_dir: &str,
    user: &RequestUser,
    dest: &str,
    file: &UploadedFile,
    next: Option<String>,
) -> ConsoleResult<UploadDone> {
    let dest = dest.trim();
    if dest.is_empty() {
        return Err(ConsoleError::invalid("dest: This field is required."));
    }
    if file.name.is_empty() {
        return Err(ConsoleError::invalid("hdfs_file: This field is required."));
    }

    let dest = if fs.isdir(dest) {
        if file.name.contains('/') {
            return Err(ConsoleError::invalid(format!(
                "Uploaded file name may not contain '/': {}",
                file.name
            )));
        }
        join(dest, &file.name)
    } else {
        dest.to_string()
    };

    let tmp_path = join(tmp_dir, &format!("hue-upload-{}", Uuid::new_v4()));
    let result = place(fs, &tmp_path, user, &dest, &file.data);
    if result.is_err() && fs.exists(&tmp_path) {
        if let Err(e) = fs.remove(&tmp_path) {
            warn!("Could not remove temporary upload {tmp_path}: {e}");
        }
    }
    let stats = result?;

    info!(user = %user.username, "Uploaded {} bytes to {dest}", file.data.len());
    Ok(UploadDone {
        status: 1,
        path: dest,
        result: massage_stats(&stats),
        next,
    })
}

fn place(
    fs: &mut dyn FileSystem,
    tmp_path: &str,
    user: &RequestUser,
    dest: &str,
    data: &[u8],
) -> ConsoleResult<crate::fs::Stat> {
    stage(fs, tmp_path, data)
        .map_err(|e| ConsoleError::upstream("Failed to store uploaded file.", e))?;

    hand_over(fs, tmp_path, user).map_err(|e| {
        let msg = format!(
            "Failed to chown uploaded file (\"{tmp_path}\") as superuser {}.",
            fs.superuser()
        );
        error!("{msg} {e}");
        ConsoleError::upstream(msg, e)
    })?;

    fs.rename(tmp_path, dest).map_err(|e| {
        ConsoleError::upstream(
            format!("Failed to rename uploaded temporary file (\"{tmp_path}\") to \"{dest}\": {e}"),
            &e,
        )
    })?;

    Ok(fs.stats(dest)?)
}

//! In-browser file editor: load a file as text and save it back.
//!
//! Saving over an existing file goes through a staging copy so that a
//! failed write never clobbers the original:
//!
//! 1. write `<path>._hue_new`
//! 2. copy permissions and ownership of `<path>` onto it (best effort)
//! 3. move `<path>` aside to `<path>._hue_old`, after clearing a stale
//!    backup file (a directory there aborts the save)
//! 4. rename the staging file into place, restoring the backup on failure
//! 5. remove the backup (best effort)

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{info, warn};

use hue_common::{ConsoleError, ConsoleResult};

use crate::display::resolve_encoding;
use crate::fs::{FileSystem, FsError};
use crate::paths::{basename, dirname};
use crate::stats::{parse_breadcrumbs, Breadcrumb};

/// Largest file the editor will load.
pub const MAX_FILEEDITOR_SIZE: u64 = 256 * 1024;

const STAGING_SUFFIX: &str = "._hue_new";
const BACKUP_SUFFIX: &str = "._hue_old";

#[derive(Debug, Clone, Serialize)]
pub struct EditorView {
    pub exists: bool,
    pub path: String,
    pub filename: String,
    pub dirname: String,
    pub encoding: String,
    pub contents: String,
    pub breadcrumbs: Vec<Breadcrumb>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorForm {
    pub path: String,
    #[serde(default)]
    pub contents: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Load `path` for editing. A missing file opens as an empty new file.
pub fn edit(fs: &dyn FileSystem, path: &str, encoding_label: &str) -> ConsoleResult<EditorView> {
    let encoding = resolve_encoding(encoding_label)?;

    let stats = match fs.stats(path) {
        Ok(stats) => Some(stats),
        Err(FsError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let contents = match &stats {
        Some(stats) if stats.is_dir() => {
            return Err(ConsoleError::invalid(format!("Cannot edit a directory: {path}")));
        }
        Some(stats) if stats.size > MAX_FILEEDITOR_SIZE => {
            return Err(ConsoleError::invalid(format!("File too big to edit: {path}")));
        }
        Some(_) => {
            let mut raw = Vec::new();
            fs.open(path)?.read_to_end(&mut raw).map_err(|e| {
                warn!("Could not read file at {path}: {e}");
                ConsoleError::upstream("Failed to read file.", e)
            })?;
            encoding
                .decode_without_bom_handling_and_without_replacement(&raw)
                .ok_or_else(|| {
                    ConsoleError::invalid(format!(
                        "File is not encoded in {}; cannot be edited: {path}",
                        encoding_label
                    ))
                })?
                .into_owned()
        }
        None => String::new(),
    };

    Ok(EditorView {
        exists: stats.is_some(),
        path: path.to_string(),
        filename: basename(path).to_string(),
        dirname: dirname(path),
        encoding: encoding_label.to_string(),
        contents,
        breadcrumbs: parse_breadcrumbs(path),
    })
}

fn encode(encoding: &'static Encoding, contents: &str) -> ConsoleResult<Vec<u8>> {
    let (bytes, _, had_errors) = encoding.encode(contents);
    if had_errors {
        return Err(ConsoleError::invalid(format!(
            "Contents cannot be encoded as {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

fn write_file(fs: &dyn FileSystem, path: &str, data: &[u8]) -> Result<(), FsError> {
    let mut out = fs.create(path)?;
    out.write_all(data).map_err(|e| FsError::from_io(path, e))?;
    out.flush().map_err(|e| FsError::from_io(path, e))
}

/// Save `contents` to `path`, encoded with `encoding_label`.
pub fn save_file(
    fs: &dyn FileSystem,
    path: &str,
    contents: &str,
    encoding_label: &str,
) -> ConsoleResult<()> {
    let data = encode(resolve_encoding(encoding_label)?, contents)?;

    if fs.isdir(path) {
        return Err(ConsoleError::invalid(format!("Cannot save over a directory: {path}")));
    }
    if fs.exists(path) {
        do_overwrite_save(fs, path, &data)?;
    } else {
        write_file(fs, path, &data)?;
        info!("Created {path}");
    }
    Ok(())
}

fn discard_staging(fs: &dyn FileSystem, staging: &str) {
    if let Err(cleanup) = fs.remove(staging) {
        warn!("Could not remove staging file {staging}: {cleanup}");
    }
}

fn do_overwrite_save(fs: &dyn FileSystem, path: &str, data: &[u8]) -> Result<(), FsError> {
    let staging = format!("{path}{STAGING_SUFFIX}");
    let backup = format!("{path}{BACKUP_SUFFIX}");

    if let Err(e) = write_file(fs, &staging, data) {
        discard_staging(fs, &staging);
        return Err(e);
    }
    info!("Wrote to {staging}");

    match fs.stats(path) {
        Ok(current) => {
            if let Err(e) = fs.chmod(&staging, current.permissions()) {
                warn!("Could not chmod new file {staging} to match old file: {e}");
            }
            if let Err(e) = fs.chown(&staging, &current.user, &current.group) {
                warn!("Could not chown new file {staging} to match old file: {e}");
            }
        }
        Err(e) => warn!("Could not stat {path} to copy its permissions: {e}"),
    }

    // Left over from an earlier interrupted save. The backup slot must be
    // empty: renaming onto a directory would move the original into it.
    if fs.isdir(&backup) {
        discard_staging(fs, &staging);
        return Err(FsError::AlreadyExists(backup));
    }
    if fs.exists(&backup) {
        if let Err(e) = fs.remove(&backup) {
            warn!("Could not remove stale backup {backup}: {e}");
            discard_staging(fs, &staging);
            return Err(e);
        }
    }

    if let Err(e) = fs.rename(path, &backup) {
        discard_staging(fs, &staging);
        return Err(e);
    }

    if let Err(e) = fs.rename(&staging, path) {
        if let Err(restore) = fs.rename(&backup, path) {
            warn!("Could not restore {path} from {backup}: {restore}");
        }
        discard_staging(fs, &staging);
        return Err(e);
    }
    info!("Renamed {staging} to {path}");

    if let Err(e) = fs.remove(&backup) {
        warn!("Could not remove backup {backup}: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;

    fn fixture() -> (tempfile::TempDir, LocalFs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new("test", dir.path(), "hdfs");
        fs.mkdir("/user/alice").unwrap();
        (dir, fs)
    }

    fn read_all(fs: &LocalFs, path: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        fs.open(path).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_edit_missing_file_is_new() {
        let (_dir, fs) = fixture();
        let view = edit(&fs, "/user/alice/new.txt", "utf-8").unwrap();
        assert!(!view.exists);
        assert!(view.contents.is_empty());
        assert_eq!(view.filename, "new.txt");
        assert_eq!(view.dirname, "/user/alice");
    }

    #[test]
    fn test_edit_refusals() {
        let (_dir, fs) = fixture();
        let err = edit(&fs, "/user/alice", "utf-8").unwrap_err();
        assert!(err.to_string().starts_with("Cannot edit a directory"));

        write_file(&fs, "/user/alice/big", &vec![b'a'; MAX_FILEEDITOR_SIZE as usize + 1]).unwrap();
        let err = edit(&fs, "/user/alice/big", "utf-8").unwrap_err();
        assert!(err.to_string().starts_with("File too big to edit"));

        write_file(&fs, "/user/alice/bin", &[0xff, 0xfe, 0xfd]).unwrap();
        let err = edit(&fs, "/user/alice/bin", "utf-8").unwrap_err();
        assert_eq!(
            err.to_string(),
            "File is not encoded in utf-8; cannot be edited: /user/alice/bin"
        );
    }

    #[test]
    fn test_save_new_then_edit() {
        let (_dir, fs) = fixture();
        save_file(&fs, "/user/alice/notes.txt", "first draft\n", "utf-8").unwrap();

        let view = edit(&fs, "/user/alice/notes.txt", "utf-8").unwrap();
        assert!(view.exists);
        assert_eq!(view.contents, "first draft\n");
    }

    #[test]
    fn test_overwrite_keeps_mode_and_cleans_up() {
        let (_dir, fs) = fixture();
        write_file(&fs, "/user/alice/notes.txt", b"old").unwrap();
        fs.chmod("/user/alice/notes.txt", 0o640).unwrap();

        save_file(&fs, "/user/alice/notes.txt", "new contents", "utf-8").unwrap();

        assert_eq!(read_all(&fs, "/user/alice/notes.txt"), b"new contents");
        assert_eq!(fs.stats("/user/alice/notes.txt").unwrap().permissions(), 0o640);
        assert!(!fs.exists("/user/alice/notes.txt._hue_new"));
        assert!(!fs.exists("/user/alice/notes.txt._hue_old"));
    }

    #[test]
    fn test_stale_backup_does_not_block_save() {
        let (_dir, fs) = fixture();
        write_file(&fs, "/user/alice/notes.txt", b"old").unwrap();
        write_file(&fs, "/user/alice/notes.txt._hue_old", b"stale").unwrap();

        save_file(&fs, "/user/alice/notes.txt", "fresh", "utf-8").unwrap();
        assert_eq!(read_all(&fs, "/user/alice/notes.txt"), b"fresh");
        assert!(!fs.exists("/user/alice/notes.txt._hue_old"));
    }

    #[test]
    fn test_save_refuses_directory() {
        let (_dir, fs) = fixture();
        fs.mkdir("/user/alice/reports").unwrap();
        write_file(&fs, "/user/alice/reports/q1.csv", b"a,b\n").unwrap();

        let err = save_file(&fs, "/user/alice/reports", "oops", "utf-8").unwrap_err();
        assert_eq!(err.to_string(), "Cannot save over a directory: /user/alice/reports");
        assert!(fs.isdir("/user/alice/reports"));
        assert_eq!(read_all(&fs, "/user/alice/reports/q1.csv"), b"a,b\n");
        assert!(!fs.exists("/user/alice/reports._hue_old"));
        assert!(!fs.exists("/user/alice/reports._hue_new"));
    }

    #[test]
    fn test_directory_in_backup_slot_aborts_save() {
        let (_dir, fs) = fixture();
        write_file(&fs, "/user/alice/notes.txt", b"old").unwrap();
        fs.mkdir("/user/alice/notes.txt._hue_old").unwrap();
        write_file(&fs, "/user/alice/notes.txt._hue_old/keep", b"k").unwrap();

        assert!(save_file(&fs, "/user/alice/notes.txt", "fresh", "utf-8").is_err());
        assert_eq!(read_all(&fs, "/user/alice/notes.txt"), b"old");
        assert!(!fs.exists("/user/alice/notes.txt._hue_new"));
        assert!(!fs.exists("/user/alice/notes.txt._hue_old/notes.txt"));
        assert_eq!(read_all(&fs, "/user/alice/notes.txt._hue_old/keep"), b"k");
    }

    #[test]
    fn test_save_with_encoding() {
        let (_dir, fs) = fixture();
        save_file(&fs, "/user/alice/latin.txt", "café", "latin1").unwrap();
        assert_eq!(read_all(&fs, "/user/alice/latin.txt"), vec![b'c', b'a', b'f', 0xe9]);

        let err = save_file(&fs, "/user/alice/latin.txt", "snow ☃", "latin1").unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidRequest(_)));
        assert!(save_file(&fs, "/user/alice/x", "x", "klingon").is_err());
    }
}

//! Single-operation mutations (move, rename, mkdir, remove, rmdir, rmtree,
//! chmod, chown) behind one two-phase dispatcher.
//!
//! Pipeline: display form → validate submission → execute → redirect or
//! report success, refreshing the stats of the piggyback path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

use hue_common::{ConsoleError, ConsoleResult, RequestUser};

use crate::fs::{FileSystem, FsError};
use crate::paths::{dirname, join};
use crate::stats::{massage_stats, DisplayRecord};

/// Substituted for `user` / `group` by the `*_other` free-text field.
pub const OTHER_SENTINEL: &str = "__other__";

const REQUIRED: &str = "This field is required.";

/// Field name → validation messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Move,
    Rename,
    Mkdir,
    Remove,
    Rmdir,
    Rmtree,
    Chmod,
    Chown,
}

impl OpKind {
    pub const ALL: [OpKind; 8] = [
        OpKind::Move,
        OpKind::Rename,
        OpKind::Mkdir,
        OpKind::Remove,
        OpKind::Rmdir,
        OpKind::Rmtree,
        OpKind::Chmod,
        OpKind::Chown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Move => "move",
            OpKind::Rename => "rename",
            OpKind::Mkdir => "mkdir",
            OpKind::Remove => "remove",
            OpKind::Rmdir => "rmdir",
            OpKind::Rmtree => "rmtree",
            OpKind::Chmod => "chmod",
            OpKind::Chown => "chown",
        }
    }

    /// Form fields the operation takes, in argument order.
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            OpKind::Move | OpKind::Rename => &["src_path", "dest_path"],
            OpKind::Mkdir => &["path", "name"],
            OpKind::Remove | OpKind::Rmdir | OpKind::Rmtree => &["path"],
            OpKind::Chmod => &["path", "mode"],
            OpKind::Chown => &["path", "user", "group"],
        }
    }
}

/// A validated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOp {
    Move { src_path: String, dest_path: String },
    Rename { src_path: String, dest_path: String },
    Mkdir { path: String, name: String },
    Remove { path: String },
    Rmdir { path: String },
    Rmtree { path: String },
    Chmod { path: String, mode: u32 },
    Chown { path: String, user: String, group: String },
}

/// Parse an octal permission string such as `755` or `0644`.
pub fn parse_octal_mode(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value.strip_prefix("0o").unwrap_or(value);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
}

struct FormReader<'a> {
    form: &'a BTreeMap<String, String>,
    errors: FieldErrors,
}

impl<'a> FormReader<'a> {
    fn new(form: &'a BTreeMap<String, String>) -> Self {
        Self {
            form,
            errors: FieldErrors::new(),
        }
    }

    fn value(&self, field: &str) -> Option<&'a str> {
        self.form
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, field: &str) -> String {
        match self.value(field) {
            Some(v) => v.to_string(),
            None => {
                self.error(field, REQUIRED);
                String::new()
            }
        }
    }

    /// Like `required`, but `__other__` reads the `<field>_other` field.
    fn required_or_other(&mut self, field: &str) -> String {
        match self.value(field) {
            Some(OTHER_SENTINEL) => self.required(&format!("{field}_other")),
            _ => self.required(field),
        }
    }

    fn error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    fn finish(self, op: FileOp) -> Result<FileOp, FieldErrors> {
        if self.errors.is_empty() {
            Ok(op)
        } else {
            Err(self.errors)
        }
    }
}

impl FileOp {
    /// Validate a submitted form for `kind`.
    pub fn from_form(kind: OpKind, form: &BTreeMap<String, String>) -> Result<Self, FieldErrors> {
        let mut reader = FormReader::new(form);
        let op = match kind {
            OpKind::Move => FileOp::Move {
                src_path: reader.required("src_path"),
                dest_path: reader.required("dest_path"),
            },
            OpKind::Rename => FileOp::Rename {
                src_path: reader.required("src_path"),
                dest_path: reader.required("dest_path"),
            },
            OpKind::Mkdir => FileOp::Mkdir {
                path: reader.required("path"),
                name: reader.required("name"),
            },
            OpKind::Remove => FileOp::Remove {
                path: reader.required("path"),
            },
            OpKind::Rmdir => FileOp::Rmdir {
                path: reader.required("path"),
            },
            OpKind::Rmtree => FileOp::Rmtree {
                path: reader.required("path"),
            },
            OpKind::Chmod => {
                let path = reader.required("path");
                let raw = reader.required("mode");
                let mode = if raw.is_empty() {
                    0
                } else {
                    parse_octal_mode(&raw).unwrap_or_else(|| {
                        reader.error("mode", "Enter a valid octal permission, e.g. 755.");
                        0
                    })
                };
                FileOp::Chmod { path, mode }
            }
            OpKind::Chown => FileOp::Chown {
                path: reader.required("path"),
                user: reader.required_or_other("user"),
                group: reader.required_or_other("group"),
            },
        };
        reader.finish(op)
    }

    pub fn kind(&self) -> OpKind {
        match self {
            FileOp::Move { .. } => OpKind::Move,
            FileOp::Rename { .. } => OpKind::Rename,
            FileOp::Mkdir { .. } => OpKind::Mkdir,
            FileOp::Remove { .. } => OpKind::Remove,
            FileOp::Rmdir { .. } => OpKind::Rmdir,
            FileOp::Rmtree { .. } => OpKind::Rmtree,
            FileOp::Chmod { .. } => OpKind::Chmod,
            FileOp::Chown { .. } => OpKind::Chown,
        }
    }

    /// Checks that need no filesystem access.
    pub fn check(&self) -> ConsoleResult<()> {
        if let FileOp::Mkdir { name, .. } = self {
            if name.contains('/') {
                return Err(ConsoleError::invalid(format!(
                    "Sorry, could not name folder \"{name}\": Slashes are not allowed in filenames."
                )));
            }
        }
        Ok(())
    }

    pub fn piggyback_path(&self) -> Option<&str> {
        match self {
            FileOp::Mkdir { path, .. } | FileOp::Chmod { path, .. } | FileOp::Chown { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }

    /// Run the operation against `fs`.
    pub fn execute(&self, fs: &dyn FileSystem) -> Result<(), FsError> {
        match self {
            FileOp::Move { src_path, dest_path } => fs.rename(src_path, dest_path),
            FileOp::Rename { src_path, dest_path } => {
                // A bare name stays in the source's directory.
                if dest_path.contains('/') {
                    fs.rename(src_path, dest_path)
                } else {
                    fs.rename(src_path, &join(&dirname(src_path), dest_path))
                }
            }
            FileOp::Mkdir { path, name } => fs.mkdir(&join(path, name)),
            FileOp::Remove { path } => fs.remove(path),
            FileOp::Rmdir { path } => fs.rmdir(path),
            FileOp::Rmtree { path } => fs.rmtree(path),
            FileOp::Chmod { path, mode } => fs.chmod(path, *mode),
            FileOp::Chown { path, user, group } => fs.chown(path, user, group),
        }
    }
}

/// Extra context rendered with the chown form.
#[derive(Debug, Clone, Serialize)]
pub struct ChownContext {
    pub current_user: String,
    pub superuser: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpForm {
    pub op: OpKind,
    pub next: Option<String>,
    pub values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: FieldErrors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<ChownContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpSuccess {
    pub success: bool,
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DisplayRecord>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub result_error: bool,
}

#[derive(Debug)]
pub enum OpOutcome {
    /// Initial form, pre-filled from the query.
    Form(OpForm),
    /// Submitted form with field errors.
    Invalid(OpForm),
    Redirect(String),
    Done(OpSuccess),
}

impl IntoResponse for OpOutcome {
    fn into_response(self) -> Response {
        match self {
            OpOutcome::Form(form) => Json(form).into_response(),
            OpOutcome::Invalid(form) => (StatusCode::BAD_REQUEST, Json(form)).into_response(),
            OpOutcome::Redirect(next) => Redirect::to(&next).into_response(),
            OpOutcome::Done(success) => Json(success).into_response(),
        }
    }
}

fn non_empty(params: &BTreeMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.is_empty()).cloned()
}

fn collect_values(kind: OpKind, sources: &[&BTreeMap<String, String>]) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for name in kind.parameter_names() {
        if let Some(val) = sources.iter().find_map(|s| non_empty(s, name)) {
            values.insert(name.to_string(), val);
        }
    }
    values
}

fn extra_params(kind: OpKind, fs: &dyn FileSystem, user: &RequestUser) -> Option<ChownContext> {
    (kind == OpKind::Chown).then(|| ChownContext {
        current_user: user.username.clone(),
        superuser: fs.superuser().to_string(),
    })
}

/// The form for `kind`, with initial values taken from the query.
pub fn display_form(
    kind: OpKind,
    fs: &dyn FileSystem,
    user: &RequestUser,
    query: &BTreeMap<String, String>,
) -> OpForm {
    OpForm {
        op: kind,
        next: non_empty(query, "next"),
        values: collect_values(kind, &[query]),
        errors: FieldErrors::new(),
        extra_params: extra_params(kind, fs, user),
    }
}

/// Validate and execute a submitted `kind` form.
pub fn submit(
    kind: OpKind,
    fs: &dyn FileSystem,
    user: &RequestUser,
    query: &BTreeMap<String, String>,
    form: &BTreeMap<String, String>,
) -> ConsoleResult<OpOutcome> {
    let next = non_empty(query, "next").or_else(|| non_empty(form, "next"));

    let op = match FileOp::from_form(kind, form) {
        Ok(op) => op,
        Err(errors) => {
            return Ok(OpOutcome::Invalid(OpForm {
                op: kind,
                next,
                values: collect_values(kind, &[form, query]),
                errors,
                extra_params: extra_params(kind, fs, user),
            }));
        }
    };
    op.check()?;

    op.execute(fs).map_err(|e| {
        ConsoleError::upstream(
            format!(
                "Cannot perform operation.{}",
                user.superuser_hint(fs.superuser())
            ),
            e,
        )
    })?;
    info!(user = %user.username, "Performed {}: {:?}", kind.name(), op);

    if let Some(next) = next {
        debug!("Next: {next}");
        return Ok(OpOutcome::Redirect(next));
    }

    let mut outcome = OpSuccess {
        success: true,
        next: None,
        result: None,
        result_error: false,
    };
    if let Some(path) = op.piggyback_path() {
        match fs.stats(path) {
            Ok(stats) => outcome.result = Some(massage_stats(&stats)),
            Err(e) => {
                error!("Exception while processing piggyback data for {path}: {e}");
                outcome.result_error = true;
            }
        }
    }
    Ok(OpOutcome::Done(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FsFactory, LocalFs};

    fn fixture() -> (tempfile::TempDir, LocalFs) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new("test", dir.path(), "hdfs");
        fs.mkdir("/user/alice").unwrap();
        fs.create("/user/alice/a.txt").unwrap();
        (dir, fs)
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn alice() -> RequestUser {
        RequestUser::new("alice", false)
    }

    #[test]
    fn test_parameter_names_cover_form_fields() {
        for kind in OpKind::ALL {
            assert!(!kind.parameter_names().is_empty(), "{}", kind.name());
        }
    }

    #[test]
    fn test_piggyback_path_only_for_in_place_ops() {
        let form = params(&[
            ("path", "/user/alice/x"),
            ("name", "n"),
            ("mode", "755"),
            ("user", "alice"),
            ("group", "alice"),
            ("src_path", "/a"),
            ("dest_path", "/b"),
        ]);
        for kind in OpKind::ALL {
            let op = FileOp::from_form(kind, &form).unwrap();
            let expected = match kind {
                OpKind::Mkdir | OpKind::Chmod | OpKind::Chown => Some("/user/alice/x"),
                _ => None,
            };
            assert_eq!(op.piggyback_path(), expected, "{}", kind.name());
        }
    }

    #[test]
    fn test_parse_octal_mode() {
        assert_eq!(parse_octal_mode("755"), Some(0o755));
        assert_eq!(parse_octal_mode("0644"), Some(0o644));
        assert_eq!(parse_octal_mode("1777"), Some(0o1777));
        assert_eq!(parse_octal_mode("89"), None);
        assert_eq!(parse_octal_mode("17777"), None);
        assert_eq!(parse_octal_mode(""), None);
    }

    #[test]
    fn test_from_form_required_fields() {
        let errors = FileOp::from_form(OpKind::Move, &params(&[("src_path", "/a")])).unwrap_err();
        assert_eq!(errors["dest_path"], vec![REQUIRED.to_string()]);
        assert!(!errors.contains_key("src_path"));

        let errors = FileOp::from_form(OpKind::Chmod, &params(&[("path", "/a"), ("mode", "9")]))
            .unwrap_err();
        assert!(errors.contains_key("mode"));
    }

    #[test]
    fn test_chown_other_substitution() {
        let op = FileOp::from_form(
            OpKind::Chown,
            &params(&[
                ("path", "/a"),
                ("user", OTHER_SENTINEL),
                ("user_other", "carol"),
                ("group", "staff"),
            ]),
        )
        .unwrap();
        assert_eq!(
            op,
            FileOp::Chown {
                path: "/a".into(),
                user: "carol".into(),
                group: "staff".into(),
            }
        );

        let errors = FileOp::from_form(
            OpKind::Chown,
            &params(&[("path", "/a"), ("user", "bob"), ("group", OTHER_SENTINEL)]),
        )
        .unwrap_err();
        assert!(errors.contains_key("group_other"));
    }

    #[test]
    fn test_display_form_prefills_from_query() {
        let (_dir, fs) = fixture();
        let form = display_form(
            OpKind::Chown,
            &fs,
            &alice(),
            &params(&[("path", "/user/alice/a.txt"), ("unrelated", "x"), ("next", "/back")]),
        );
        assert_eq!(form.values.get("path").map(String::as_str), Some("/user/alice/a.txt"));
        assert!(!form.values.contains_key("unrelated"));
        assert_eq!(form.next.as_deref(), Some("/back"));
        assert_eq!(form.extra_params.as_ref().unwrap().superuser, "hdfs");
    }

    #[test]
    fn test_invalid_submission_redisplays_form() {
        let (_dir, fs) = fixture();
        let outcome = submit(OpKind::Mkdir, &fs, &alice(), &params(&[]), &params(&[("path", "/user/alice")]))
            .unwrap();
        match outcome {
            OpOutcome::Invalid(form) => {
                assert!(form.errors.contains_key("name"));
                assert_eq!(form.values.get("path").map(String::as_str), Some("/user/alice"));
            }
            other => panic!("expected invalid form, got {other:?}"),
        }
    }

    #[test]
    fn test_mkdir_with_piggyback() {
        let (_dir, fs) = fixture();
        let outcome = submit(
            OpKind::Mkdir,
            &fs,
            &alice(),
            &params(&[]),
            &params(&[("path", "/user/alice"), ("name", "reports")]),
        )
        .unwrap();
        assert!(fs.isdir("/user/alice/reports"));
        match outcome {
            OpOutcome::Done(done) => {
                assert!(done.success);
                assert!(!done.result_error);
                assert_eq!(done.result.unwrap().path, "/user/alice");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_mkdir_rejects_slash() {
        let (_dir, fs) = fixture();
        let err = submit(
            OpKind::Mkdir,
            &fs,
            &alice(),
            &params(&[]),
            &params(&[("path", "/user/alice"), ("name", "a/b")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Slashes are not allowed in filenames"));
        assert!(!fs.exists("/user/alice/a"));
    }

    #[test]
    fn test_rename_bare_name_stays_in_directory() {
        let (_dir, fs) = fixture();
        let outcome = submit(
            OpKind::Rename,
            &fs,
            &alice(),
            &params(&[("next", "/filebrowser/view/user/alice")]),
            &params(&[("src_path", "/user/alice/a.txt"), ("dest_path", "b.txt")]),
        )
        .unwrap();
        assert!(fs.isfile("/user/alice/b.txt"));
        assert!(matches!(outcome, OpOutcome::Redirect(ref n) if n == "/filebrowser/view/user/alice"));
    }

    #[test]
    fn test_piggyback_failure_is_flagged() {
        let (_dir, fs) = fixture();
        // chmod succeeds, but the piggyback path vanishes in between
        struct VanishingStats(Box<dyn FileSystem>);
        impl FileSystem for VanishingStats {
            fn name(&self) -> &str { self.0.name() }
            fn user(&self) -> &str { self.0.user() }
            fn setuser(&mut self, user: &str) { self.0.setuser(user) }
            fn superuser(&self) -> &str { self.0.superuser() }
            fn exists(&self, p: &str) -> bool { self.0.exists(p) }
            fn isfile(&self, p: &str) -> bool { self.0.isfile(p) }
            fn isdir(&self, p: &str) -> bool { self.0.isdir(p) }
            fn stats(&self, p: &str) -> Result<crate::fs::Stat, FsError> {
                Err(FsError::NotFound(p.to_string()))
            }
            fn listdir_stats(&self, p: &str) -> Result<Vec<crate::fs::Stat>, FsError> { self.0.listdir_stats(p) }
            fn open(&self, p: &str) -> Result<Box<dyn crate::fs::ReadHandle>, FsError> { self.0.open(p) }
            fn create(&self, p: &str) -> Result<crate::fs::WriteHandle, FsError> { self.0.create(p) }
            fn rename(&self, s: &str, d: &str) -> Result<(), FsError> { self.0.rename(s, d) }
            fn remove(&self, p: &str) -> Result<(), FsError> { self.0.remove(p) }
            fn rmdir(&self, p: &str) -> Result<(), FsError> { self.0.rmdir(p) }
            fn rmtree(&self, p: &str) -> Result<(), FsError> { self.0.rmtree(p) }
            fn mkdir(&self, p: &str) -> Result<(), FsError> { self.0.mkdir(p) }
            fn chmod(&self, p: &str, m: u32) -> Result<(), FsError> { self.0.chmod(p, m) }
            fn chown(&self, p: &str, u: &str, g: &str) -> Result<(), FsError> { self.0.chown(p, u, g) }
            fn status(&self) -> Result<crate::fs::FsStatus, FsError> { self.0.status() }
        }
        let wrapped = VanishingStats(fs.for_user("alice"));

        let outcome = submit(
            OpKind::Chmod,
            &wrapped,
            &alice(),
            &params(&[]),
            &params(&[("path", "/user/alice/a.txt"), ("mode", "600")]),
        )
        .unwrap();
        assert_eq!(fs.stats("/user/alice/a.txt").unwrap().permissions(), 0o600);
        match outcome {
            OpOutcome::Done(done) => {
                assert!(done.success);
                assert!(done.result_error);
                assert!(done.result.is_none());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_filesystem_failure_carries_hint() {
        let (_dir, fs) = fixture();
        let admin = RequestUser::new("admin", true);
        let err = submit(
            OpKind::Remove,
            &fs,
            &admin,
            &params(&[]),
            &params(&[("path", "/user/alice/missing")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConsoleError::Upstream { .. }));
        assert_eq!(
            err.to_string(),
            "Cannot perform operation. Note: you are a Hue admin but not a HDFS superuser (which is \"hdfs\")."
        );
    }
}

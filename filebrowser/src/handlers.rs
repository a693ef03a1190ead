//! HTTP handlers of the file browser, mounted under `/filebrowser`.
//!
//! Filesystem calls block, so every handler runs its filesystem work on
//! the blocking pool with a client bound to the requesting user.

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use hue_common::config::{AuthConfig, FileBrowserConfig};
use hue_common::{ConsoleError, ConsoleResult, RequestUser};

use crate::display::{display, DisplayQuery, FileDisplay};
use crate::editor::{edit, save_file, EditorForm, EditorView};
use crate::fs::{FileSystem, FsFactory, NodeReport};
use crate::listing::{home_directory, listdir, listdir_paged, FileFilter, Listing, ListingQuery};
use crate::ops::{display_form, submit, OpKind, OpOutcome};
use crate::paths::{basename, normpath, quote_path};
use crate::stats::{massage_stats, DisplayRecord, VIEW_URL_PREFIX};
use crate::upload::{upload, UploadDone, UploadForm, UploadedFile, FILE_FIELD};

pub const DOWNLOAD_CHUNK_SIZE: usize = 32 * 1024;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Shared state of the file browser routes.
#[derive(Clone)]
pub struct AppState {
    pub fs: Arc<dyn FsFactory>,
    pub settings: Arc<FileBrowserConfig>,
    pub auth: AuthConfig,
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    fn client(&self, user: &RequestUser) -> Box<dyn FileSystem> {
        self.fs.for_user(&user.username)
    }
}

/// Build the `/filebrowser` router.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/view/", get(view))
        .route("/view/*path", get(view))
        .route("/listdir/", get(listdir_view))
        .route("/listdir/*path", get(listdir_view))
        .route("/chooser/", get(chooser))
        .route("/chooser/*path", get(chooser))
        .route("/display/*path", get(display_view))
        .route("/download/*path", get(download))
        .route("/stat/", get(stat))
        .route("/stat/*path", get(stat))
        .route("/edit/*path", get(edit_view))
        .route("/save", post(save))
        .route(
            "/upload",
            get(upload_form)
                .post(upload_file)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/status", get(status));

    for kind in OpKind::ALL {
        router = router.route(
            &format!("/{}", kind.name()),
            get(
                move |State(state): State<AppState>,
                      user: RequestUser,
                      Query(query): Query<BTreeMap<String, String>>| {
                    op_form(state, user, kind, query)
                },
            )
            .post(
                move |State(state): State<AppState>,
                      user: RequestUser,
                      Query(query): Query<BTreeMap<String, String>>,
                      Form(form): Form<BTreeMap<String, String>>| {
                    op_submit(state, user, kind, query, form)
                },
            ),
        );
    }

    router.with_state(state)
}

/// Run blocking filesystem work off the async runtime.
async fn blocking<T, F>(work: F) -> ConsoleResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ConsoleResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ConsoleError::Internal(format!("Filesystem task failed: {e}")))?
}

/// Browsed path from the wildcard segment; the bare route means `/`.
fn browsed_path(path: Option<Path<String>>) -> String {
    let raw = path.map(|Path(p)| p).unwrap_or_default();
    normpath(&format!("/{raw}"))
}

/// Prefix filesystem failures with "Cannot access" and the superuser hint.
fn cannot_access(err: ConsoleError, path: &str, hint: &str) -> ConsoleError {
    let message = format!("Cannot access: {path}.{hint}");
    match err {
        ConsoleError::PermissionDenied(_) => ConsoleError::PermissionDenied(message),
        ConsoleError::Upstream { detail, .. } => ConsoleError::Upstream { message, detail },
        other => other,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub default_to_home: Option<String>,
}

fn view_inner(
    fs: &dyn FileSystem,
    settings: &FileBrowserConfig,
    user: &RequestUser,
    path: &str,
    listing: &ListingQuery,
    shown: &DisplayQuery,
) -> ConsoleResult<Response> {
    let stats = fs.stats(path)?;
    if stats.is_dir() {
        let listing = listdir_paged(fs, user, path, listing, settings.default_page_size)?;
        Ok(Json(listing).into_response())
    } else {
        let shown = display(fs, path, shown, &settings.site_encoding)?;
        Ok(Json(shown).into_response())
    }
}

async fn index(State(state): State<AppState>, user: RequestUser) -> ConsoleResult<Response> {
    blocking(move || {
        let fs = state.client(&user);
        let path = home_directory(fs.as_ref(), &user).unwrap_or_else(|| "/".to_string());
        view_inner(
            fs.as_ref(),
            &state.settings,
            &user,
            &path,
            &ListingQuery::default(),
            &DisplayQuery::default(),
        )
    })
    .await
}

async fn view(
    State(state): State<AppState>,
    user: RequestUser,
    path: Option<Path<String>>,
    Query(view_query): Query<ViewQuery>,
    Query(listing): Query<ListingQuery>,
    Query(shown): Query<DisplayQuery>,
) -> ConsoleResult<Response> {
    let path = browsed_path(path);
    blocking(move || {
        let fs = state.client(&user);
        if view_query.default_to_home.is_some() {
            if let Some(home) = home_directory(fs.as_ref(), &user) {
                return Ok(Redirect::to(&format!("{VIEW_URL_PREFIX}{}", quote_path(&home)))
                    .into_response());
            }
        }
        view_inner(fs.as_ref(), &state.settings, &user, &path, &listing, &shown)
            .map_err(|e| cannot_access(e, &path, &user.superuser_hint(fs.superuser())))
    })
    .await
}

#[derive(Debug, Default, Deserialize)]
pub struct ListdirQuery {
    pub file_filter: Option<String>,
    pub default_to_home: Option<String>,
}

impl ListdirQuery {
    fn file_filter(&self) -> ConsoleResult<FileFilter> {
        self.file_filter
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("any")
            .parse()
    }
}

async fn listdir_view(
    State(state): State<AppState>,
    user: RequestUser,
    path: Option<Path<String>>,
    Query(query): Query<ListdirQuery>,
) -> ConsoleResult<Json<Listing>> {
    let path = browsed_path(path);
    let file_filter = query.file_filter()?;
    blocking(move || {
        let fs = state.client(&user);
        listdir(fs.as_ref(), &user, &path, file_filter).map(Json)
    })
    .await
}

async fn chooser(
    State(state): State<AppState>,
    user: RequestUser,
    path: Option<Path<String>>,
    Query(query): Query<ListdirQuery>,
    Query(shown): Query<DisplayQuery>,
) -> ConsoleResult<Response> {
    let path = browsed_path(path);
    let file_filter = query.file_filter()?;
    blocking(move || {
        let fs = state.client(&user);
        if query.default_to_home.is_some() {
            if let Some(home) = home_directory(fs.as_ref(), &user) {
                return Ok(Json(listdir(fs.as_ref(), &user, &home, file_filter)?).into_response());
            }
        }

        if fs.isdir(&path) {
            Ok(Json(listdir(fs.as_ref(), &user, &path, file_filter)?).into_response())
        } else if fs.isfile(&path) {
            Ok(Json(display(fs.as_ref(), &path, &shown, &state.settings.site_encoding)?).into_response())
        } else {
            Err(ConsoleError::NotFound(format!("File not found: {path}")))
        }
    })
    .await
}

async fn display_view(
    State(state): State<AppState>,
    user: RequestUser,
    Path(path): Path<String>,
    Query(shown): Query<DisplayQuery>,
) -> ConsoleResult<Json<FileDisplay>> {
    let path = browsed_path(Some(Path(path)));
    blocking(move || {
        let fs = state.client(&user);
        display(fs.as_ref(), &path, &shown, &state.settings.site_encoding).map(Json)
    })
    .await
}

async fn stat(
    State(state): State<AppState>,
    user: RequestUser,
    path: Option<Path<String>>,
) -> ConsoleResult<Json<DisplayRecord>> {
    let path = browsed_path(path);
    blocking(move || {
        let fs = state.client(&user);
        if !fs.exists(&path) {
            return Err(ConsoleError::NotFound(format!("File not found: {path}")));
        }
        Ok(Json(massage_stats(&fs.stats(&path)?)))
    })
    .await
}

fn http_date(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|t| t.format(HTTP_DATE_FORMAT).to_string())
}

/// `false` when the client's copy, dated by `If-Modified-Since`, is still
/// current for a file last modified at `mtime`.
fn was_modified_since(header_value: Option<&HeaderValue>, mtime: i64) -> bool {
    let Some(since) = header_value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v.trim()).ok())
    else {
        return true;
    };
    mtime > since.timestamp()
}

async fn download(
    State(state): State<AppState>,
    user: RequestUser,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> ConsoleResult<Response> {
    let path = browsed_path(Some(Path(path)));
    let if_modified_since = headers.get(header::IF_MODIFIED_SINCE).cloned();

    let opened = {
        let path = path.clone();
        blocking(move || {
            let fs = state.client(&user);
            if !fs.exists(&path) {
                return Err(ConsoleError::NotFound(format!("File not found: {path}")));
            }
            if !fs.isfile(&path) {
                return Err(ConsoleError::invalid(format!("'{path}' is not a file")));
            }
            let stats = fs.stats(&path)?;
            if !was_modified_since(if_modified_since.as_ref(), stats.mtime) {
                return Ok((stats, None));
            }
            let handle = fs.open(&path)?;
            Ok((stats, Some(handle)))
        })
        .await?
    };

    let (stats, handle) = opened;
    let Some(mut handle) = handle else {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    };

    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(4);
    let reader_path = path.clone();
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        loop {
            match handle.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                        debug!("Download of {reader_path} cancelled by client");
                        break;
                    }
                }
                Err(e) => {
                    warn!("Could not read {reader_path} for download: {e}");
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    let response_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response_headers.insert(header::CONTENT_TYPE, value);
    }
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stats.size));
    if let Some(value) = http_date(stats.mtime).and_then(|d| HeaderValue::from_str(&d).ok()) {
        response_headers.insert(header::LAST_MODIFIED, value);
    }
    response_headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
pub struct EditQuery {
    pub encoding: Option<String>,
}

async fn edit_view(
    State(state): State<AppState>,
    user: RequestUser,
    Path(path): Path<String>,
    Query(query): Query<EditQuery>,
) -> ConsoleResult<Json<EditorView>> {
    let path = browsed_path(Some(Path(path)));
    let encoding = query
        .encoding
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| state.settings.site_encoding.clone());
    blocking(move || {
        let fs = state.client(&user);
        edit(fs.as_ref(), &path, &encoding).map(Json)
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct SaveResult {
    pub message: String,
    #[serde(flatten)]
    pub editor: EditorView,
}

async fn save(
    State(state): State<AppState>,
    user: RequestUser,
    Form(form): Form<EditorForm>,
) -> ConsoleResult<Json<SaveResult>> {
    if form.path.trim().is_empty() {
        return Err(ConsoleError::invalid("No path specified"));
    }
    let path = normpath(form.path.trim());
    let encoding = form
        .encoding
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| state.settings.site_encoding.clone());
    let contents = form.contents;

    blocking(move || {
        let fs = state.client(&user);
        save_file(fs.as_ref(), &path, &contents, &encoding)?;
        let editor = edit(fs.as_ref(), &path, &encoding)?;
        Ok(Json(SaveResult {
            message: format!("Saved {}.", basename(&path)),
            editor,
        }))
    })
    .await
}

async fn op_form(
    state: AppState,
    user: RequestUser,
    kind: OpKind,
    query: BTreeMap<String, String>,
) -> ConsoleResult<OpOutcome> {
    blocking(move || {
        let fs = state.client(&user);
        Ok(OpOutcome::Form(display_form(kind, fs.as_ref(), &user, &query)))
    })
    .await
}

async fn op_submit(
    state: AppState,
    user: RequestUser,
    kind: OpKind,
    query: BTreeMap<String, String>,
    form: BTreeMap<String, String>,
) -> ConsoleResult<OpOutcome> {
    blocking(move || {
        let fs = state.client(&user);
        submit(kind, fs.as_ref(), &user, &query, &form)
    })
    .await
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub dest: Option<String>,
    pub next: Option<String>,
}

async fn upload_form(Query(query): Query<UploadQuery>) -> Json<UploadForm> {
    let dest = query.dest.filter(|d| !d.is_empty());
    Json(UploadForm {
        next: dest.clone(),
        dest,
    })
}

async fn upload_file(
    State(state): State<AppState>,
    user: RequestUser,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ConsoleResult<Json<UploadDone>> {
    let mut file = None;
    let mut dest = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ConsoleError::invalid(format!("Malformed upload: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(FILE_FIELD) => {
                let name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ConsoleError::invalid(format!("Malformed upload: {e}")))?;
                file = Some(UploadedFile {
                    name,
                    data: data.to_vec(),
                });
            }
            Some("dest") => {
                dest = field
                    .text()
                    .await
                    .map_err(|e| ConsoleError::invalid(format!("Malformed upload: {e}")))?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ConsoleError::invalid("hdfs_file: This field is required."))?;
    let next = query.next.filter(|n| !n.is_empty());

    blocking(move || {
        let mut fs = state.client(&user);
        upload(fs.as_mut(), &state.settings.upload_tmp_dir, &user, &dest, &file, next).map(Json)
    })
    .await
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub name: String,
    pub health: String,
    pub msgs: Vec<String>,
    pub datanode_report: Vec<NodeReport>,
}

async fn status(State(state): State<AppState>, user: RequestUser) -> ConsoleResult<Json<StatusView>> {
    blocking(move || {
        let fs = state.client(&user);
        let status = fs.status()?;
        Ok(Json(StatusView {
            name: fs.name().to_string(),
            health: status.health,
            msgs: status.messages,
            datanode_report: status.datanode_report,
        }))
    })
    .await
}

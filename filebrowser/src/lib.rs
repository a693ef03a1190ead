//! Hue file browser
//!
//! Browse, view, edit and manipulate files of a filesystem through a
//! per-request [`fs::FileSystem`] client. Views are plain functions over
//! the client; [`handlers`] exposes them over HTTP.

pub mod display;
pub mod editor;
pub mod fs;
pub mod handlers;
pub mod listing;
pub mod ops;
pub mod paths;
pub mod reader;
pub mod stats;
pub mod upload;
pub mod xxd;

pub use handlers::{router, AppState};

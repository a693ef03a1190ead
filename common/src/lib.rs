//! Hue console common layer
//!
//! Configuration, the error taxonomy every view reports through, request
//! identity extraction and access auditing.

pub mod audit;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;

pub use error::{ConsoleError, ConsoleResult};
pub use identity::RequestUser;

/// Shorten `value` to `keep` characters, appending an ellipsis when cut.
pub fn truncate(value: &str, keep: usize) -> String {
    match value.char_indices().nth(keep) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

//! Requesting user, taken from the headers set by the authenticating proxy

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::config::AuthConfig;
use crate::error::ConsoleError;

/// The user on whose behalf a request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUser {
    pub username: String,
    /// Application-level admin. Distinct from the filesystem superuser.
    pub is_superuser: bool,
}

impl RequestUser {
    pub fn new(username: impl Into<String>, is_superuser: bool) -> Self {
        Self {
            username: username.into(),
            is_superuser,
        }
    }

    pub fn from_headers(headers: &HeaderMap, auth: &AuthConfig) -> Self {
        let username = headers
            .get(auth.user_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&auth.default_user)
            .to_string();

        let is_superuser = auth.trust_superuser_header
            && headers
                .get(auth.superuser_header.as_str())
                .and_then(|v| v.to_str().ok())
                .map(coerce_bool)
                .unwrap_or(false);

        Self {
            username,
            is_superuser,
        }
    }

    pub fn home_directory(&self) -> String {
        format!("/user/{}", self.username)
    }

    /// Message suffix for filesystem failures hit by an admin who is not
    /// the filesystem superuser.
    pub fn superuser_hint(&self, fs_superuser: &str) -> String {
        if self.is_superuser && self.username != fs_superuser {
            format!(
                " Note: you are a Hue admin but not a HDFS superuser (which is \"{fs_superuser}\")."
            )
        } else {
            String::new()
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ConsoleError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthConfig::from_ref(state);
        Ok(Self::from_headers(&parts.headers, &auth))
    }
}

/// Interpret a loosely-typed boolean query or header value.
pub fn coerce_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

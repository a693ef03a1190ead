//! Access audit events
//!
//! Security-relevant denials are emitted as warn-level events on the
//! `access` target so they can be routed to a dedicated sink by the
//! subscriber configuration (`RUST_LOG=access=warn,...`).

use tracing::warn;

use crate::identity::RequestUser;

/// Target used for every access audit event.
pub const ACCESS_TARGET: &str = "access";

/// Record that `user` was refused access to `resource`.
pub fn access_warn(user: &RequestUser, resource: &str, message: &str) {
    warn!(
        target: ACCESS_TARGET,
        user = %user.username,
        superuser = user.is_superuser,
        resource,
        "{message}"
    );
}

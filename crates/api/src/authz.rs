//! API-side authorization guard.
//!
//! Every protected handler calls [`require`] before touching the store, so
//! the store and domain crates stay auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use stockroom_auth::{Permission, PolicyTable, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// Check `permission` for the current caller; a 403 response on denial.
pub fn require(
    policy: &PolicyTable,
    principal: &PrincipalContext,
    permission: &Permission,
) -> Result<(), Response> {
    authorize(policy, principal.principal(), permission)
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

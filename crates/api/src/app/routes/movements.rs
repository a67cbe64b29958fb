use std::sync::Arc;

use axum::{
    extract::{Extension, Query, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockroom_auth::Permission;

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_movements))
}

/// Movement history, newest first.
pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::MovementListQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::MOVEMENTS_VIEW)?;
    let query = dto::query(query)?;
    let filter = query.filter()?;
    let page = services
        .store
        .list_movements(&filter, query.pagination())
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(page).into_response())
}

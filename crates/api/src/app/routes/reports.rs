use std::sync::Arc;

use axum::{
    extract::{Extension, Query, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockroom_auth::Permission;
use stockroom_infra::reporting;

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/summary", get(summary))
        .route("/low-stock", get(low_stock))
        .route("/movement-totals", get(movement_totals))
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_VIEW)?;
    let summary = reporting::dashboard_summary(services.store.as_ref())
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(summary).into_response())
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_VIEW)?;
    let items = services
        .store
        .low_stock_products()
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

pub async fn movement_totals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::DateRangeQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_VIEW)?;
    let range = dto::query(query)?.range()?;
    let totals = reporting::movement_totals(services.store.as_ref(), range)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(serde_json::json!({
        "entries": totals.entries,
        "exits": totals.exits,
        "net": totals.net().to_string(),
    }))
    .into_response())
}

//! CSV import and streamed CSV export.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Extension, Query, rejection::QueryRejection},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio_stream::StreamExt;

use stockroom_auth::Permission;
use stockroom_infra::{export, import_products};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub fn router() -> Router {
    Router::new()
        .route("/import/products", post(import))
        .route("/export/products.csv", get(export_products))
        .route("/export/movements.csv", get(export_movements))
}

/// Body is the raw CSV file.
pub async fn import(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Bytes,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_ADD)?;
    let report = import_products(services.store.as_ref(), &body)
        .await
        .map_err(errors::import_error_to_response)?;
    Ok(Json(report).into_response())
}

pub async fn export_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ProductListQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_VIEW)?;
    let filter = dto::query(query)?.filter()?;
    let rows = export::export_products(services.store.as_ref(), filter);
    Ok(csv_response(rows, "productos.csv"))
}

pub async fn export_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::MovementListQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::MOVEMENTS_VIEW)?;
    let filter = dto::query(query)?.filter()?;
    let rows = export::export_movements(services.store.as_ref(), filter);
    Ok(csv_response(rows, "movimientos_stock.csv"))
}

/// Streams the chunks as they are produced; a mid-stream error ends the body.
fn csv_response(rows: export::CsvStream, filename: &str) -> axum::response::Response {
    let body = Body::from_stream(rows.map(|chunk| chunk.map(Bytes::from)));
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
        ],
        body,
    )
        .into_response()
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_auth::Permission;
use stockroom_catalog::{NewSupplier, SupplierChanges};
use stockroom_core::SupplierId;

use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::app::dto;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route("/:id", get(get_supplier).patch(update_supplier).delete(delete_supplier))
        .route("/:id/deactivate", post(deactivate_supplier))
        .route("/:id/activate", post(activate_supplier))
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::SUPPLIERS_VIEW)?;
    let query = dto::query(query)?;
    let page = services
        .store
        .list_suppliers(query.pagination())
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(page).into_response())
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewSupplier>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::SUPPLIERS_ADD)?;
    let draft = dto::json_body(body)?;
    let supplier = services
        .store
        .create_supplier(draft)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok((StatusCode::CREATED, Json(supplier)).into_response())
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::SUPPLIERS_VIEW)?;
    let id: SupplierId = dto::parse_id(&id)?;
    let supplier = services
        .store
        .get_supplier(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(supplier).into_response())
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<SupplierChanges>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::SUPPLIERS_CHANGE)?;
    let id: SupplierId = dto::parse_id(&id)?;
    let changes = dto::json_body(body)?;
    let supplier = services
        .store
        .update_supplier(id, changes)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(supplier).into_response())
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::SUPPLIERS_DELETE)?;
    let id: SupplierId = dto::parse_id(&id)?;
    services
        .store
        .delete_supplier(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn deactivate_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    set_active(services, principal, id, false).await
}

pub async fn activate_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    set_active(services, principal, id, true).await
}

async fn set_active(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    active: bool,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::SUPPLIERS_CHANGE)?;
    let id: SupplierId = dto::parse_id(&id)?;
    let supplier = services
        .store
        .set_supplier_active(id, active)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(supplier).into_response())
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use stockroom_auth::Permission;
use stockroom_catalog::{NewProduct, ProductChanges, parse_count};
use stockroom_core::ProductId;
use stockroom_infra::{MovementRequest, ProductView};
use stockroom_ledger::{MovementKind, Quantity};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).patch(update_product).delete(delete_product))
        .route("/:id/deactivate", post(deactivate_product))
        .route("/:id/activate", post(activate_product))
        .route("/:id/baseline", put(set_baseline))
        .route("/:id/entries", post(record_entry))
        .route("/:id/exits", post(record_exit))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ProductListQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_VIEW)?;
    let query = dto::query(query)?;
    let filter = query.filter()?;
    let page = services
        .store
        .list_products(&filter, query.pagination())
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(page).into_response())
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_ADD)?;
    let draft = dto::json_body(body)?;
    let product = services
        .store
        .create_product(draft)
        .await
        .map_err(errors::store_error_to_response)?;
    let view = fetch_view(&services, product.id_typed()).await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_VIEW)?;
    let id: ProductId = dto::parse_id(&id)?;
    Ok(Json(fetch_view(&services, id).await?).into_response())
}

pub async fn get_product_by_sku(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(sku): Path<String>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_VIEW)?;
    let view = services
        .store
        .get_product_by_sku(&sku)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(view).into_response())
}

/// Edits catalog fields only; a `stock` key in the body is rejected.
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ProductChanges>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_CHANGE)?;
    let id: ProductId = dto::parse_id(&id)?;
    let changes = dto::json_body(body)?;
    services
        .store
        .update_product(id, changes)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(fetch_view(&services, id).await?).into_response())
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_DELETE)?;
    let id: ProductId = dto::parse_id(&id)?;
    services
        .store
        .delete_product(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn deactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    set_active(services, principal, id, false).await
}

pub async fn activate_product(
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
    require(&services.policy, &principal, &Permission::PRODUCTS_CHANGE)?;
    let id: ProductId = dto::parse_id(&id)?;
    services
        .store
        .set_product_active(id, active)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(fetch_view(&services, id).await?).into_response())
}

/// Overwrites stock without a movement record (opening balance / recount).
pub async fn set_baseline(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::BaselineBody>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::PRODUCTS_CHANGE)?;
    let id: ProductId = dto::parse_id(&id)?;
    let body = dto::json_body(body)?;
    let stock = parse_count("stock", body.stock).map_err(errors::domain_error_to_response)?;
    services
        .store
        .set_baseline_stock(id, stock)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(fetch_view(&services, id).await?).into_response())
}

pub async fn record_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::MovementBody>, JsonRejection>,
) -> ApiResult {
    record_movement(services, principal, id, MovementKind::Entry, body).await
}

pub async fn record_exit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::MovementBody>, JsonRejection>,
) -> ApiResult {
    record_movement(services, principal, id, MovementKind::Exit, body).await
}

async fn record_movement(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    kind: MovementKind,
    body: Result<Json<dto::MovementBody>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::MOVEMENTS_ADD)?;
    let product_id: ProductId = dto::parse_id(&id)?;
    let body = dto::json_body(body)?;
    let quantity = Quantity::new(body.quantity).map_err(errors::ledger_error_to_response)?;

    let movement = services
        .store
        .apply_movement(MovementRequest {
            product_id,
            kind,
            quantity,
            reason: body.reason,
            actor: Some(principal.actor()),
        })
        .await
        .map_err(errors::store_error_to_response)?;
    Ok((StatusCode::CREATED, Json(movement)).into_response())
}

async fn fetch_view(services: &AppServices, id: ProductId) -> Result<ProductView, axum::response::Response> {
    services
        .store
        .get_product(id)
        .await
        .map_err(errors::store_error_to_response)
}

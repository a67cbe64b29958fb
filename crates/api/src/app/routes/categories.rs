use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_auth::Permission;
use stockroom_catalog::{CategoryChanges, NewCategory};
use stockroom_core::CategoryId;

use crate::app::errors::{self, ApiResult};
use crate::app::services::AppServices;
use crate::app::dto;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", get(get_category).patch(update_category).delete(delete_category))
        .route("/:id/deactivate", post(deactivate_category))
        .route("/:id/activate", post(activate_category))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::CATEGORIES_VIEW)?;
    let query = dto::query(query)?;
    let page = services
        .store
        .list_categories(query.pagination())
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(page).into_response())
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::CATEGORIES_ADD)?;
    let draft = dto::json_body(body)?;
    let category = services
        .store
        .create_category(draft)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok((StatusCode::CREATED, Json(category)).into_response())
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::CATEGORIES_VIEW)?;
    let id: CategoryId = dto::parse_id(&id)?;
    let category = services
        .store
        .get_category(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(category).into_response())
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<CategoryChanges>, JsonRejection>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::CATEGORIES_CHANGE)?;
    let id: CategoryId = dto::parse_id(&id)?;
    let changes = dto::json_body(body)?;
    let category = services
        .store
        .update_category(id, changes)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(category).into_response())
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.policy, &principal, &Permission::CATEGORIES_DELETE)?;
    let id: CategoryId = dto::parse_id(&id)?;
    services
        .store
        .delete_category(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn deactivate_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    set_active(services, principal, id, false).await
}

pub async fn activate_category(
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
    require(&services.policy, &principal, &Permission::CATEGORIES_CHANGE)?;
    let id: CategoryId = dto::parse_id(&id)?;
    let category = services
        .store
        .set_category_active(id, active)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(category).into_response())
}

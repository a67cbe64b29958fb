use axum::{Router, routing::get};

pub mod categories;
pub mod movements;
pub mod products;
pub mod reports;
pub mod suppliers;
pub mod system;
pub mod transfer;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/categories", categories::router())
        .nest("/suppliers", suppliers::router())
        .nest("/products", products::router())
        .route("/skus/:sku", get(products::get_product_by_sku))
        .nest("/movements", movements::router())
        .nest("/reports", reports::router())
        .merge(transfer::router())
}

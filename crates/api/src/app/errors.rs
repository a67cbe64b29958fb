use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use stockroom_core::DomainError;
use stockroom_infra::{ImportError, StoreError};
use stockroom_ledger::LedgerError;

/// Handler result: both arms are complete responses.
pub type ApiResult = Result<axum::response::Response, axum::response::Response>;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::Ledger(e) => ledger_error_to_response(e),
        StoreError::Backend(msg) => {
            error!(error = %msg, "storage backend failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage backend failure")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Duplicate { .. } => json_error(StatusCode::CONFLICT, "duplicate", message),
        DomainError::ReferentialIntegrity { .. } => {
            json_error(StatusCode::CONFLICT, "referential_integrity", message)
        }
    }
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        LedgerError::InvalidQuantity(_) => json_error(StatusCode::BAD_REQUEST, "invalid_quantity", message),
        LedgerError::ReasonTooLong { .. } => json_error(StatusCode::BAD_REQUEST, "validation", message),
        LedgerError::UnknownProduct(_) => json_error(StatusCode::NOT_FOUND, "unknown_product", message),
        LedgerError::InsufficientStock { requested, available } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": message,
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        LedgerError::StockOverflow { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "stock_overflow", message)
        }
    }
}

pub fn import_error_to_response(err: ImportError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_csv", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::ProductId;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (StoreError::from(DomainError::validation("x")), StatusCode::BAD_REQUEST),
            (DomainError::not_found("product", "X1").into(), StatusCode::NOT_FOUND),
            (DomainError::duplicate("product", "sku", "X1").into(), StatusCode::CONFLICT),
            (DomainError::in_use("category", "Oficina", 2, "products").into(), StatusCode::CONFLICT),
            (LedgerError::InvalidQuantity(0).into(), StatusCode::BAD_REQUEST),
            (LedgerError::UnknownProduct(ProductId::new()).into(), StatusCode::NOT_FOUND),
            (
                LedgerError::InsufficientStock { requested: 20, available: 15 }.into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (StoreError::backend("pool closed"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(store_error_to_response(err).status(), status);
        }
    }
}

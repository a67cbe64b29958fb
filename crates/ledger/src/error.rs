use thiserror::Error;

use stockroom_core::ProductId;

/// Rejections produced by the ledger. A rejected movement changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("quantity must be a positive whole number (got {0})")]
    InvalidQuantity(i64),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("reason is {actual} characters long (max {max})")]
    ReasonTooLong { max: usize, actual: usize },

    #[error("stock overflow: {current} + {quantity} does not fit")]
    StockOverflow { current: u32, quantity: u32 },
}

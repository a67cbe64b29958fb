//! Store-level error model.

use thiserror::Error;

use stockroom_core::DomainError;
use stockroom_ledger::LedgerError;

/// Error returned by every [`InventoryStore`](crate::store::InventoryStore)
/// operation.
///
/// `Domain` and `Ledger` are caller-correctable; `Backend` covers storage
/// failures (connection loss, poisoned locks, unexpected rows).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

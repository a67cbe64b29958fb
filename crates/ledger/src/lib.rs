//! Stock ledger domain.
//!
//! Decides whether a stock movement may be applied to a product and what the
//! resulting quantity is. Pure logic only: the stores in `stockroom-infra`
//! execute an approved [`PlannedMovement`] inside their own atomic unit.

pub mod engine;
pub mod error;
pub mod movement;

pub use engine::{PlannedMovement, plan_movement, replay};
pub use error::LedgerError;
pub use movement::{Actor, MovementKind, Quantity, REASON_MAX_CHARS, StockMovement};

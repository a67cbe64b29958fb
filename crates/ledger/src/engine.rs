use chrono::{DateTime, Utc};
use tracing::warn;

use stockroom_catalog::Product;
use stockroom_core::{MovementId, ProductId};

use crate::error::LedgerError;
use crate::movement::{Actor, MovementKind, Quantity, REASON_MAX_CHARS, StockMovement};

/// An approved movement, not yet written.
///
/// Produced by [`plan_movement`] from a product snapshot. A store must apply
/// it while still holding whatever lock produced that snapshot, otherwise
/// `stock_before` may be stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMovement {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub reason: String,
    pub actor: Option<Actor>,
    pub stock_before: u32,
    pub stock_after: u32,
}

impl PlannedMovement {
    /// Product with its stock set to `stock_after`.
    pub fn apply_to(&self, product: Product) -> Product {
        let mut parts = product.into_parts();
        parts.stock = self.stock_after;
        Product::from_parts(parts)
    }

    /// Seal the plan into the immutable record once the store has assigned
    /// an id and timestamp.
    pub fn record(self, id: MovementId, created_at: DateTime<Utc>) -> StockMovement {
        StockMovement::restore(
            id,
            self.product_id,
            self.kind,
            self.quantity,
            self.reason,
            self.actor,
            self.stock_after,
            created_at,
        )
    }
}

/// Decide whether `kind`/`quantity` may be applied to `product`.
///
/// Entries always succeed (barring `u32` overflow). Exits fail with
/// [`LedgerError::InsufficientStock`] carrying the current stock when the
/// quantity exceeds it. The reason is trimmed and must fit 255 characters.
pub fn plan_movement(
    product: &Product,
    kind: MovementKind,
    quantity: Quantity,
    reason: &str,
    actor: Option<Actor>,
) -> Result<PlannedMovement, LedgerError> {
    let reason = reason.trim();
    let reason_chars = reason.chars().count();
    if reason_chars > REASON_MAX_CHARS {
        return Err(LedgerError::ReasonTooLong {
            max: REASON_MAX_CHARS,
            actual: reason_chars,
        });
    }

    let current = product.stock();
    let stock_after = next_stock(current, kind, quantity).inspect_err(|err| {
        warn!(
            product_id = %product.id_typed(),
            sku = product.sku(),
            kind = kind.as_str(),
            quantity = quantity.get(),
            stock = current,
            error = %err,
            "stock movement rejected"
        );
    })?;

    Ok(PlannedMovement {
        product_id: product.id_typed(),
        kind,
        quantity,
        reason: reason.to_string(),
        actor,
        stock_before: current,
        stock_after,
    })
}

fn next_stock(current: u32, kind: MovementKind, quantity: Quantity) -> Result<u32, LedgerError> {
    let q = quantity.get();
    match kind {
        MovementKind::Entry => current
            .checked_add(q)
            .ok_or(LedgerError::StockOverflow { current, quantity: q }),
        MovementKind::Exit => current.checked_sub(q).ok_or(LedgerError::InsufficientStock {
            requested: q,
            available: current,
        }),
    }
}

/// Recompute stock from a baseline and a movement history, oldest first.
///
/// Used to reconcile recorded history against the stored quantity. A history
/// produced by the ledger always replays cleanly.
pub fn replay<'a, I>(baseline: u32, movements: I) -> Result<u32, LedgerError>
where
    I: IntoIterator<Item = &'a StockMovement>,
{
    movements
        .into_iter()
        .try_fold(baseline, |stock, m| next_stock(stock, m.kind(), m.quantity()))
}

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, Entity, MovementId, ProductId, UserId};

use crate::error::LedgerError;

pub const REASON_MAX_CHARS: usize = 255;

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Entry,
    Exit,
}

impl MovementKind {
    /// Stable code used in storage and query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Entry => "ENTRY",
            MovementKind::Exit => "EXIT",
        }
    }

    /// Human label used in exported reports.
    pub fn label(self) -> &'static str {
        match self {
            MovementKind::Entry => "Entrada",
            MovementKind::Exit => "Salida",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTRY" => Ok(MovementKind::Entry),
            "EXIT" => Ok(MovementKind::Exit),
            other => Err(DomainError::validation(format!(
                "unknown movement kind '{other}' (expected ENTRY or EXIT)"
            ))),
        }
    }
}

/// Strictly positive movement quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, LedgerError> {
        match u32::try_from(value) {
            Ok(q) if q > 0 => Ok(Self(q)),
            _ => Err(LedgerError::InvalidQuantity(value)),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = LedgerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Snapshot of the user who recorded a movement.
///
/// Stored by value so history survives removal of the user upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub username: String,
}

/// Immutable, append-only ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    id: MovementId,
    product_id: ProductId,
    kind: MovementKind,
    quantity: Quantity,
    reason: String,
    actor: Option<Actor>,
    stock_after: u32,
    created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Rebuild from persisted fields (storage adapters only).
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: MovementId,
        product_id: ProductId,
        kind: MovementKind,
        quantity: Quantity,
        reason: String,
        actor: Option<Actor>,
        stock_after: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            kind,
            quantity,
            reason,
            actor,
            stock_after,
            created_at,
        }
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn stock_after(&self) -> u32 {
        self.stock_after
    }

    /// Signed effect on stock: `+q` for entries, `-q` for exits.
    pub fn delta(&self) -> i64 {
        match self.kind {
            MovementKind::Entry => i64::from(self.quantity.get()),
            MovementKind::Exit => -i64::from(self.quantity.get()),
        }
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        assert_eq!(Quantity::new(0), Err(LedgerError::InvalidQuantity(0)));
        assert_eq!(Quantity::new(-4), Err(LedgerError::InvalidQuantity(-4)));
        assert_eq!(Quantity::new(7).unwrap().get(), 7);
    }

    #[test]
    fn quantity_beyond_u32_is_invalid() {
        let too_big = i64::from(u32::MAX) + 1;
        assert_eq!(Quantity::new(too_big), Err(LedgerError::InvalidQuantity(too_big)));
    }

    #[test]
    fn kind_parses_case_insensitively_and_labels_in_spanish() {
        assert_eq!("entry".parse::<MovementKind>().unwrap(), MovementKind::Entry);
        assert_eq!(" EXIT ".parse::<MovementKind>().unwrap(), MovementKind::Exit);
        assert!("transfer".parse::<MovementKind>().is_err());
        assert_eq!(MovementKind::Entry.label(), "Entrada");
        assert_eq!(MovementKind::Exit.label(), "Salida");
    }

    #[test]
    fn kind_serializes_as_code() {
        assert_eq!(serde_json::to_string(&MovementKind::Exit).unwrap(), "\"EXIT\"");
    }
}

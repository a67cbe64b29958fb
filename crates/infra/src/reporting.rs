//! Dashboard aggregates composed from the store's reporting reads.

use rust_decimal::Decimal;
use serde::Serialize;

use stockroom_ledger::MovementKind;

use crate::error::StoreResult;
use crate::query::DateRange;
use crate::store::{CatalogCounts, CategoryCount, InventoryStore};

/// Home-page figures for the whole inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    #[serde(flatten)]
    pub counts: CatalogCounts,
    pub low_stock_count: u64,
    pub total_entries: u64,
    pub total_exits: u64,
    pub inventory_value: Decimal,
    pub category_distribution: Vec<CategoryCount>,
}

/// Quantity moved in and out over a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MovementTotals {
    pub entries: u64,
    pub exits: u64,
}

impl MovementTotals {
    /// Entries minus exits.
    pub fn net(&self) -> i128 {
        i128::from(self.entries) - i128::from(self.exits)
    }
}

pub async fn movement_totals(store: &dyn InventoryStore, range: DateRange) -> StoreResult<MovementTotals> {
    Ok(MovementTotals {
        entries: store.movement_totals(MovementKind::Entry, range).await?,
        exits: store.movement_totals(MovementKind::Exit, range).await?,
    })
}

/// Reads every figure independently; the result is not a single snapshot.
pub async fn dashboard_summary(store: &dyn InventoryStore) -> StoreResult<DashboardSummary> {
    let counts = store.catalog_counts().await?;
    let low_stock_count = store.low_stock_products().await?.len() as u64;
    let totals = movement_totals(store, DateRange::default()).await?;
    let inventory_value = store.inventory_value().await?;
    let category_distribution = store.category_distribution().await?;

    Ok(DashboardSummary {
        counts,
        low_stock_count,
        total_entries: totals.entries,
        total_exits: totals.exits,
        inventory_value,
        category_distribution,
    })
}

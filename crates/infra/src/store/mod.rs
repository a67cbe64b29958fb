//! Inventory store boundary.
//!
//! One trait covers the catalog, the stock ledger and the read side so that a
//! single backend owns the atomic unit shared by a stock update and its
//! movement record. Two implementations exist: [`InMemoryInventoryStore`]
//! (tests/dev) and [`PostgresInventoryStore`] (production).

pub mod in_memory;
pub mod postgres;

use std::pin::Pin;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_stream::Stream;

use stockroom_catalog::{
    Category, CategoryChanges, NewCategory, NewProduct, NewSupplier, Product, ProductChanges,
    Supplier, SupplierChanges,
};
use stockroom_core::{CategoryId, Price, ProductId, SupplierId};
use stockroom_ledger::{Actor, MovementKind, Quantity, StockMovement};

use crate::error::{StoreError, StoreResult};
use crate::query::{
    CategorySummary, DateRange, MovementFilter, MovementView, Page, Pagination, ProductFilter,
    ProductView, SupplierSummary,
};

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

/// Lazy, finite, single-pass sequence of rows.
pub type RowStream<T> = Pin<Box<dyn Stream<Item = StoreResult<T>> + Send + 'static>>;

/// A stock movement request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: Quantity,
    pub reason: String,
    pub actor: Option<Actor>,
}

/// One parsed bulk-import row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub name: String,
    pub sku: String,
    pub category: String,
    pub supplier: String,
    pub price: Price,
    /// Baseline stock (written directly, no movement record).
    pub stock: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Number of products, categories and suppliers in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub products: u64,
    pub categories: u64,
    pub suppliers: u64,
}

/// Product count of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category_id: CategoryId,
    pub name: String,
    pub product_count: u64,
}

/// Storage for the catalog and the stock ledger.
///
/// ## Stock mutation
///
/// Only [`apply_movement`](Self::apply_movement) and the labeled
/// [`set_baseline_stock`](Self::set_baseline_stock) (plus the baseline written
/// by product creation and import) change a product's stock. `apply_movement`
/// must check, update and record in one atomic unit that is serialized per
/// product.
///
/// ## Lookups
///
/// `get_*` operations return `DomainError::NotFound` for missing ids.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    // Categories
    async fn create_category(&self, draft: NewCategory) -> StoreResult<Category>;
    async fn update_category(&self, id: CategoryId, changes: CategoryChanges) -> StoreResult<Category>;
    async fn set_category_active(&self, id: CategoryId, active: bool) -> StoreResult<Category>;
    /// Fails with `ReferentialIntegrity` while any product references it.
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()>;
    async fn get_category(&self, id: CategoryId) -> StoreResult<Category>;
    /// Ordered by name, annotated with product counts.
    async fn list_categories(&self, pagination: Pagination) -> StoreResult<Page<CategorySummary>>;
    async fn get_or_create_category(&self, name: &str) -> StoreResult<Category>;

    // Suppliers
    async fn create_supplier(&self, draft: NewSupplier) -> StoreResult<Supplier>;
    async fn update_supplier(&self, id: SupplierId, changes: SupplierChanges) -> StoreResult<Supplier>;
    async fn set_supplier_active(&self, id: SupplierId, active: bool) -> StoreResult<Supplier>;
    /// Fails with `ReferentialIntegrity` while any product references it.
    async fn delete_supplier(&self, id: SupplierId) -> StoreResult<()>;
    async fn get_supplier(&self, id: SupplierId) -> StoreResult<Supplier>;
    async fn list_suppliers(&self, pagination: Pagination) -> StoreResult<Page<SupplierSummary>>;
    async fn get_or_create_supplier(&self, name: &str) -> StoreResult<Supplier>;

    // Products
    /// Creates the product with `initial_stock` as baseline; no movement is recorded.
    async fn create_product(&self, draft: NewProduct) -> StoreResult<Product>;
    /// Never touches stock.
    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> StoreResult<Product>;
    async fn set_product_active(&self, id: ProductId, active: bool) -> StoreResult<Product>;
    /// Fails with `ReferentialIntegrity` if the product has movement history.
    async fn delete_product(&self, id: ProductId) -> StoreResult<()>;
    async fn get_product(&self, id: ProductId) -> StoreResult<ProductView>;
    async fn get_product_by_sku(&self, sku: &str) -> StoreResult<ProductView>;
    /// Ordered by name, then SKU.
    async fn list_products(&self, filter: &ProductFilter, pagination: Pagination) -> StoreResult<Page<ProductView>>;
    /// Overwrite stock without a movement record (physical count, data fix).
    async fn set_baseline_stock(&self, id: ProductId, stock: u32) -> StoreResult<Product>;
    /// Get-or-create category and supplier, then create or update the product
    /// by SKU, as one atomic unit. Updates keep `min_stock` and `is_active`.
    async fn upsert_product_from_import(&self, row: ImportRow) -> StoreResult<(Product, UpsertOutcome)>;

    // Ledger
    /// Validate and apply one movement. On success the stock update and the
    /// movement record are committed together.
    async fn apply_movement(&self, request: MovementRequest) -> StoreResult<StockMovement>;
    /// Newest first (created_at desc, id desc).
    async fn list_movements(&self, filter: &MovementFilter, pagination: Pagination) -> StoreResult<Page<MovementView>>;

    // Reporting reads
    /// Active products with `stock <= min_stock`, ordered by name.
    async fn low_stock_products(&self) -> StoreResult<Vec<ProductView>>;
    /// Σ stock × price over all products.
    async fn inventory_value(&self) -> StoreResult<Decimal>;
    /// Σ quantity of movements of `kind` inside `range`.
    async fn movement_totals(&self, kind: MovementKind, range: DateRange) -> StoreResult<u64>;
    /// Categories with at least one product, ordered by name.
    async fn category_distribution(&self) -> StoreResult<Vec<CategoryCount>>;
    async fn catalog_counts(&self) -> StoreResult<CatalogCounts>;

    // Export
    /// Products matching `filter`, ordered by name then SKU.
    fn stream_products(&self, filter: ProductFilter) -> RowStream<ProductView>;
    /// Movements matching `filter`, newest first.
    fn stream_movements(&self, filter: MovementFilter) -> RowStream<MovementView>;
}

/// A product draft names a category or supplier that does not exist.
pub(crate) fn unknown_reference(entity: &str, id: impl core::fmt::Display) -> StoreError {
    stockroom_core::DomainError::validation(format!("unknown {entity} {id}")).into()
}

//! Infrastructure layer: stores, configuration, CSV import/export, reporting.

pub mod config;
pub mod error;
pub mod export;
pub mod import;
mod integration_tests;
pub mod query;
pub mod reporting;
pub mod seed;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::{StoreError, StoreResult};
pub use import::{ImportError, ImportReport, RowError, import_products};
pub use query::{
    CategorySummary, DateRange, MovementFilter, MovementView, Page, Pagination, ProductFilter,
    ProductView, SupplierSummary,
};
pub use reporting::{DashboardSummary, MovementTotals, dashboard_summary};
pub use store::{
    CatalogCounts, CategoryCount, ImportRow, InMemoryInventoryStore, InventoryStore,
    MovementRequest, PostgresInventoryStore, RowStream, UpsertOutcome,
};

//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` | `Domain(Duplicate)` | Unique name/SKU taken (including concurrent inserts) |
//! | `23503` | `Domain(Validation)` | Foreign key race (explicit reference checks run first) |
//! | `23514` | `Domain(Validation)` | Check constraint (e.g. `stock >= 0`) |
//! | Any other / pool / IO | `Backend` | Connection failures, decode errors |
//!
//! ## Stock mutation
//!
//! `apply_movement` runs in one transaction: the product row is locked with
//! `SELECT ... FOR UPDATE`, the ledger plans the movement against the locked
//! stock, then the stock `UPDATE` and the movement `INSERT` commit together.
//! Concurrent movements on the same product therefore serialize; the
//! `CHECK (stock >= 0)` constraint is the last line behind the ledger.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgConnection, PgDatabaseError, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument};
use uuid::Uuid;

use stockroom_catalog::{
    Category, CategoryChanges, NewCategory, NewProduct, NewSupplier, Product, ProductChanges,
    ProductParts, Supplier, SupplierChanges,
};
use stockroom_core::{CategoryId, DomainError, MovementId, Price, ProductId, SupplierId, UserId};
use stockroom_ledger::{Actor, LedgerError, MovementKind, Quantity, StockMovement, plan_movement};

use super::{
    CatalogCounts, CategoryCount, ImportRow, InventoryStore, MovementRequest, RowStream,
    UpsertOutcome, unknown_reference,
};
use crate::error::{StoreError, StoreResult};
use crate::query::{
    CategorySummary, DateRange, MovementFilter, MovementView, Page, Pagination, ProductFilter,
    ProductView, SupplierSummary,
};

/// Schema applied by [`PostgresInventoryStore::migrate`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Rows buffered between a streaming query and its consumer.
const STREAM_BUFFER: usize = 64;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

const CATEGORY_COLUMNS: &str = "id, name, description, is_active, created_at";
const SUPPLIER_COLUMNS: &str =
    "id, name, contact_name, email, phone, address, is_active, created_at";
const PRODUCT_COLUMNS: &str =
    "id, name, sku, category_id, supplier_id, stock, min_stock, price, is_active, created_at";

const PRODUCT_VIEW_SELECT: &str = r#"
    SELECT
        p.id, p.name, p.sku, p.category_id, p.supplier_id, p.stock, p.min_stock,
        p.price, p.is_active, p.created_at,
        c.name AS category_name,
        s.name AS supplier_name
    FROM products p
    JOIN categories c ON c.id = p.category_id
    JOIN suppliers s ON s.id = p.supplier_id
"#;

/// Binds `$1..$5` from a [`ProductFilter`] (see `bind_product_filter`).
const PRODUCT_FILTER: &str = r#"
    ($1::text IS NULL OR p.name ILIKE $1)
    AND ($2::text IS NULL OR p.sku ILIKE $2)
    AND ($3::uuid IS NULL OR p.category_id = $3)
    AND ($4::uuid IS NULL OR p.supplier_id = $4)
    AND (NOT $5 OR p.stock <= p.min_stock)
"#;

const MOVEMENT_VIEW_SELECT: &str = r#"
    SELECT
        m.id, m.product_id, m.kind, m.quantity, m.reason, m.actor_id, m.actor_username,
        m.stock_after, m.created_at,
        p.name AS product_name,
        p.sku AS product_sku,
        c.name AS category_name
    FROM stock_movements m
    JOIN products p ON p.id = m.product_id
    JOIN categories c ON c.id = p.category_id
"#;

/// Binds `$1..$4` from a [`MovementFilter`] (see `bind_movement_filter`).
const MOVEMENT_FILTER: &str = r#"
    ($1::uuid IS NULL OR m.product_id = $1)
    AND ($2::text IS NULL OR m.kind = $2)
    AND ($3::timestamptz IS NULL OR m.created_at >= $3)
    AND ($4::timestamptz IS NULL OR m.created_at < $4)
"#;

/// Postgres-backed inventory store.
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
/// Multi-statement writes run in a transaction.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    /// Create a new store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the (idempotent) schema.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_category(conn: &mut PgConnection, id: CategoryId, lock: bool) -> StoreResult<Category> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("fetch_category", e))?
            .ok_or_else(|| DomainError::not_found("category", id))?;
        category_from_row(&row).map_err(|e| map_sqlx_error("decode_category", e))
    }

    async fn fetch_supplier(conn: &mut PgConnection, id: SupplierId, lock: bool) -> StoreResult<Supplier> {
        let sql = format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("fetch_supplier", e))?
            .ok_or_else(|| DomainError::not_found("supplier", id))?;
        supplier_from_row(&row).map_err(|e| map_sqlx_error("decode_supplier", e))
    }

    async fn fetch_product_for_update(conn: &mut PgConnection, id: ProductId) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("fetch_product", e))?;
        row.map(|r| product_from_row(&r).map_err(|e| map_sqlx_error("decode_product", e)))
            .transpose()
    }

    async fn fetch_product_view(&self, clause: &str, key: Uuid, sku: Option<&str>) -> StoreResult<Option<ProductView>> {
        let sql = format!("{PRODUCT_VIEW_SELECT} WHERE {clause}");
        let query = match sku {
            Some(sku) => sqlx::query(&sql).bind(sku.to_string()),
            None => sqlx::query(&sql).bind(key),
        };
        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_product_view", e))?;
        row.map(|r| product_view_from_row(&r).map_err(|e| map_sqlx_error("decode_product", e)))
            .transpose()
    }

    async fn ensure_references(
        conn: &mut PgConnection,
        category_id: CategoryId,
        supplier_id: SupplierId,
    ) -> StoreResult<()> {
        let row = sqlx::query(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM categories WHERE id = $1) AS category_exists,
                EXISTS (SELECT 1 FROM suppliers WHERE id = $2) AS supplier_exists
            "#,
        )
        .bind(category_id.as_uuid())
        .bind(supplier_id.as_uuid())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("ensure_references", e))?;

        let category_exists: bool = row
            .try_get("category_exists")
            .map_err(|e| map_sqlx_error("ensure_references", e))?;
        let supplier_exists: bool = row
            .try_get("supplier_exists")
            .map_err(|e| map_sqlx_error("ensure_references", e))?;
        if !category_exists {
            return Err(unknown_reference("category", category_id));
        }
        if !supplier_exists {
            return Err(unknown_reference("supplier", supplier_id));
        }
        Ok(())
    }

    async fn count(conn: &mut PgConnection, sql: &str, id: Uuid, operation: &str) -> StoreResult<u64> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error(operation, e))?;
        Ok(total.max(0) as u64)
    }

    /// Insert-if-absent by name, then read back. Safe under concurrent callers.
    async fn get_or_create_category_in(conn: &mut PgConnection, name: &str) -> StoreResult<Category> {
        let candidate = Category::new(CategoryId::new(), NewCategory::named(name), Utc::now())?;
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(candidate.id_typed().as_uuid())
            .bind(candidate.name())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get_or_create_category", e))?;

        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(candidate.name())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get_or_create_category", e))?;
        category_from_row(&row).map_err(|e| map_sqlx_error("decode_category", e))
    }

    async fn get_or_create_supplier_in(conn: &mut PgConnection, name: &str) -> StoreResult<Supplier> {
        let candidate = Supplier::new(SupplierId::new(), NewSupplier::named(name), Utc::now())?;
        sqlx::query("INSERT INTO suppliers (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(candidate.id_typed().as_uuid())
            .bind(candidate.name())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get_or_create_supplier", e))?;

        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(candidate.name())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("get_or_create_supplier", e))?;
        supplier_from_row(&row).map_err(|e| map_sqlx_error("decode_supplier", e))
    }

    async fn insert_product(conn: &mut PgConnection, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, sku, category_id, supplier_id, stock, min_stock, price, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.name())
        .bind(product.sku())
        .bind(product.category_id().as_uuid())
        .bind(product.supplier_id().as_uuid())
        .bind(i64::from(product.stock()))
        .bind(i64::from(product.min_stock()))
        .bind(product.price().amount())
        .bind(product.is_active())
        .bind(stockroom_core::Entity::created_at(product))
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    /// Writes every column except `stock`.
    async fn update_product_row(conn: &mut PgConnection, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, sku = $3, category_id = $4, supplier_id = $5,
                min_stock = $6, price = $7, is_active = $8
            WHERE id = $1
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.name())
        .bind(product.sku())
        .bind(product.category_id().as_uuid())
        .bind(product.supplier_id().as_uuid())
        .bind(i64::from(product.min_stock()))
        .bind(product.price().amount())
        .bind(product.is_active())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(())
    }

    async fn write_stock(conn: &mut PgConnection, id: ProductId, stock: u32) -> StoreResult<()> {
        sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(i64::from(stock))
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("write_stock", e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    async fn create_category(&self, draft: NewCategory) -> StoreResult<Category> {
        let category = Category::new(CategoryId::new(), draft, Utc::now())?;
        sqlx::query(
            "INSERT INTO categories (id, name, description, is_active, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(category.id_typed().as_uuid())
        .bind(category.name())
        .bind(category.description())
        .bind(category.is_active())
        .bind(stockroom_core::Entity::created_at(&category))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_category", e))?;
        Ok(category)
    }

    #[instrument(skip(self, changes), fields(category_id = %id), err)]
    async fn update_category(&self, id: CategoryId, changes: CategoryChanges) -> StoreResult<Category> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let updated = Self::fetch_category(&mut tx, id, true).await?.with_changes(changes)?;
        sqlx::query("UPDATE categories SET name = $2, description = $3, is_active = $4 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(updated.name())
            .bind(updated.description())
            .bind(updated.is_active())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_category", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn set_category_active(&self, id: CategoryId, active: bool) -> StoreResult<Category> {
        let sql = format!("UPDATE categories SET is_active = $2 WHERE id = $1 RETURNING {CATEGORY_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(active)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_category_active", e))?
            .ok_or_else(|| DomainError::not_found("category", id))?;
        category_from_row(&row).map_err(|e| map_sqlx_error("decode_category", e))
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let category = Self::fetch_category(&mut tx, id, true).await?;
        let references = Self::count(
            &mut tx,
            "SELECT COUNT(*) AS total FROM products WHERE category_id = $1",
            *id.as_uuid(),
            "delete_category",
        )
        .await?;
        if references > 0 {
            return Err(DomainError::in_use("category", category.name(), references, "products").into());
        }
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Category> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        Self::fetch_category(&mut conn, id, false).await
    }

    #[instrument(skip(self), err)]
    async fn list_categories(&self, pagination: Pagination) -> StoreResult<Page<CategorySummary>> {
        let total = scalar_count(&self.pool, "SELECT COUNT(*) AS total FROM categories").await?;
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.description, c.is_active, c.created_at,
                   COUNT(p.id) AS product_count
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(CategorySummary {
                    category: category_from_row(row)?,
                    product_count: row.try_get::<i64, _>("product_count")?.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("decode_category", e))?;
        Ok(Page::new(items, total, pagination))
    }

    #[instrument(skip(self), err)]
    async fn get_or_create_category(&self, name: &str) -> StoreResult<Category> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        Self::get_or_create_category_in(&mut conn, name).await
    }

    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    async fn create_supplier(&self, draft: NewSupplier) -> StoreResult<Supplier> {
        let supplier = Supplier::new(SupplierId::new(), draft, Utc::now())?;
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, contact_name, email, phone, address, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(supplier.id_typed().as_uuid())
        .bind(supplier.name())
        .bind(supplier.contact_name())
        .bind(supplier.email())
        .bind(supplier.phone())
        .bind(supplier.address())
        .bind(supplier.is_active())
        .bind(stockroom_core::Entity::created_at(&supplier))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_supplier", e))?;
        Ok(supplier)
    }

    #[instrument(skip(self, changes), fields(supplier_id = %id), err)]
    async fn update_supplier(&self, id: SupplierId, changes: SupplierChanges) -> StoreResult<Supplier> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let updated = Self::fetch_supplier(&mut tx, id, true).await?.with_changes(changes)?;
        sqlx::query(
            r#"
            UPDATE suppliers
            SET name = $2, contact_name = $3, email = $4, phone = $5, address = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(updated.name())
        .bind(updated.contact_name())
        .bind(updated.email())
        .bind(updated.phone())
        .bind(updated.address())
        .bind(updated.is_active())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_supplier", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    async fn set_supplier_active(&self, id: SupplierId, active: bool) -> StoreResult<Supplier> {
        let sql = format!("UPDATE suppliers SET is_active = $2 WHERE id = $1 RETURNING {SUPPLIER_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(active)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_supplier_active", e))?
            .ok_or_else(|| DomainError::not_found("supplier", id))?;
        supplier_from_row(&row).map_err(|e| map_sqlx_error("decode_supplier", e))
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    async fn delete_supplier(&self, id: SupplierId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let supplier = Self::fetch_supplier(&mut tx, id, true).await?;
        let references = Self::count(
            &mut tx,
            "SELECT COUNT(*) AS total FROM products WHERE supplier_id = $1",
            *id.as_uuid(),
            "delete_supplier",
        )
        .await?;
        if references > 0 {
            return Err(DomainError::in_use("supplier", supplier.name(), references, "products").into());
        }
        sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_supplier", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_supplier(&self, id: SupplierId) -> StoreResult<Supplier> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        Self::fetch_supplier(&mut conn, id, false).await
    }

    #[instrument(skip(self), err)]
    async fn list_suppliers(&self, pagination: Pagination) -> StoreResult<Page<SupplierSummary>> {
        let total = scalar_count(&self.pool, "SELECT COUNT(*) AS total FROM suppliers").await?;
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.name, s.contact_name, s.email, s.phone, s.address, s.is_active, s.created_at,
                   COUNT(p.id) AS product_count
            FROM suppliers s
            LEFT JOIN products p ON p.supplier_id = s.id
            GROUP BY s.id
            ORDER BY s.name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_suppliers", e))?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(SupplierSummary {
                    supplier: supplier_from_row(row)?,
                    product_count: row.try_get::<i64, _>("product_count")?.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("decode_supplier", e))?;
        Ok(Page::new(items, total, pagination))
    }

    #[instrument(skip(self), err)]
    async fn get_or_create_supplier(&self, name: &str) -> StoreResult<Supplier> {
        let mut conn = self.pool.acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        Self::get_or_create_supplier_in(&mut conn, name).await
    }

    #[instrument(skip(self, draft), fields(sku = %draft.sku), err)]
    async fn create_product(&self, draft: NewProduct) -> StoreResult<Product> {
        let product = Product::new(ProductId::new(), draft, Utc::now())?;
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Self::ensure_references(&mut tx, product.category_id(), product.supplier_id()).await?;
        Self::insert_product(&mut tx, &product).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(product)
    }

    #[instrument(skip(self, changes), fields(product_id = %id), err)]
    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> StoreResult<Product> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let current = Self::fetch_product_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        let updated = current.with_changes(changes)?;
        Self::ensure_references(&mut tx, updated.category_id(), updated.supplier_id()).await?;
        Self::update_product_row(&mut tx, &updated).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn set_product_active(&self, id: ProductId, active: bool) -> StoreResult<Product> {
        let sql = format!("UPDATE products SET is_active = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(active)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_product_active", e))?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        product_from_row(&row).map_err(|e| map_sqlx_error("decode_product", e))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let product = Self::fetch_product_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        let references = Self::count(
            &mut tx,
            "SELECT COUNT(*) AS total FROM stock_movements WHERE product_id = $1",
            *id.as_uuid(),
            "delete_product",
        )
        .await?;
        if references > 0 {
            return Err(DomainError::in_use("product", product.name(), references, "stock movements").into());
        }
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<ProductView> {
        self.fetch_product_view("p.id = $1", *id.as_uuid(), None)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id).into())
    }

    async fn get_product_by_sku(&self, sku: &str) -> StoreResult<ProductView> {
        let sku = sku.trim();
        self.fetch_product_view("p.sku = $1", Uuid::nil(), Some(sku))
            .await?
            .ok_or_else(|| DomainError::not_found("product", sku).into())
    }

    #[instrument(skip(self, filter), err)]
    async fn list_products(&self, filter: &ProductFilter, pagination: Pagination) -> StoreResult<Page<ProductView>> {
        let count_sql = format!(
            "SELECT COUNT(*) AS total FROM products p WHERE {PRODUCT_FILTER}"
        );
        let count_row = bind_product_filter(sqlx::query(&count_sql), filter)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let sql = format!(
            "{PRODUCT_VIEW_SELECT} WHERE {PRODUCT_FILTER} ORDER BY p.name, p.sku LIMIT $6 OFFSET $7"
        );
        let rows = bind_product_filter(sqlx::query(&sql), filter)
            .bind(i64::from(pagination.limit))
            .bind(i64::from(pagination.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        let items = rows
            .iter()
            .map(product_view_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_product", e))?;
        Ok(Page::new(items, total.max(0) as u64, pagination))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn set_baseline_stock(&self, id: ProductId, stock: u32) -> StoreResult<Product> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let current = Self::fetch_product_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        Self::write_stock(&mut tx, id, stock).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let previous = current.stock();
        info!(product_id = %id, previous, stock, "baseline stock set");
        Ok(Product::from_parts(ProductParts {
            stock,
            ..current.into_parts()
        }))
    }

    #[instrument(skip(self, row), fields(sku = %row.sku), err)]
    async fn upsert_product_from_import(&self, row: ImportRow) -> StoreResult<(Product, UpsertOutcome)> {
        let sku = row.sku.trim().to_string();
        let checked = NewProduct {
            name: row.name.clone(),
            sku: sku.clone(),
            category_id: CategoryId::new(),
            supplier_id: SupplierId::new(),
            min_stock: 0,
            price: row.price,
            is_active: true,
            initial_stock: i64::from(row.stock),
        };
        // Validate everything before the transaction so a bad row writes nothing.
        Product::new(ProductId::new(), checked.clone(), Utc::now())?;
        Category::new(CategoryId::new(), NewCategory::named(&row.category), Utc::now())?;
        Supplier::new(SupplierId::new(), NewSupplier::named(&row.supplier), Utc::now())?;

        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let category = Self::get_or_create_category_in(&mut tx, &row.category).await?;
        let supplier = Self::get_or_create_supplier_in(&mut tx, &row.supplier).await?;

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1 FOR UPDATE");
        let existing = sqlx::query(&sql)
            .bind(&sku)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_product", e))?
            .map(|r| product_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("decode_product", e))?;

        let (product, outcome) = match existing {
            Some(current) => {
                let updated = current.with_changes(ProductChanges {
                    name: Some(row.name),
                    category_id: Some(category.id_typed()),
                    supplier_id: Some(supplier.id_typed()),
                    price: Some(row.price),
                    ..Default::default()
                })?;
                Self::update_product_row(&mut tx, &updated).await?;
                Self::write_stock(&mut tx, updated.id_typed(), row.stock).await?;
                let product = Product::from_parts(ProductParts {
                    stock: row.stock,
                    ..updated.into_parts()
                });
                (product, UpsertOutcome::Updated)
            }
            None => {
                let draft = NewProduct {
                    category_id: category.id_typed(),
                    supplier_id: supplier.id_typed(),
                    ..checked
                };
                let product = Product::new(ProductId::new(), draft, Utc::now())?;
                Self::insert_product(&mut tx, &product).await?;
                (product, UpsertOutcome::Created)
            }
        };
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok((product, outcome))
    }

    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            kind = request.kind.as_str(),
            quantity = request.quantity.get()
        ),
        err
    )]
    async fn apply_movement(&self, request: MovementRequest) -> StoreResult<StockMovement> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock: concurrent movements on this product wait here.
        let product = Self::fetch_product_for_update(&mut tx, request.product_id)
            .await?
            .ok_or(LedgerError::UnknownProduct(request.product_id))?;

        let plan = plan_movement(
            &product,
            request.kind,
            request.quantity,
            &request.reason,
            request.actor,
        )?;

        Self::write_stock(&mut tx, plan.product_id, plan.stock_after).await?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_movements (
                product_id, kind, quantity, reason, actor_id, actor_username, stock_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(plan.product_id.as_uuid())
        .bind(plan.kind.as_str())
        .bind(i64::from(plan.quantity.get()))
        .bind(&plan.reason)
        .bind(plan.actor.as_ref().map(|a| *a.id.as_uuid()))
        .bind(plan.actor.as_ref().map(|a| a.username.clone()))
        .bind(i64::from(plan.stock_after))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        let id: i64 = inserted.try_get("id").map_err(|e| map_sqlx_error("insert_movement", e))?;
        let created_at: DateTime<Utc> = inserted
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("insert_movement", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let stock_before = plan.stock_before;
        let movement = plan.record(MovementId::new(id.max(0) as u64), created_at);
        info!(
            movement_id = %movement.id_typed(),
            stock_before,
            stock_after = movement.stock_after(),
            "stock movement applied"
        );
        Ok(movement)
    }

    #[instrument(skip(self, filter), err)]
    async fn list_movements(&self, filter: &MovementFilter, pagination: Pagination) -> StoreResult<Page<MovementView>> {
        let count_sql = format!("SELECT COUNT(*) AS total FROM stock_movements m WHERE {MOVEMENT_FILTER}");
        let count_row = bind_movement_filter(sqlx::query(&count_sql), filter)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_movements", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_movements", e))?;

        let sql = format!(
            "{MOVEMENT_VIEW_SELECT} WHERE {MOVEMENT_FILTER} ORDER BY m.created_at DESC, m.id DESC LIMIT $5 OFFSET $6"
        );
        let rows = bind_movement_filter(sqlx::query(&sql), filter)
            .bind(i64::from(pagination.limit))
            .bind(i64::from(pagination.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_movements", e))?;

        let items = rows
            .iter()
            .map(movement_view_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_movement", e))?;
        Ok(Page::new(items, total.max(0) as u64, pagination))
    }

    async fn low_stock_products(&self) -> StoreResult<Vec<ProductView>> {
        let sql = format!(
            "{PRODUCT_VIEW_SELECT} WHERE p.is_active AND p.stock <= p.min_stock ORDER BY p.name, p.sku"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("low_stock_products", e))?;
        rows.iter()
            .map(product_view_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_product", e))
    }

    async fn inventory_value(&self) -> StoreResult<Decimal> {
        let row = sqlx::query("SELECT COALESCE(SUM(stock * price), 0)::NUMERIC AS total FROM products")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("inventory_value", e))?;
        row.try_get("total").map_err(|e| map_sqlx_error("inventory_value", e))
    }

    async fn movement_totals(&self, kind: MovementKind, range: DateRange) -> StoreResult<u64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT AS total
            FROM stock_movements
            WHERE kind = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            "#,
        )
        .bind(kind.as_str())
        .bind(range.lower_bound())
        .bind(range.upper_bound_exclusive())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement_totals", e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error("movement_totals", e))?;
        Ok(total.max(0) as u64)
    }

    async fn category_distribution(&self) -> StoreResult<Vec<CategoryCount>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, COUNT(p.id) AS product_count
            FROM categories c
            JOIN products p ON p.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY c.name
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("category_distribution", e))?;

        rows.iter()
            .map(|row| {
                Ok(CategoryCount {
                    category_id: CategoryId::from_uuid(row.try_get("id")?),
                    name: row.try_get("name")?,
                    product_count: row.try_get::<i64, _>("product_count")?.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("category_distribution", e))
    }

    async fn catalog_counts(&self) -> StoreResult<CatalogCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products) AS products,
                (SELECT COUNT(*) FROM categories) AS categories,
                (SELECT COUNT(*) FROM suppliers) AS suppliers
            "#,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("catalog_counts", e))?;

        let get = |column: &str| -> StoreResult<u64> {
            let n: i64 = row.try_get(column).map_err(|e| map_sqlx_error("catalog_counts", e))?;
            Ok(n.max(0) as u64)
        };
        Ok(CatalogCounts {
            products: get("products")?,
            categories: get("categories")?,
            suppliers: get("suppliers")?,
        })
    }

    fn stream_products(&self, filter: ProductFilter) -> RowStream<ProductView> {
        let pool = Arc::clone(&self.pool);
        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let sql = format!("{PRODUCT_VIEW_SELECT} WHERE {PRODUCT_FILTER} ORDER BY p.name, p.sku");
            let mut rows = bind_product_filter(sqlx::query(&sql), &filter).fetch(&*pool);
            while let Some(row) = rows.next().await {
                let item = row
                    .and_then(|r| product_view_from_row(&r))
                    .map_err(|e| map_sqlx_error("stream_products", e));
                let failed = item.is_err();
                // Receiver gone (client disconnected) or query failed: stop.
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }

    fn stream_movements(&self, filter: MovementFilter) -> RowStream<MovementView> {
        let pool = Arc::clone(&self.pool);
        let (tx, rx) = tokio::sync::mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let sql = format!(
                "{MOVEMENT_VIEW_SELECT} WHERE {MOVEMENT_FILTER} ORDER BY m.created_at DESC, m.id DESC"
            );
            let mut rows = bind_movement_filter(sqlx::query(&sql), &filter).fetch(&*pool);
            while let Some(row) = rows.next().await {
                let item = row
                    .and_then(|r| movement_view_from_row(&r))
                    .map_err(|e| map_sqlx_error("stream_movements", e));
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

fn bind_product_filter<'q>(query: PgQuery<'q>, filter: &ProductFilter) -> PgQuery<'q> {
    query
        .bind(ProductFilter::like_pattern(filter.name.as_deref()))
        .bind(ProductFilter::like_pattern(filter.sku.as_deref()))
        .bind(filter.category.map(Uuid::from))
        .bind(filter.supplier.map(Uuid::from))
        .bind(filter.low_stock)
}

fn bind_movement_filter<'q>(query: PgQuery<'q>, filter: &MovementFilter) -> PgQuery<'q> {
    query
        .bind(filter.product.map(Uuid::from))
        .bind(filter.kind.map(MovementKind::as_str))
        .bind(filter.range.lower_bound())
        .bind(filter.range.upper_bound_exclusive())
}

async fn scalar_count(pool: &PgPool, sql: &str) -> StoreResult<u64> {
    let row = sqlx::query(sql)
        .fetch_one(pool)
        .await
        .map_err(|e| map_sqlx_error("count", e))?;
    let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error("count", e))?;
    Ok(total.max(0) as u64)
}

// Row decoding

fn decode_err<E>(column: &str, err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    }
}

fn count_column(row: &PgRow, column: &str) -> Result<u32, sqlx::Error> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|e| decode_err(column, e))
}

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category::restore(
        CategoryId::from_uuid(row.try_get("id")?),
        row.try_get("name")?,
        row.try_get("description")?,
        row.try_get("is_active")?,
        row.try_get("created_at")?,
    ))
}

fn supplier_from_row(row: &PgRow) -> Result<Supplier, sqlx::Error> {
    Ok(Supplier::restore(
        SupplierId::from_uuid(row.try_get("id")?),
        row.try_get("name")?,
        row.try_get("contact_name")?,
        row.try_get("email")?,
        row.try_get("phone")?,
        row.try_get("address")?,
        row.try_get("is_active")?,
        row.try_get("created_at")?,
    ))
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    let price: Decimal = row.try_get("price")?;
    Ok(Product::from_parts(ProductParts {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        sku: row.try_get("sku")?,
        category_id: CategoryId::from_uuid(row.try_get("category_id")?),
        supplier_id: SupplierId::from_uuid(row.try_get("supplier_id")?),
        stock: count_column(row, "stock")?,
        min_stock: count_column(row, "min_stock")?,
        price: Price::new(price).map_err(|e| decode_err("price", e))?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    }))
}

fn product_view_from_row(row: &PgRow) -> Result<ProductView, sqlx::Error> {
    Ok(ProductView::new(
        product_from_row(row)?,
        row.try_get("category_name")?,
        row.try_get("supplier_name")?,
    ))
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    let quantity: i64 = row.try_get("quantity")?;
    let actor_id: Option<Uuid> = row.try_get("actor_id")?;
    let actor_username: Option<String> = row.try_get("actor_username")?;

    Ok(StockMovement::restore(
        MovementId::new(u64::try_from(id).map_err(|e| decode_err("id", e))?),
        ProductId::from_uuid(row.try_get("product_id")?),
        kind.parse().map_err(|e| decode_err("kind", e))?,
        Quantity::new(quantity).map_err(|e| decode_err("quantity", e))?,
        row.try_get("reason")?,
        actor_id.map(|id| Actor {
            id: UserId::from_uuid(id),
            username: actor_username.unwrap_or_default(),
        }),
        count_column(row, "stock_after")?,
        row.try_get("created_at")?,
    ))
}

fn movement_view_from_row(row: &PgRow) -> Result<MovementView, sqlx::Error> {
    Ok(MovementView {
        movement: movement_from_row(row)?,
        product_name: row.try_get("product_name")?,
        product_sku: row.try_get("product_sku")?,
        category_name: row.try_get("category_name")?,
    })
}

// Error mapping

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => {
                    let (entity, field) = unique_target(db_err.constraint());
                    let value = db_err
                        .try_downcast_ref::<PgDatabaseError>()
                        .and_then(|pg| pg.detail())
                        .and_then(duplicate_value)
                        .unwrap_or_default();
                    DomainError::duplicate(entity, field, value).into()
                }
                Some("23503") => DomainError::validation(msg).into(),
                Some("23514") => DomainError::validation(msg).into(),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        sqlx::Error::RowNotFound => StoreError::Backend(format!("unexpected row not found in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn unique_target(constraint: Option<&str>) -> (&'static str, &'static str) {
    match constraint {
        Some("categories_name_key") => ("category", "name"),
        Some("suppliers_name_key") => ("supplier", "name"),
        Some("products_sku_key") => ("product", "sku"),
        _ => ("record", "key"),
    }
}

/// Extracts `v` from a Postgres detail like `Key (sku)=(v) already exists.`
fn duplicate_value(detail: &str) -> Option<String> {
    let start = detail.find(")=(")? + 3;
    let end = detail.rfind(") already exists")?;
    (start <= end).then(|| detail[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_value_is_extracted_from_detail() {
        assert_eq!(
            duplicate_value("Key (sku)=(X1) already exists."),
            Some("X1".to_string())
        );
        assert_eq!(
            duplicate_value("Key (name)=(Caja (grande)) already exists."),
            Some("Caja (grande)".to_string())
        );
        assert_eq!(duplicate_value("something else"), None);
    }

    #[test]
    fn unique_constraints_map_to_business_keys() {
        assert_eq!(unique_target(Some("products_sku_key")), ("product", "sku"));
        assert_eq!(unique_target(Some("categories_name_key")), ("category", "name"));
        assert_eq!(unique_target(None), ("record", "key"));
    }

    #[test]
    fn schema_enforces_non_negative_stock() {
        assert!(SCHEMA.contains("CHECK (stock >= 0"));
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS stock_movements"));
    }

    /// Needs a disposable database: `DATABASE_URL=... cargo test -p stockroom-infra -- --ignored`.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_exits_serialize_on_the_product_row() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let store = Arc::new(PostgresInventoryStore::connect(&url, 4).await.unwrap());
        store.migrate().await.unwrap();

        let tag = Uuid::now_v7().simple().to_string();
        let category = store.create_category(NewCategory::named(format!("Cat {tag}"))).await.unwrap();
        let supplier = store.create_supplier(NewSupplier::named(format!("Prov {tag}"))).await.unwrap();
        let id = store
            .create_product(NewProduct {
                name: format!("Producto {tag}"),
                sku: format!("PG-{tag}"),
                category_id: category.id_typed(),
                supplier_id: supplier.id_typed(),
                min_stock: 0,
                price: "1.00".parse().unwrap(),
                is_active: true,
                initial_stock: 10,
            })
            .await
            .unwrap()
            .id_typed();

        let exit = move |store: Arc<PostgresInventoryStore>| async move {
            store
                .apply_movement(MovementRequest {
                    product_id: id,
                    kind: MovementKind::Exit,
                    quantity: Quantity::new(6).unwrap(),
                    reason: String::new(),
                    actor: None,
                })
                .await
        };
        let (a, b) = tokio::join!(
            tokio::spawn(exit(Arc::clone(&store))),
            tokio::spawn(exit(Arc::clone(&store)))
        );
        let results = [a.unwrap(), b.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(StoreError::Ledger(LedgerError::InsufficientStock { requested: 6, available: 4 }))
        )));
        assert_eq!(store.get_product(id).await.unwrap().product.stock(), 4);

        let err = sqlx::query("UPDATE products SET stock = -1 WHERE id = $1")
            .bind(id.as_uuid())
            .execute(store.pool())
            .await
            .map_err(|e| map_sqlx_error("write_stock", e))
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
    }
}

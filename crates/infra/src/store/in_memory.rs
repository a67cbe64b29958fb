use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio_stream::StreamExt;
use tracing::info;

use stockroom_catalog::{
    Category, CategoryChanges, NewCategory, NewProduct, NewSupplier, Product, ProductChanges,
    Supplier, SupplierChanges,
};
use stockroom_core::{CategoryId, DomainError, Entity, MovementId, ProductId, SupplierId};
use stockroom_ledger::{LedgerError, MovementKind, StockMovement, plan_movement};

use super::{
    CatalogCounts, CategoryCount, ImportRow, InventoryStore, MovementRequest, RowStream,
    UpsertOutcome, unknown_reference,
};
use crate::error::{StoreError, StoreResult};
use crate::query::{
    CategorySummary, DateRange, MovementFilter, MovementView, Page, Pagination, ProductFilter,
    ProductView, SupplierSummary,
};

#[derive(Debug, Default)]
struct State {
    categories: HashMap<CategoryId, Category>,
    suppliers: HashMap<SupplierId, Supplier>,
    products: HashMap<ProductId, Product>,
    /// Append-only, in insertion (= id) order.
    movements: Vec<StockMovement>,
}

impl State {
    fn category(&self, id: CategoryId) -> StoreResult<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| DomainError::not_found("category", id).into())
    }

    fn supplier(&self, id: SupplierId) -> StoreResult<&Supplier> {
        self.suppliers
            .get(&id)
            .ok_or_else(|| DomainError::not_found("supplier", id).into())
    }

    fn product(&self, id: ProductId) -> StoreResult<&Product> {
        self.products
            .get(&id)
            .ok_or_else(|| DomainError::not_found("product", id).into())
    }

    fn category_by_name(&self, name: &str) -> Option<&Category> {
        self.categories.values().find(|c| c.name() == name)
    }

    fn supplier_by_name(&self, name: &str) -> Option<&Supplier> {
        self.suppliers.values().find(|s| s.name() == name)
    }

    fn product_by_sku(&self, sku: &str) -> Option<&Product> {
        self.products.values().find(|p| p.sku() == sku)
    }

    fn ensure_category_name_free(&self, name: &str, except: Option<CategoryId>) -> StoreResult<()> {
        match self.category_by_name(name) {
            Some(c) if Some(c.id_typed()) != except => {
                Err(DomainError::duplicate("category", "name", name).into())
            }
            _ => Ok(()),
        }
    }

    fn ensure_supplier_name_free(&self, name: &str, except: Option<SupplierId>) -> StoreResult<()> {
        match self.supplier_by_name(name) {
            Some(s) if Some(s.id_typed()) != except => {
                Err(DomainError::duplicate("supplier", "name", name).into())
            }
            _ => Ok(()),
        }
    }

    fn ensure_sku_free(&self, sku: &str, except: Option<ProductId>) -> StoreResult<()> {
        match self.product_by_sku(sku) {
            Some(p) if Some(p.id_typed()) != except => {
                Err(DomainError::duplicate("product", "sku", sku).into())
            }
            _ => Ok(()),
        }
    }

    fn ensure_references(&self, category_id: CategoryId, supplier_id: SupplierId) -> StoreResult<()> {
        if !self.categories.contains_key(&category_id) {
            return Err(unknown_reference("category", category_id));
        }
        if !self.suppliers.contains_key(&supplier_id) {
            return Err(unknown_reference("supplier", supplier_id));
        }
        Ok(())
    }

    fn products_in_category(&self, id: CategoryId) -> u64 {
        self.products.values().filter(|p| p.category_id() == id).count() as u64
    }

    fn products_of_supplier(&self, id: SupplierId) -> u64 {
        self.products.values().filter(|p| p.supplier_id() == id).count() as u64
    }

    fn view(&self, product: &Product) -> ProductView {
        ProductView::new(
            product.clone(),
            self.categories
                .get(&product.category_id())
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            self.suppliers
                .get(&product.supplier_id())
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
        )
    }

    fn movement_view(&self, movement: &StockMovement) -> MovementView {
        let product = self.products.get(&movement.product_id());
        MovementView {
            movement: movement.clone(),
            product_name: product.map(|p| p.name().to_string()).unwrap_or_default(),
            product_sku: product.map(|p| p.sku().to_string()).unwrap_or_default(),
            category_name: product
                .and_then(|p| self.categories.get(&p.category_id()))
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
        }
    }

    /// Ids of matching products, ordered by name, then SKU.
    fn filtered_product_ids(&self, filter: &ProductFilter) -> Vec<ProductId> {
        let mut matching: Vec<&Product> = self.products.values().filter(|p| filter.matches(p)).collect();
        matching.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.sku().cmp(b.sku())));
        matching.into_iter().map(|p| p.id_typed()).collect()
    }

    fn filtered_products(&self, filter: &ProductFilter) -> Vec<ProductView> {
        self.filtered_product_ids(filter)
            .into_iter()
            .filter_map(|id| self.products.get(&id))
            .map(|p| self.view(p))
            .collect()
    }

    /// Positions in `movements` of the matching entries, newest first.
    fn filtered_movement_positions(&self, filter: &MovementFilter) -> Vec<usize> {
        let mut matching: Vec<(usize, &StockMovement)> = self
            .movements
            .iter()
            .enumerate()
            .filter(|(_, m)| filter.matches(m))
            .collect();
        matching.sort_by(|(_, a), (_, b)| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        matching.into_iter().map(|(pos, _)| pos).collect()
    }

    fn filtered_movements(&self, filter: &MovementFilter) -> Vec<MovementView> {
        self.filtered_movement_positions(filter)
            .into_iter()
            .map(|pos| self.movement_view(&self.movements[pos]))
            .collect()
    }

    fn get_or_create_category(&mut self, name: &str) -> StoreResult<Category> {
        if let Some(existing) = self.category_by_name(name.trim()) {
            return Ok(existing.clone());
        }
        let category = Category::new(CategoryId::new(), NewCategory::named(name), Utc::now())?;
        self.categories.insert(category.id_typed(), category.clone());
        Ok(category)
    }

    fn get_or_create_supplier(&mut self, name: &str) -> StoreResult<Supplier> {
        if let Some(existing) = self.supplier_by_name(name.trim()) {
            return Ok(existing.clone());
        }
        let supplier = Supplier::new(SupplierId::new(), NewSupplier::named(name), Utc::now())?;
        self.suppliers.insert(supplier.id_typed(), supplier.clone());
        Ok(supplier)
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. All state lives behind one `RwLock`; every write
/// (including the ledger's check-then-update) runs under a single write guard,
/// which serializes concurrent movements.
///
/// Row streams share the lock: they fix the matching keys and their order when
/// opened, then build each row under a short read guard as it is polled.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_category(&self, draft: NewCategory) -> StoreResult<Category> {
        let category = Category::new(CategoryId::new(), draft, Utc::now())?;
        let mut state = self.write()?;
        state.ensure_category_name_free(category.name(), None)?;
        state.categories.insert(category.id_typed(), category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: CategoryId, changes: CategoryChanges) -> StoreResult<Category> {
        let mut state = self.write()?;
        let updated = state.category(id)?.with_changes(changes)?;
        state.ensure_category_name_free(updated.name(), Some(id))?;
        state.categories.insert(id, updated.clone());
        Ok(updated)
    }

    async fn set_category_active(&self, id: CategoryId, active: bool) -> StoreResult<Category> {
        let mut state = self.write()?;
        let category = state
            .categories
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("category", id))?;
        category.set_active(active);
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        let mut state = self.write()?;
        let name = state.category(id)?.name().to_string();
        let references = state.products_in_category(id);
        if references > 0 {
            return Err(DomainError::in_use("category", name, references, "products").into());
        }
        state.categories.remove(&id);
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Category> {
        Ok(self.read()?.category(id)?.clone())
    }

    async fn list_categories(&self, pagination: Pagination) -> StoreResult<Page<CategorySummary>> {
        let state = self.read()?;
        let mut all: Vec<&Category> = state.categories.values().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        let summaries: Vec<CategorySummary> = all
            .into_iter()
            .map(|c| CategorySummary {
                category: c.clone(),
                product_count: state.products_in_category(c.id_typed()),
            })
            .collect();
        let total = summaries.len() as u64;
        Ok(Page::new(pagination.slice(&summaries), total, pagination))
    }

    async fn get_or_create_category(&self, name: &str) -> StoreResult<Category> {
        self.write()?.get_or_create_category(name)
    }

    async fn create_supplier(&self, draft: NewSupplier) -> StoreResult<Supplier> {
        let supplier = Supplier::new(SupplierId::new(), draft, Utc::now())?;
        let mut state = self.write()?;
        state.ensure_supplier_name_free(supplier.name(), None)?;
        state.suppliers.insert(supplier.id_typed(), supplier.clone());
        Ok(supplier)
    }

    async fn update_supplier(&self, id: SupplierId, changes: SupplierChanges) -> StoreResult<Supplier> {
        let mut state = self.write()?;
        let updated = state.supplier(id)?.with_changes(changes)?;
        state.ensure_supplier_name_free(updated.name(), Some(id))?;
        state.suppliers.insert(id, updated.clone());
        Ok(updated)
    }

    async fn set_supplier_active(&self, id: SupplierId, active: bool) -> StoreResult<Supplier> {
        let mut state = self.write()?;
        let supplier = state
            .suppliers
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("supplier", id))?;
        supplier.set_active(active);
        Ok(supplier.clone())
    }

    async fn delete_supplier(&self, id: SupplierId) -> StoreResult<()> {
        let mut state = self.write()?;
        let name = state.supplier(id)?.name().to_string();
        let references = state.products_of_supplier(id);
        if references > 0 {
            return Err(DomainError::in_use("supplier", name, references, "products").into());
        }
        state.suppliers.remove(&id);
        Ok(())
    }

    async fn get_supplier(&self, id: SupplierId) -> StoreResult<Supplier> {
        Ok(self.read()?.supplier(id)?.clone())
    }

    async fn list_suppliers(&self, pagination: Pagination) -> StoreResult<Page<SupplierSummary>> {
        let state = self.read()?;
        let mut all: Vec<&Supplier> = state.suppliers.values().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        let summaries: Vec<SupplierSummary> = all
            .into_iter()
            .map(|s| SupplierSummary {
                supplier: s.clone(),
                product_count: state.products_of_supplier(s.id_typed()),
            })
            .collect();
        let total = summaries.len() as u64;
        Ok(Page::new(pagination.slice(&summaries), total, pagination))
    }

    async fn get_or_create_supplier(&self, name: &str) -> StoreResult<Supplier> {
        self.write()?.get_or_create_supplier(name)
    }

    async fn create_product(&self, draft: NewProduct) -> StoreResult<Product> {
        let product = Product::new(ProductId::new(), draft, Utc::now())?;
        let mut state = self.write()?;
        state.ensure_references(product.category_id(), product.supplier_id())?;
        state.ensure_sku_free(product.sku(), None)?;
        state.products.insert(product.id_typed(), product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> StoreResult<Product> {
        let mut state = self.write()?;
        let updated = state.product(id)?.with_changes(changes)?;
        state.ensure_references(updated.category_id(), updated.supplier_id())?;
        state.ensure_sku_free(updated.sku(), Some(id))?;
        state.products.insert(id, updated.clone());
        Ok(updated)
    }

    async fn set_product_active(&self, id: ProductId, active: bool) -> StoreResult<Product> {
        let mut state = self.write()?;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("product", id))?;
        product.set_active(active);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let mut state = self.write()?;
        let name = state.product(id)?.name().to_string();
        let references = state.movements.iter().filter(|m| m.product_id() == id).count() as u64;
        if references > 0 {
            return Err(DomainError::in_use("product", name, references, "stock movements").into());
        }
        state.products.remove(&id);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<ProductView> {
        let state = self.read()?;
        let product = state.product(id)?;
        Ok(state.view(product))
    }

    async fn get_product_by_sku(&self, sku: &str) -> StoreResult<ProductView> {
        let state = self.read()?;
        let product = state
            .product_by_sku(sku.trim())
            .ok_or_else(|| DomainError::not_found("product", sku.trim()))?;
        Ok(state.view(product))
    }

    async fn list_products(&self, filter: &ProductFilter, pagination: Pagination) -> StoreResult<Page<ProductView>> {
        let views = self.read()?.filtered_products(filter);
        let total = views.len() as u64;
        Ok(Page::new(pagination.slice(&views), total, pagination))
    }

    async fn set_baseline_stock(&self, id: ProductId, stock: u32) -> StoreResult<Product> {
        let mut state = self.write()?;
        let mut parts = state.product(id)?.clone().into_parts();
        let previous = parts.stock;
        parts.stock = stock;
        let product = Product::from_parts(parts);
        state.products.insert(id, product.clone());
        info!(product_id = %id, previous, stock, "baseline stock set");
        Ok(product)
    }

    async fn upsert_product_from_import(&self, row: ImportRow) -> StoreResult<(Product, UpsertOutcome)> {
        let mut state = self.write()?;
        let sku = row.sku.trim().to_string();

        // Validate the product before touching category/supplier so a bad row
        // leaves nothing behind.
        let existing = state.product_by_sku(&sku).cloned();
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
        Product::new(ProductId::new(), checked.clone(), Utc::now())?;
        if state.category_by_name(row.category.trim()).is_none() {
            Category::new(CategoryId::new(), NewCategory::named(&row.category), Utc::now())?;
        }
        if state.supplier_by_name(row.supplier.trim()).is_none() {
            Supplier::new(SupplierId::new(), NewSupplier::named(&row.supplier), Utc::now())?;
        }

        let category = state.get_or_create_category(&row.category)?;
        let supplier = state.get_or_create_supplier(&row.supplier)?;

        let (product, outcome) = match existing {
            Some(current) => {
                let mut parts = current
                    .with_changes(ProductChanges {
                        name: Some(row.name),
                        category_id: Some(category.id_typed()),
                        supplier_id: Some(supplier.id_typed()),
                        price: Some(row.price),
                        ..Default::default()
                    })?
                    .into_parts();
                parts.stock = row.stock;
                (Product::from_parts(parts), UpsertOutcome::Updated)
            }
            None => {
                let draft = NewProduct {
                    category_id: category.id_typed(),
                    supplier_id: supplier.id_typed(),
                    ..checked
                };
                (Product::new(ProductId::new(), draft, Utc::now())?, UpsertOutcome::Created)
            }
        };
        state.products.insert(product.id_typed(), product.clone());
        Ok((product, outcome))
    }

    async fn apply_movement(&self, request: MovementRequest) -> StoreResult<StockMovement> {
        // Check, stock update and movement append all happen under this guard.
        let mut state = self.write()?;
        let product = state
            .products
            .get(&request.product_id)
            .ok_or(LedgerError::UnknownProduct(request.product_id))?;

        let plan = plan_movement(
            product,
            request.kind,
            request.quantity,
            &request.reason,
            request.actor,
        )?;
        let updated = plan.apply_to(product.clone());

        let id = MovementId::new(state.movements.len() as u64 + 1);
        let stock_before = plan.stock_before;
        let movement = plan.record(id, Utc::now());

        state.products.insert(updated.id_typed(), updated);
        state.movements.push(movement.clone());

        info!(
            movement_id = %id,
            product_id = %movement.product_id(),
            kind = movement.kind().as_str(),
            quantity = movement.quantity().get(),
            stock_before,
            stock_after = movement.stock_after(),
            "stock movement applied"
        );
        Ok(movement)
    }

    async fn list_movements(&self, filter: &MovementFilter, pagination: Pagination) -> StoreResult<Page<MovementView>> {
        let views = self.read()?.filtered_movements(filter);
        let total = views.len() as u64;
        Ok(Page::new(pagination.slice(&views), total, pagination))
    }

    async fn low_stock_products(&self) -> StoreResult<Vec<ProductView>> {
        let filter = ProductFilter {
            low_stock: true,
            ..Default::default()
        };
        let state = self.read()?;
        Ok(state
            .filtered_products(&filter)
            .into_iter()
            .filter(|v| v.product.is_active())
            .collect())
    }

    async fn inventory_value(&self) -> StoreResult<Decimal> {
        Ok(self
            .read()?
            .products
            .values()
            .map(|p| p.price().times(p.stock()))
            .sum())
    }

    async fn movement_totals(&self, kind: MovementKind, range: DateRange) -> StoreResult<u64> {
        let filter = MovementFilter {
            product: None,
            kind: Some(kind),
            range,
        };
        Ok(self
            .read()?
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .map(|m| u64::from(m.quantity().get()))
            .sum())
    }

    async fn category_distribution(&self) -> StoreResult<Vec<CategoryCount>> {
        let state = self.read()?;
        let mut counts: Vec<CategoryCount> = state
            .categories
            .values()
            .map(|c| CategoryCount {
                category_id: c.id_typed(),
                name: c.name().to_string(),
                product_count: state.products_in_category(c.id_typed()),
            })
            .filter(|c| c.product_count > 0)
            .collect();
        counts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counts)
    }

    async fn catalog_counts(&self) -> StoreResult<CatalogCounts> {
        let state = self.read()?;
        Ok(CatalogCounts {
            products: state.products.len() as u64,
            categories: state.categories.len() as u64,
            suppliers: state.suppliers.len() as u64,
        })
    }

    fn stream_products(&self, filter: ProductFilter) -> RowStream<ProductView> {
        let ids = match self.read() {
            Ok(state) => state.filtered_product_ids(&filter),
            Err(e) => return Box::pin(tokio_stream::once(Err(e))),
        };
        let shared = Arc::clone(&self.state);
        // Products deleted since the stream was opened are skipped.
        Box::pin(tokio_stream::iter(ids).filter_map(move |id| match shared.read() {
            Ok(state) => state.products.get(&id).map(|p| Ok(state.view(p))),
            Err(_) => Some(Err(StoreError::backend("lock poisoned"))),
        }))
    }

    fn stream_movements(&self, filter: MovementFilter) -> RowStream<MovementView> {
        let positions = match self.read() {
            Ok(state) => state.filtered_movement_positions(&filter),
            Err(e) => return Box::pin(tokio_stream::once(Err(e))),
        };
        let shared = Arc::clone(&self.state);
        // History is append-only, so a position stays valid.
        Box::pin(tokio_stream::iter(positions).filter_map(move |pos| match shared.read() {
            Ok(state) => state.movements.get(pos).map(|m| Ok(state.movement_view(m))),
            Err(_) => Some(Err(StoreError::backend("lock poisoned"))),
        }))
    }
}

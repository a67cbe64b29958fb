use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainResult, Entity, Price, ProductId, SupplierId};

use crate::validate;

pub const NAME_MAX_CHARS: usize = 200;
pub const SKU_MAX_CHARS: usize = 50;

/// Catalog product. Unique by SKU.
///
/// `stock` is readable but has no setter: it only changes through a store's
/// `apply_movement` (ledger) or the labeled baseline operation, both of which
/// rebuild the product from [`ProductParts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    id: ProductId,
    name: String,
    sku: String,
    category_id: CategoryId,
    supplier_id: SupplierId,
    stock: u32,
    min_stock: u32,
    price: Price,
    is_active: bool,
    created_at: DateTime<Utc>,
}

/// Flat persisted representation of a product.
///
/// Storage adapters use this to rehydrate rows and to write a new stock value
/// after the ledger has approved it. Nothing else should build one by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductParts {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub category_id: CategoryId,
    pub supplier_id: SupplierId,
    pub stock: u32,
    pub min_stock: u32,
    pub price: Price,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a product.
///
/// `initial_stock` is the baseline quantity: it is written directly and does
/// not produce a stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub category_id: CategoryId,
    pub supplier_id: SupplierId,
    #[serde(default)]
    pub min_stock: i64,
    pub price: Price,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub initial_stock: i64,
}

/// Partial update. There is deliberately no stock field; unknown fields
/// (including `stock`) are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    pub min_stock: Option<i64>,
    pub price: Option<Price>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl Product {
    pub fn new(id: ProductId, draft: NewProduct, created_at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: validate::required("name", &draft.name, NAME_MAX_CHARS)?,
            sku: validate::required("sku", &draft.sku, SKU_MAX_CHARS)?,
            category_id: draft.category_id,
            supplier_id: draft.supplier_id,
            stock: validate::parse_count("initial_stock", draft.initial_stock)?,
            min_stock: validate::parse_count("min_stock", draft.min_stock)?,
            price: draft.price,
            is_active: draft.is_active,
            created_at,
        })
    }

    pub fn from_parts(parts: ProductParts) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            sku: parts.sku,
            category_id: parts.category_id,
            supplier_id: parts.supplier_id,
            stock: parts.stock,
            min_stock: parts.min_stock,
            price: parts.price,
            is_active: parts.is_active,
            created_at: parts.created_at,
        }
    }

    pub fn into_parts(self) -> ProductParts {
        ProductParts {
            id: self.id,
            name: self.name,
            sku: self.sku,
            category_id: self.category_id,
            supplier_id: self.supplier_id,
            stock: self.stock,
            min_stock: self.min_stock,
            price: self.price,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }

    /// Validate `changes` and return the updated product. Stock is untouched.
    pub fn with_changes(&self, changes: ProductChanges) -> DomainResult<Self> {
        let mut next = self.clone();
        if let Some(name) = changes.name {
            next.name = validate::required("name", &name, NAME_MAX_CHARS)?;
        }
        if let Some(sku) = changes.sku {
            next.sku = validate::required("sku", &sku, SKU_MAX_CHARS)?;
        }
        if let Some(category_id) = changes.category_id {
            next.category_id = category_id;
        }
        if let Some(supplier_id) = changes.supplier_id {
            next.supplier_id = supplier_id;
        }
        if let Some(min_stock) = changes.min_stock {
            next.min_stock = validate::parse_count("min_stock", min_stock)?;
        }
        if let Some(price) = changes.price {
            next.price = price;
        }
        if let Some(is_active) = changes.is_active {
            next.is_active = is_active;
        }
        Ok(next)
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn min_stock(&self) -> u32 {
        self.min_stock
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Stock at or below the minimum threshold (equal counts as low).
    pub fn low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

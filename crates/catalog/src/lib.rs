//! Catalog domain module: categories, suppliers and products.
//!
//! Pure field validation and entity state only (no IO, no HTTP, no storage).
//! Uniqueness and referential integrity need a view over every entity, so
//! stores enforce those on top of what lives here.

pub mod category;
pub mod product;
pub mod supplier;
mod validate;

pub use category::{Category, CategoryChanges, NewCategory};
pub use product::{NewProduct, Product, ProductChanges, ProductParts};
pub use supplier::{NewSupplier, Supplier, SupplierChanges};
pub use validate::parse_count;

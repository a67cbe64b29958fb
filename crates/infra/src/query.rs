//! Read-side query shapes: filters, pagination and joined views.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_catalog::{Category, Product, Supplier};
use stockroom_core::{CategoryId, ProductId, SupplierId};
use stockroom_ledger::{MovementKind, StockMovement};

/// Offset pagination for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// 1-based page number and page size, as list endpoints accept them.
    pub fn from_page(page: Option<u32>, per_page: Option<u32>) -> Self {
        let limit = per_page.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT);
        let page = page.unwrap_or(1).max(1);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    /// Returns the window of `items` selected by this pagination.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a list query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of matching items (before pagination).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = total > u64::from(pagination.offset) + items.len() as u64;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

/// Product list filter. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the product name.
    pub name: Option<String>,
    /// Case-insensitive substring of the SKU.
    pub sku: Option<String>,
    pub category: Option<CategoryId>,
    pub supplier: Option<SupplierId>,
    /// When true only products with `stock <= min_stock` match. False does not filter.
    pub low_stock: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        contains_ci(product.name(), self.name.as_deref())
            && contains_ci(product.sku(), self.sku.as_deref())
            && self.category.is_none_or(|c| product.category_id() == c)
            && self.supplier.is_none_or(|s| product.supplier_id() == s)
            && (!self.low_stock || product.low_stock())
    }

    /// `ILIKE` pattern for an optional substring (blank means no filter).
    pub(crate) fn like_pattern(needle: Option<&str>) -> Option<String> {
        needle
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| {
                let escaped = n.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
                format!("%{escaped}%")
            })
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
    }
}

/// Calendar-day range in UTC, inclusive on both ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// First instant included by the range.
    pub fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.start.map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// First instant after the range (midnight following `end`).
    pub fn upper_bound_exclusive(&self) -> Option<DateTime<Utc>> {
        self.end
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.lower_bound().is_none_or(|lo| at >= lo)
            && self.upper_bound_exclusive().is_none_or(|hi| at < hi)
    }
}

/// Movement history filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementFilter {
    pub product: Option<ProductId>,
    pub kind: Option<MovementKind>,
    pub range: DateRange,
}

impl MovementFilter {
    pub fn matches(&self, movement: &StockMovement) -> bool {
        self.product.is_none_or(|p| movement.product_id() == p)
            && self.kind.is_none_or(|k| movement.kind() == k)
            && self.range.contains(stockroom_core::Entity::created_at(movement))
    }
}

/// Category with the number of products that reference it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: u64,
}

/// Supplier with the number of products that reference it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierSummary {
    #[serde(flatten)]
    pub supplier: Supplier,
    pub product_count: u64,
}

/// Product joined with its category and supplier names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: String,
    pub supplier_name: String,
    /// Derived at read time, never stored.
    pub low_stock: bool,
}

impl ProductView {
    pub fn new(product: Product, category_name: String, supplier_name: String) -> Self {
        let low_stock = product.low_stock();
        Self {
            product,
            category_name,
            supplier_name,
            low_stock,
        }
    }
}

/// Movement joined with the product it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementView {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub product_name: String,
    pub product_sku: String,
    pub category_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(Pagination::default(), Pagination { limit: 10, offset: 0 });
        assert_eq!(Pagination::new(Some(5000), None).limit, 1000);
        assert_eq!(Pagination::from_page(Some(3), Some(10)).offset, 20);
        assert_eq!(Pagination::from_page(Some(0), None).offset, 0);
    }

    #[test]
    fn page_reports_more_when_items_remain() {
        let page = Page::new(vec![1, 2], 5, Pagination::new(Some(2), Some(0)));
        assert!(page.has_more);
        let last = Page::new(vec![5], 5, Pagination::new(Some(2), Some(4)));
        assert!(!last.has_more);
    }

    #[test]
    fn date_range_is_inclusive_by_calendar_day() {
        let range = DateRange::new(Some(day(2024, 3, 1)), Some(day(2024, 3, 1)));
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        assert!(range.contains(early));
        assert!(range.contains(late));
        assert!(!range.contains(next));
        assert!(DateRange::default().contains(next));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(ProductFilter::like_pattern(Some("50%")), Some("%50\\%%".to_string()));
        assert_eq!(ProductFilter::like_pattern(Some("  ")), None);
        assert_eq!(ProductFilter::like_pattern(None), None);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 1000, .. ProptestConfig::default() })]

            #[test]
            fn pages_tile_the_list_without_gaps(len in 0usize..200, per_page in 1u32..40) {
                let items: Vec<usize> = (0..len).collect();
                let mut seen = Vec::new();
                let mut page = 1;
                loop {
                    let pagination = Pagination::from_page(Some(page), Some(per_page));
                    let window = pagination.slice(&items);
                    let result = Page::new(window.clone(), len as u64, pagination);
                    seen.extend(window);
                    if !result.has_more {
                        break;
                    }
                    page += 1;
                }
                prop_assert_eq!(seen, items);
            }
        }
    }
}

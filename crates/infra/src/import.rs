//! Bulk product import from CSV.
//!
//! Expected header (case-sensitive, any column order):
//! `name,sku,category,supplier,price,stock`. Every data row is applied on its
//! own through [`InventoryStore::upsert_product_from_import`]; a failing row is
//! reported and the rest of the file still goes through.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stockroom_catalog::parse_count;
use stockroom_core::{DomainError, Price};

use crate::store::{ImportRow, InventoryStore, UpsertOutcome};

pub const IMPORT_COLUMNS: [&str; 6] = ["name", "sku", "category", "supplier", "price", "stock"];

/// The file could not be read as CSV at all.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unreadable CSV header: {0}")]
    Header(#[from] csv::Error),
}

/// A rejected data row. Row 1 is the header, so the first data row is 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows applied (created + updated).
    pub imported: u64,
    pub created: u64,
    pub updated: u64,
    pub errors: Vec<RowError>,
}

/// Column positions resolved from the header line.
#[derive(Debug, Clone, Copy)]
struct Columns([Option<usize>; 6]);

impl Columns {
    fn resolve(header: &csv::StringRecord) -> Self {
        let mut positions = [None; 6];
        for (slot, column) in positions.iter_mut().zip(IMPORT_COLUMNS) {
            *slot = header.iter().position(|h| h == column);
        }
        Self(positions)
    }

    fn value<'r>(&self, record: &'r csv::StringRecord, column: usize) -> Result<&'r str, DomainError> {
        let name = IMPORT_COLUMNS[column];
        let position = self.0[column]
            .ok_or_else(|| DomainError::validation(format!("missing column '{name}'")))?;
        match record.get(position).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(DomainError::validation(format!("missing value for '{name}'"))),
        }
    }

    fn parse(&self, record: &csv::StringRecord) -> Result<ImportRow, DomainError> {
        let price: Price = self.value(record, 4)?.parse()?;
        let stock_raw = self.value(record, 5)?;
        let stock = stock_raw
            .parse::<i64>()
            .map_err(|_| DomainError::validation(format!("stock must be a whole number, got '{stock_raw}'")))
            .and_then(|n| parse_count("stock", n))?;

        Ok(ImportRow {
            name: self.value(record, 0)?.to_string(),
            sku: self.value(record, 1)?.to_string(),
            category: self.value(record, 2)?.to_string(),
            supplier: self.value(record, 3)?.to_string(),
            price,
            stock,
        })
    }
}

/// Imports products from UTF-8 CSV bytes.
///
/// Only an unreadable header aborts the import; everything else becomes a
/// [`RowError`].
#[instrument(skip(store, input), fields(bytes = input.len()), err)]
pub async fn import_products(store: &dyn InventoryStore, input: &[u8]) -> Result<ImportReport, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);
    let columns = Columns::resolve(reader.headers()?);

    let mut report = ImportReport::default();
    for (index, record) in reader.records().enumerate() {
        let row = index as u64 + 2;
        let outcome = match record {
            Ok(record) => match columns.parse(&record) {
                Ok(parsed) => store
                    .upsert_product_from_import(parsed)
                    .await
                    .map(|(_, outcome)| outcome)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(UpsertOutcome::Created) => report.created += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Err(message) => {
                warn!(row, %message, "import row rejected");
                report.errors.push(RowError { row, message });
            }
        }
    }
    report.imported = report.created + report.updated;

    info!(
        imported = report.imported,
        created = report.created,
        updated = report.updated,
        rejected = report.errors.len(),
        "product import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Pagination, ProductFilter};
    use crate::store::InMemoryInventoryStore;

    #[tokio::test]
    async fn bad_price_rejects_only_its_row() {
        let store = InMemoryInventoryStore::new();
        let csv = "name,sku,category,supplier,price,stock\n\
                   Martillo,H-1,Herramientas,Herramientas Pro,12.50,10\n\
                   Taladro,H-2,Herramientas,Herramientas Pro,abc,5\n\
                   Sierra,H-3,Herramientas,Herramientas Pro,30,2\n";

        let report = import_products(&store, csv.as_bytes()).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 3);

        let page = store
            .list_products(&ProductFilter::default(), Pagination::default())
            .await
            .unwrap();
        let skus: Vec<_> = page.items.iter().map(|v| v.product.sku().to_string()).collect();
        assert_eq!(skus, vec!["H-1", "H-3"]);
    }

    #[tokio::test]
    async fn reimport_updates_by_sku_and_reuses_names() {
        let store = InMemoryInventoryStore::new();
        let first = "name,sku,category,supplier,price,stock\nLápiz,OF-1,Oficina,Oficina Total,0.50,100\n";
        let second = "sku,name,price,stock,category,supplier\nOF-1,Lápiz HB,0.60,80,Oficina,Oficina Total\n";

        let report = import_products(&store, first.as_bytes()).await.unwrap();
        assert_eq!((report.created, report.updated), (1, 0));
        let report = import_products(&store, second.as_bytes()).await.unwrap();
        assert_eq!((report.created, report.updated), (0, 1));

        let view = store.get_product_by_sku("OF-1").await.unwrap();
        assert_eq!(view.product.name(), "Lápiz HB");
        assert_eq!(view.product.stock(), 80);
        assert_eq!(view.product.price(), "0.60".parse().unwrap());

        let counts = store.catalog_counts().await.unwrap();
        assert_eq!((counts.products, counts.categories, counts.suppliers), (1, 1, 1));
    }

    #[tokio::test]
    async fn missing_column_and_values_are_row_errors() {
        let store = InMemoryInventoryStore::new();
        let csv = "name,sku,category,supplier,price\nA,S-1,C,P,1\n";
        let report = import_products(&store, csv.as_bytes()).await.unwrap();
        assert_eq!(report.imported, 0);
        assert!(report.errors[0].message.contains("stock"));

        let csv = "name,sku,category,supplier,price,stock\n,S-1,C,P,1,1\nA,S-2,C,P,1,-4\n";
        let report = import_products(&store, csv.as_bytes()).await.unwrap();
        let rows: Vec<_> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 3]);
    }

    #[tokio::test]
    async fn empty_input_imports_nothing() {
        let store = InMemoryInventoryStore::new();
        let report = import_products(&store, b"").await.unwrap();
        assert_eq!(report, ImportReport::default());
    }
}

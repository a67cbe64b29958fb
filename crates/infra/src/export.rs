//! CSV export as lazily encoded byte chunks.
//!
//! The first chunk is the header line; every following chunk is exactly one
//! encoded row, produced only when the consumer polls for it.

use std::pin::Pin;

use tokio_stream::{Stream, StreamExt};

use stockroom_core::Entity;

use crate::error::{StoreError, StoreResult};
use crate::query::{MovementFilter, MovementView, ProductFilter, ProductView};
use crate::store::InventoryStore;

pub const PRODUCT_HEADER: [&str; 6] = ["Nombre", "SKU", "Categoría", "Proveedor", "Stock", "Precio"];
pub const MOVEMENT_HEADER: [&str; 6] = ["Fecha", "Producto", "Categoría", "Tipo", "Cantidad", "Usuario"];

/// Timestamp layout of the `Fecha` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub type CsvStream = Pin<Box<dyn Stream<Item = StoreResult<Vec<u8>>> + Send + 'static>>;

/// Encodes one CSV record (quoted as needed, `\n` terminated).
pub fn encode_record<I, T>(fields: I) -> StoreResult<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| StoreError::backend(format!("csv encode: {e}")))?;
    writer
        .into_inner()
        .map_err(|e| StoreError::backend(format!("csv flush: {e}")))
}

pub fn product_fields(view: &ProductView) -> [String; 6] {
    let product = &view.product;
    [
        product.name().to_string(),
        product.sku().to_string(),
        view.category_name.clone(),
        view.supplier_name.clone(),
        product.stock().to_string(),
        product.price().to_string(),
    ]
}

pub fn movement_fields(view: &MovementView) -> [String; 6] {
    let movement = &view.movement;
    [
        movement.created_at().format(DATE_FORMAT).to_string(),
        view.product_name.clone(),
        view.category_name.clone(),
        movement.kind().label().to_string(),
        movement.quantity().get().to_string(),
        movement
            .actor()
            .map(|actor| actor.username.clone())
            .unwrap_or_default(),
    ]
}

/// Products matching `filter`, ordered like the product list.
pub fn export_products(store: &dyn InventoryStore, filter: ProductFilter) -> CsvStream {
    let rows = store
        .stream_products(filter)
        .map(|row| row.and_then(|view| encode_record(product_fields(&view))));
    Box::pin(tokio_stream::once(encode_record(PRODUCT_HEADER)).chain(rows))
}

/// Movements matching `filter`, newest first.
pub fn export_movements(store: &dyn InventoryStore, filter: MovementFilter) -> CsvStream {
    let rows = store
        .stream_movements(filter)
        .map(|row| row.and_then(|view| encode_record(movement_fields(&view))));
    Box::pin(tokio_stream::once(encode_record(MOVEMENT_HEADER)).chain(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryInventoryStore, MovementRequest};
    use stockroom_catalog::{NewCategory, NewProduct, NewSupplier};
    use stockroom_core::UserId;
    use stockroom_ledger::{Actor, MovementKind, Quantity};

    async fn collect(mut stream: CsvStream) -> String {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend(chunk.unwrap());
        }
        String::from_utf8(out).unwrap()
    }

    async fn seeded() -> (InMemoryInventoryStore, stockroom_core::ProductId) {
        let store = InMemoryInventoryStore::new();
        let category = store.create_category(NewCategory::named("Oficina")).await.unwrap();
        let supplier = store.create_supplier(NewSupplier::named("Oficina Total")).await.unwrap();
        let product = store
            .create_product(NewProduct {
                name: "Grapadora, metálica".into(),
                sku: "OF-7".into(),
                category_id: category.id_typed(),
                supplier_id: supplier.id_typed(),
                min_stock: 2,
                price: "7.5".parse().unwrap(),
                is_active: true,
                initial_stock: 4,
            })
            .await
            .unwrap();
        (store, product.id_typed())
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let bytes = encode_record(["a,b", "c"]).unwrap();
        assert_eq!(bytes, b"\"a,b\",c\n");
    }

    #[tokio::test]
    async fn products_export_has_header_and_rows() {
        let (store, _) = seeded().await;
        let csv = collect(export_products(&store, ProductFilter::default())).await;
        assert_eq!(
            csv,
            "Nombre,SKU,Categoría,Proveedor,Stock,Precio\n\"Grapadora, metálica\",OF-7,Oficina,Oficina Total,4,7.50\n"
        );
    }

    #[tokio::test]
    async fn movements_export_labels_kind_and_actor() {
        let (store, product_id) = seeded().await;
        store
            .apply_movement(MovementRequest {
                product_id,
                kind: MovementKind::Entry,
                quantity: Quantity::new(3).unwrap(),
                reason: "compra".into(),
                actor: Some(Actor {
                    id: UserId::new(),
                    username: "ana".into(),
                }),
            })
            .await
            .unwrap();
        store
            .apply_movement(MovementRequest {
                product_id,
                kind: MovementKind::Exit,
                quantity: Quantity::new(1).unwrap(),
                reason: String::new(),
                actor: None,
            })
            .await
            .unwrap();

        let csv = collect(export_movements(&store, MovementFilter::default())).await;
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Fecha,Producto,Categoría,Tipo,Cantidad,Usuario");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",\"Grapadora, metálica\",Oficina,Salida,1,"));
        assert!(lines[2].ends_with(",\"Grapadora, metálica\",Oficina,Entrada,3,ana"));
        assert_eq!(lines[1].split(',').next().unwrap().len(), "2026-01-01 00:00".len());
    }

    #[tokio::test]
    async fn filtered_export_may_be_header_only() {
        let (store, _) = seeded().await;
        let filter = ProductFilter {
            sku: Some("nope".into()),
            ..Default::default()
        };
        let csv = collect(export_products(&store, filter)).await;
        assert_eq!(csv, "Nombre,SKU,Categoría,Proveedor,Stock,Precio\n");
    }
}

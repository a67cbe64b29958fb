//! End-to-end tests of the stock ledger through the in-memory store.
//!
//! Verifies:
//! - Movements update stock and history together
//! - Rejected movements change nothing
//! - Concurrent exits on one product serialize
//! - Referential integrity and reporting reads
//! - Row streams build each row only when it is polled

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_stream::StreamExt;

    use stockroom_catalog::{NewCategory, NewProduct, NewSupplier, ProductChanges};
    use stockroom_core::{CategoryId, DomainError, ProductId, SupplierId, UserId};
    use stockroom_ledger::{Actor, LedgerError, MovementKind, Quantity, replay};

    use crate::error::StoreError;
    use crate::query::{DateRange, MovementFilter, Pagination, ProductFilter};
    use crate::reporting::dashboard_summary;
    use crate::store::{InMemoryInventoryStore, InventoryStore, MovementRequest};

    struct Fixture {
        store: InMemoryInventoryStore,
        category_id: CategoryId,
        supplier_id: SupplierId,
    }

    async fn setup() -> Fixture {
        let store = InMemoryInventoryStore::new();
        let category = store.create_category(NewCategory::named("Herramientas")).await.unwrap();
        let supplier = store.create_supplier(NewSupplier::named("Herramientas Pro")).await.unwrap();
        Fixture {
            store,
            category_id: category.id_typed(),
            supplier_id: supplier.id_typed(),
        }
    }

    impl Fixture {
        async fn product(&self, sku: &str, stock: i64, min_stock: i64, price: &str) -> ProductId {
            self.store
                .create_product(NewProduct {
                    name: format!("Producto {sku}"),
                    sku: sku.to_string(),
                    category_id: self.category_id,
                    supplier_id: self.supplier_id,
                    min_stock,
                    price: price.parse().unwrap(),
                    is_active: true,
                    initial_stock: stock,
                })
                .await
                .unwrap()
                .id_typed()
        }
    }

    fn request(product_id: ProductId, kind: MovementKind, quantity: i64) -> MovementRequest {
        MovementRequest {
            product_id,
            kind,
            quantity: Quantity::new(quantity).unwrap(),
            reason: String::new(),
            actor: Some(Actor {
                id: UserId::new(),
                username: "almacen".to_string(),
            }),
        }
    }

    async fn stock_of(store: &dyn InventoryStore, id: ProductId) -> u32 {
        store.get_product(id).await.unwrap().product.stock()
    }

    #[tokio::test]
    async fn entry_then_exits_track_stock_and_history() {
        let fx = setup().await;
        let x1 = fx.product("X1", 0, 0, "1.00").await;

        let entry = fx.store.apply_movement(request(x1, MovementKind::Entry, 20)).await.unwrap();
        assert_eq!(entry.stock_after(), 20);
        let exit = fx.store.apply_movement(request(x1, MovementKind::Exit, 5)).await.unwrap();
        assert_eq!(exit.stock_after(), 15);

        let err = fx
            .store
            .apply_movement(request(x1, MovementKind::Exit, 20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Ledger(LedgerError::InsufficientStock { requested: 20, available: 15 })
        ));
        assert_eq!(stock_of(&fx.store, x1).await, 15);

        let filter = MovementFilter {
            product: Some(x1),
            ..Default::default()
        };
        let history = fx.store.list_movements(&filter, Pagination::default()).await.unwrap();
        let shown: Vec<_> = history
            .items
            .iter()
            .map(|v| (v.movement.kind(), v.movement.quantity().get()))
            .collect();
        assert_eq!(shown, vec![(MovementKind::Exit, 5), (MovementKind::Entry, 20)]);
        assert_eq!(history.items[0].product_sku, "X1");
        assert_eq!(history.items[0].movement.actor().unwrap().username, "almacen");
    }

    #[tokio::test]
    async fn history_replays_to_current_stock() {
        let fx = setup().await;
        let id = fx.product("R1", 7, 0, "1.00").await;
        for (kind, quantity) in [
            (MovementKind::Entry, 3),
            (MovementKind::Exit, 9),
            (MovementKind::Entry, 40),
            (MovementKind::Exit, 1),
        ] {
            fx.store.apply_movement(request(id, kind, quantity)).await.unwrap();
        }

        let page = fx
            .store
            .list_movements(&MovementFilter { product: Some(id), ..Default::default() }, Pagination::new(Some(100), None))
            .await
            .unwrap();
        let mut oldest_first: Vec<_> = page.items.into_iter().map(|v| v.movement).collect();
        oldest_first.reverse();

        assert_eq!(replay(7, &oldest_first).unwrap(), stock_of(&fx.store, id).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exits_cannot_oversell() {
        let fx = setup().await;
        let id = fx.product("RACE", 10, 0, "1.00").await;
        let store = Arc::new(fx.store);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.apply_movement(request(id, MovementKind::Exit, 6)).await })
            })
            .collect();

        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::Ledger(LedgerError::InsufficientStock { available: 4, .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((ok, rejected), (1, 1));
        assert_eq!(stock_of(store.as_ref(), id).await, 4);

        let history = store.list_movements(&MovementFilter::default(), Pagination::default()).await.unwrap();
        assert_eq!(history.total, 1);
    }

    #[tokio::test]
    async fn unknown_product_is_reported_by_id() {
        let fx = setup().await;
        let missing = ProductId::new();
        let err = fx
            .store
            .apply_movement(request(missing, MovementKind::Entry, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::UnknownProduct(id)) if id == missing));
    }

    #[tokio::test]
    async fn inactive_products_still_accept_movements() {
        let fx = setup().await;
        let id = fx.product("OLD", 2, 0, "1.00").await;
        fx.store.set_product_active(id, false).await.unwrap();

        let movement = fx.store.apply_movement(request(id, MovementKind::Exit, 2)).await.unwrap();
        assert_eq!(movement.stock_after(), 0);
    }

    #[tokio::test]
    async fn product_edits_never_touch_stock() {
        let fx = setup().await;
        let id = fx.product("E1", 12, 0, "1.00").await;

        let updated = fx
            .store
            .update_product(
                id,
                ProductChanges {
                    name: Some("Renombrado".into()),
                    min_stock: Some(20),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.stock(), 12);
        assert!(updated.low_stock());

        let baseline = fx.store.set_baseline_stock(id, 30).await.unwrap();
        assert_eq!(baseline.stock(), 30);
        let history = fx.store.list_movements(&MovementFilter::default(), Pagination::default()).await.unwrap();
        assert_eq!(history.total, 0);
    }

    #[tokio::test]
    async fn duplicate_sku_and_names_are_rejected() {
        let fx = setup().await;
        fx.product("DUP", 0, 0, "1.00").await;

        let err = fx
            .store
            .create_product(NewProduct {
                name: "Otro".into(),
                sku: " DUP ".into(),
                category_id: fx.category_id,
                supplier_id: fx.supplier_id,
                min_stock: 0,
                price: "2".parse().unwrap(),
                is_active: true,
                initial_stock: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Duplicate { field: "sku", .. })));

        let err = fx.store.create_category(NewCategory::named("Herramientas")).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Duplicate { entity: "category", .. })));
    }

    #[tokio::test]
    async fn unknown_references_fail_validation() {
        let fx = setup().await;
        let err = fx
            .store
            .create_product(NewProduct {
                name: "Huérfano".into(),
                sku: "ORPHAN".into(),
                category_id: CategoryId::new(),
                supplier_id: fx.supplier_id,
                min_stock: 0,
                price: "1".parse().unwrap(),
                is_active: true,
                initial_stock: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn referenced_rows_cannot_be_deleted() {
        let fx = setup().await;
        let id = fx.product("REF", 1, 0, "1.00").await;

        let err = fx.store.delete_category(fx.category_id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::ReferentialIntegrity { references: 1, .. })
        ));
        let err = fx.store.delete_supplier(fx.supplier_id).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::ReferentialIntegrity { .. })));

        let spare = fx.store.create_category(NewCategory::named("Vacía")).await.unwrap();
        fx.store.delete_category(spare.id_typed()).await.unwrap();
        assert!(matches!(
            fx.store.get_category(spare.id_typed()).await.unwrap_err(),
            StoreError::Domain(DomainError::NotFound { .. })
        ));

        fx.store.apply_movement(request(id, MovementKind::Exit, 1)).await.unwrap();
        let err = fx.store.delete_product(id).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::ReferentialIntegrity { .. })));

        let fresh = fx.product("FRESH", 0, 0, "1.00").await;
        fx.store.delete_product(fresh).await.unwrap();
    }

    #[tokio::test]
    async fn low_stock_boundary_is_inclusive() {
        let fx = setup().await;
        fx.product("AT", 5, 5, "1.00").await;
        fx.product("ABOVE", 6, 5, "1.00").await;
        let hidden = fx.product("GONE", 0, 5, "1.00").await;
        fx.store.set_product_active(hidden, false).await.unwrap();

        let low: Vec<_> = fx
            .store
            .low_stock_products()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.product.sku().to_string())
            .collect();
        assert_eq!(low, vec!["AT"]);

        let filter = ProductFilter {
            low_stock: true,
            ..Default::default()
        };
        let page = fx.store.list_products(&filter, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn product_filters_and_pagination() {
        let fx = setup().await;
        for i in 0..12 {
            fx.product(&format!("PAG-{i:02}"), i, 0, "1.00").await;
        }
        fx.product("OTHER", 0, 0, "1.00").await;

        let filter = ProductFilter {
            sku: Some("pag".into()),
            ..Default::default()
        };
        let first = fx.store.list_products(&filter, Pagination::from_page(Some(1), None)).await.unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.items.len(), 10);
        assert!(first.has_more);

        let second = fx.store.list_products(&filter, Pagination::from_page(Some(2), None)).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn dashboard_summarizes_inventory() {
        let fx = setup().await;
        let a = fx.product("A", 5, 5, "2.50").await;
        fx.product("B", 10, 1, "1.00").await;
        fx.store.apply_movement(request(a, MovementKind::Entry, 4)).await.unwrap();
        fx.store.apply_movement(request(a, MovementKind::Exit, 3)).await.unwrap();

        let summary = dashboard_summary(&fx.store).await.unwrap();
        assert_eq!(summary.counts.products, 2);
        assert_eq!(summary.low_stock_count, 0);
        assert_eq!((summary.total_entries, summary.total_exits), (4, 3));
        // 6 × 2.50 + 10 × 1.00
        assert_eq!(summary.inventory_value, "25.00".parse().unwrap());
        assert_eq!(summary.category_distribution.len(), 1);
        assert_eq!(summary.category_distribution[0].product_count, 2);

        let today = chrono::Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();
        let past = DateRange::new(None, Some(yesterday));
        assert_eq!(fx.store.movement_totals(MovementKind::Entry, past).await.unwrap(), 0);
        let current = DateRange::new(Some(today), Some(today));
        assert_eq!(fx.store.movement_totals(MovementKind::Exit, current).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn product_stream_reads_each_row_when_polled() {
        let fx = setup().await;
        let first = fx.product("S0", 0, 0, "1.00").await;
        let middle = fx.product("S1", 0, 0, "1.00").await;
        let last = fx.product("S2", 0, 0, "1.00").await;

        let mut rows = fx.store.stream_products(ProductFilter::default());
        let head = rows.next().await.unwrap().unwrap();
        assert_eq!(head.product.id_typed(), first);

        // Changes after opening the stream show up in rows not yet polled.
        fx.store.apply_movement(request(last, MovementKind::Entry, 9)).await.unwrap();
        fx.store.delete_product(middle).await.unwrap();

        let rest: Vec<_> = rows.collect::<Vec<_>>().await.into_iter().map(Result::unwrap).collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].product.id_typed(), last);
        assert_eq!(rest[0].product.stock(), 9);
    }

    #[tokio::test]
    async fn movement_stream_is_newest_first_and_lazy() {
        let fx = setup().await;
        let a = fx.product("A", 0, 0, "1.00").await;
        fx.store.apply_movement(request(a, MovementKind::Entry, 5)).await.unwrap();
        fx.store.apply_movement(request(a, MovementKind::Exit, 2)).await.unwrap();

        let mut rows = fx.store.stream_movements(MovementFilter::default());
        // Recorded after opening: not part of this stream.
        fx.store.apply_movement(request(a, MovementKind::Entry, 1)).await.unwrap();

        let newest = rows.next().await.unwrap().unwrap();
        assert_eq!(newest.movement.kind(), MovementKind::Exit);
        let oldest = rows.next().await.unwrap().unwrap();
        assert_eq!(oldest.movement.kind(), MovementKind::Entry);
        assert_eq!(oldest.product_sku, "A");
        assert!(rows.next().await.is_none());
    }
}

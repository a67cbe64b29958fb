use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use stockroom_catalog::{NewCategory, NewProduct, NewSupplier, Product};
use stockroom_core::{MovementId, ProductId};
use stockroom_infra::{InMemoryInventoryStore, InventoryStore, MovementRequest};
use stockroom_ledger::{MovementKind, Quantity, StockMovement, plan_movement, replay};
use tokio::runtime::Runtime;

fn sample_product(stock: i64) -> Product {
    Product::new(
        ProductId::new(),
        NewProduct {
            name: "Cable HDMI 2m".into(),
            sku: "CAB-HDMI-2M".into(),
            category_id: Default::default(),
            supplier_id: Default::default(),
            min_stock: 30,
            price: "9.99".parse().unwrap(),
            is_active: true,
            initial_stock: stock,
        },
        Utc::now(),
    )
    .unwrap()
}

async fn seeded_store(stock: i64) -> (InMemoryInventoryStore, ProductId) {
    let store = InMemoryInventoryStore::new();
    let category = store.create_category(NewCategory::named("Informática")).await.unwrap();
    let supplier = store.create_supplier(NewSupplier::named("InfoComponents")).await.unwrap();
    let product = store
        .create_product(NewProduct {
            name: "Cable HDMI 2m".into(),
            sku: "CAB-HDMI-2M".into(),
            category_id: category.id_typed(),
            supplier_id: supplier.id_typed(),
            min_stock: 30,
            price: "9.99".parse().unwrap(),
            is_active: true,
            initial_stock: stock,
        })
        .await
        .unwrap();
    (store, product.id_typed())
}

fn bench_plan_movement(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_movement");
    let product = sample_product(1_000);
    let quantity = Quantity::new(3).unwrap();

    group.bench_function("entry", |b| {
        b.iter(|| plan_movement(black_box(&product), MovementKind::Entry, quantity, "compra", None))
    });
    group.bench_function("exit_rejected", |b| {
        let big = Quantity::new(5_000).unwrap();
        b.iter(|| plan_movement(black_box(&product), MovementKind::Exit, big, "", None))
    });
    group.finish();
}

fn bench_apply_movement(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("apply_movement_in_memory");
    group.throughput(Throughput::Elements(2));

    let (store, id) = rt.block_on(seeded_store(100));
    group.bench_function("entry_then_exit", |b| {
        b.iter(|| {
            rt.block_on(async {
                for kind in [MovementKind::Entry, MovementKind::Exit] {
                    store
                        .apply_movement(MovementRequest {
                            product_id: id,
                            kind,
                            quantity: Quantity::new(1).unwrap(),
                            reason: String::new(),
                            actor: None,
                        })
                        .await
                        .unwrap();
                }
            })
        })
    });
    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_history");

    for size in [100usize, 1_000, 10_000] {
        let mut product = sample_product(0);
        let mut history: Vec<StockMovement> = Vec::with_capacity(size);
        for i in 0..size {
            let kind = if i % 3 == 2 { MovementKind::Exit } else { MovementKind::Entry };
            let plan = plan_movement(&product, kind, Quantity::new(2).unwrap(), "", None).unwrap();
            product = plan.apply_to(product);
            history.push(plan.record(MovementId::new(i as u64 + 1), Utc::now()));
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, history| {
            b.iter(|| replay(0, black_box(history)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan_movement, bench_apply_movement, bench_replay);
criterion_main!(benches);

//! Demo catalog for local runs (`STOCKROOM_SEED_DEMO=true`).
//!
//! Idempotent: entries whose name/SKU already exist are left untouched.

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use stockroom_catalog::{NewCategory, NewProduct, NewSupplier};
use stockroom_core::{CategoryId, DomainError, SupplierId};

use crate::error::{StoreError, StoreResult};
use crate::store::InventoryStore;

const CATEGORIES: &[(&str, &str)] = &[
    ("Electrónica", "Dispositivos electrónicos y accesorios"),
    ("Oficina", "Material y suministros de oficina"),
    ("Herramientas", "Herramientas manuales y eléctricas"),
    ("Informática", "Componentes y accesorios informáticos"),
    ("Mobiliario", "Muebles y equipamiento"),
];

struct DemoSupplier {
    name: &'static str,
    contact: &'static str,
    email: &'static str,
    phone: &'static str,
    address: &'static str,
}

const SUPPLIERS: &[DemoSupplier] = &[
    DemoSupplier {
        name: "TechSupply S.L.",
        contact: "Carlos Martínez",
        email: "info@techsupply.es",
        phone: "+34 910 123 456",
        address: "Calle Mayor 15, Madrid",
    },
    DemoSupplier {
        name: "Oficina Total",
        contact: "Ana García",
        email: "ventas@oficinatotal.es",
        phone: "+34 915 234 567",
        address: "Av. Diagonal 200, Barcelona",
    },
    DemoSupplier {
        name: "Herramientas Pro",
        contact: "Miguel Ruiz",
        email: "contacto@herramientaspro.es",
        phone: "+34 963 345 678",
        address: "Polígono Industrial Norte, Valencia",
    },
    DemoSupplier {
        name: "InfoComponents",
        contact: "Laura Sánchez",
        email: "info@infocomponents.es",
        phone: "+34 954 456 789",
        address: "Calle Sierpes 42, Sevilla",
    },
];

/// (name, sku, category, supplier, stock, min_stock, price)
type DemoProduct = (&'static str, &'static str, &'static str, &'static str, i64, i64, &'static str);

const PRODUCTS: &[DemoProduct] = &[
    ("Monitor LED 24\"", "MON-LED-24", "Electrónica", "TechSupply S.L.", 15, 5, "189.99"),
    ("Teclado Mecánico RGB", "TEC-MEC-RGB", "Electrónica", "TechSupply S.L.", 30, 10, "79.99"),
    ("Ratón Inalámbrico", "RAT-INAL-001", "Electrónica", "TechSupply S.L.", 45, 15, "24.99"),
    ("Papel A4 (500 hojas)", "PAP-A4-500", "Oficina", "Oficina Total", 200, 50, "4.99"),
    ("Bolígrafos Azul (Caja 50 uds)", "BOL-AZ-50", "Oficina", "Oficina Total", 25, 10, "12.50"),
    ("Carpetas Archivador", "CAR-ARC-001", "Oficina", "Oficina Total", 60, 20, "2.99"),
    ("Taladro Eléctrico 500W", "TAL-ELEC-500", "Herramientas", "Herramientas Pro", 8, 3, "89.99"),
    ("Set Destornilladores (12 piezas)", "SET-DEST-12", "Herramientas", "Herramientas Pro", 20, 5, "34.99"),
    ("Caja Herramientas Metálica", "CAJ-HER-MET", "Herramientas", "Herramientas Pro", 12, 4, "45.00"),
    ("Disco Duro SSD 500GB", "SSD-500GB-001", "Informática", "InfoComponents", 25, 10, "59.99"),
    ("Memoria RAM DDR4 8GB", "RAM-DDR4-8GB", "Informática", "InfoComponents", 40, 15, "39.99"),
    ("Cable HDMI 2m", "CAB-HDMI-2M", "Informática", "InfoComponents", 100, 30, "9.99"),
    ("Silla Oficina Ergonómica", "SIL-OFI-ERG", "Mobiliario", "Oficina Total", 5, 2, "159.99"),
    ("Escritorio 120x60cm", "ESC-120-60", "Mobiliario", "Oficina Total", 3, 1, "249.99"),
    ("Lámpara LED Escritorio", "LAM-LED-ESC", "Mobiliario", "TechSupply S.L.", 18, 5, "29.99"),
];

/// What a seeding run created (existing entries are not counted).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub categories: u32,
    pub suppliers: u32,
    pub products: u32,
}

/// `Ok(true)` when created, `Ok(false)` when the name/SKU was already taken.
fn created<T>(result: StoreResult<T>) -> StoreResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(StoreError::Domain(DomainError::Duplicate { .. })) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn load_demo_data(store: &dyn InventoryStore) -> StoreResult<SeedReport> {
    let mut report = SeedReport::default();

    let mut categories: HashMap<&str, CategoryId> = HashMap::new();
    for &(name, description) in CATEGORIES {
        let draft = NewCategory {
            description: description.to_string(),
            ..NewCategory::named(name)
        };
        if created(store.create_category(draft).await)? {
            report.categories += 1;
        }
        categories.insert(name, store.get_or_create_category(name).await?.id_typed());
    }

    let mut suppliers: HashMap<&str, SupplierId> = HashMap::new();
    for demo in SUPPLIERS {
        let draft = NewSupplier {
            name: demo.name.to_string(),
            contact_name: demo.contact.to_string(),
            email: demo.email.to_string(),
            phone: demo.phone.to_string(),
            address: demo.address.to_string(),
            is_active: true,
        };
        if created(store.create_supplier(draft).await)? {
            report.suppliers += 1;
        }
        suppliers.insert(demo.name, store.get_or_create_supplier(demo.name).await?.id_typed());
    }

    for &(name, sku, category, supplier, stock, min_stock, price) in PRODUCTS {
        let (Some(&category_id), Some(&supplier_id)) = (categories.get(category), suppliers.get(supplier)) else {
            return Err(StoreError::backend(format!("demo product {sku} references an unknown name")));
        };
        let draft = NewProduct {
            name: name.to_string(),
            sku: sku.to_string(),
            category_id,
            supplier_id,
            min_stock,
            price: price.parse()?,
            is_active: true,
            initial_stock: stock,
        };
        if created(store.create_product(draft).await)? {
            report.products += 1;
        }
    }

    info!(
        categories = report.categories,
        suppliers = report.suppliers,
        products = report.products,
        "demo data loaded"
    );
    Ok(report)
}

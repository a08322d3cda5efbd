//! # Seed Data Generator
//!
//! Populates a development database with payment methods and a small
//! clothing catalog.
//!
//! ## Usage
//! ```bash
//! # Seed ./till.db
//! cargo run -p till-db --bin seed
//!
//! # Specify database path
//! cargo run -p till-db --bin seed -- --db ./data/till.db
//! ```
//!
//! ## Generated Data
//! - Payment methods: CASH, CREDIT, DEBIT, BANK, NEQUI, DAVIPLATA
//! - Products: one per catalog entry, each in every color/size combination
//!   with stock spread evenly across the variants

use std::collections::BTreeMap;
use std::env;

use till_core::{Money, NewPaymentMethod, NewProduct, ProductVariant};
use till_db::{Database, DbConfig};

/// (code, display name, description)
const PAYMENT_METHODS: &[(&str, &str, &str)] = &[
    ("CASH", "Efectivo", "Cash in the drawer"),
    ("CREDIT", "Tarjeta de Crédito", "Credit card"),
    ("DEBIT", "Tarjeta Débito", "Debit card"),
    ("BANK", "Transferencia Bancaria", "Bank transfer"),
    ("NEQUI", "Nequi", "Nequi wallet"),
    ("DAVIPLATA", "Daviplata", "Daviplata wallet"),
];

/// (name, sale price in cents, purchase cost in cents)
const CATALOG: &[(&str, i64, i64)] = &[
    ("Basic T-Shirt", 3_500_000, 1_800_000),
    ("Polo Shirt", 5_900_000, 3_100_000),
    ("Slim Jeans", 12_900_000, 7_200_000),
    ("Hoodie", 9_900_000, 5_400_000),
    ("Linen Shirt", 8_500_000, 4_300_000),
    ("Chino Pants", 10_900_000, 5_900_000),
];

const COLORS: &[&str] = &["Black", "White", "Navy"];
const SIZES: &[&str] = &["S", "M", "L", "XL"];

/// Units per variant.
const UNITS_PER_VARIANT: i64 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./till.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./till.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Till POS Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let methods = db.payment_methods();
    let mut created_methods = 0;
    for (code, name, description) in PAYMENT_METHODS {
        if methods.get_by_code(code).await?.is_some() {
            continue;
        }
        methods
            .insert(&NewPaymentMethod {
                name: name.to_string(),
                code: code.to_string(),
                description: Some(description.to_string()),
            })
            .await?;
        created_methods += 1;
    }
    println!("✓ {} payment methods created", created_methods);

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping products to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    for (index, (name, price, cost)) in CATALOG.iter().enumerate() {
        let product = catalog_product(index, name, *price, *cost);
        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.name, e);
            continue;
        }
        generated += 1;
    }

    println!(
        "✓ Generated {} products ({} variants each) in {:?}",
        generated,
        COLORS.len() * SIZES.len(),
        start.elapsed()
    );
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// A catalog entry in every color and size.
fn catalog_product(index: usize, name: &str, price: i64, cost: i64) -> NewProduct {
    let mut variants = Vec::with_capacity(COLORS.len() * SIZES.len());
    for color in COLORS {
        for size in SIZES {
            let mut attributes = BTreeMap::new();
            attributes.insert("color".to_string(), color.to_string());
            attributes.insert("size".to_string(), size.to_string());
            variants.push(ProductVariant {
                attributes,
                quantity: UNITS_PER_VARIANT,
            });
        }
    }

    NewProduct {
        name: name.to_string(),
        // EAN-13 shaped, checksum not valid
        barcode: Some(format!("770{:010}", index + 1)),
        description: None,
        sale_price: Money::from_cents(price),
        purchase_cost: Money::from_cents(cost),
        quantity: UNITS_PER_VARIANT * variants.len() as i64,
        variants,
    }
}

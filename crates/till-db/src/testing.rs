//! Shared fixtures for this crate's tests.

use std::collections::BTreeMap;

use crate::pool::{Database, DbConfig};
use till_core::{
    Money, NewPaymentMethod, NewProduct, PaymentMethod, PaymentRequest, Product, ProductVariant,
    SaleItemRequest, SaleRequest,
};

pub(crate) const CASHIER: &str = "cashier-1";

pub(crate) struct Fixture {
    pub db: Database,
    pub cash: PaymentMethod,
    pub card: PaymentMethod,
    /// 50.00, 50 units: Red/M 30, Blue/L 20.
    pub shirt: Product,
    /// 50.00, 100 units, no variants.
    pub cap: Product,
    /// 100.00, 10 units, no variants.
    pub lamp: Product,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_db(Database::new(DbConfig::in_memory()).await.unwrap()).await
    }

    pub async fn with_db(db: Database) -> Self {
        let cash = method(&db, "Efectivo", "CASH").await;
        let card = method(&db, "Tarjeta de Crédito", "CREDIT").await;

        let shirt = product(
            &db,
            "T-Shirt",
            5_000,
            50,
            vec![
                ProductVariant {
                    attributes: attrs(&[("color", "Red"), ("size", "M")]),
                    quantity: 30,
                },
                ProductVariant {
                    attributes: attrs(&[("color", "Blue"), ("size", "L")]),
                    quantity: 20,
                },
            ],
        )
        .await;
        let cap = product(&db, "Cap", 5_000, 100, vec![]).await;
        let lamp = product(&db, "Lamp", 10_000, 10, vec![]).await;

        Fixture {
            db,
            cash,
            card,
            shirt,
            cap,
            lamp,
        }
    }

    pub async fn quantity(&self, product_id: &str) -> i64 {
        self.db
            .products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    pub async fn variant_quantities(&self, product_id: &str) -> Vec<i64> {
        self.db
            .products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .variants
            .iter()
            .map(|v| v.quantity)
            .collect()
    }
}

async fn method(db: &Database, name: &str, code: &str) -> PaymentMethod {
    db.payment_methods()
        .insert(&NewPaymentMethod {
            name: name.to_string(),
            code: code.to_string(),
            description: None,
        })
        .await
        .unwrap()
}

async fn product(db: &Database, name: &str, cents: i64, quantity: i64, variants: Vec<ProductVariant>) -> Product {
    db.products()
        .insert(&NewProduct {
            name: name.to_string(),
            sale_price: Money::from_cents(cents),
            quantity,
            variants,
            ..Default::default()
        })
        .await
        .unwrap()
}

pub(crate) fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub(crate) fn item(product: &Product, quantity: i64) -> SaleItemRequest {
    SaleItemRequest {
        product_id: product.id.clone(),
        quantity,
        ..Default::default()
    }
}

pub(crate) fn variant_item(product: &Product, quantity: i64, selector: &[(&str, &str)]) -> SaleItemRequest {
    SaleItemRequest {
        variant: Some(attrs(selector)),
        ..item(product, quantity)
    }
}

pub(crate) fn pay(method: &PaymentMethod, cents: i64) -> PaymentRequest {
    PaymentRequest {
        payment_method: Some(method.id.clone()),
        amount: Some(Money::from_cents(cents)),
    }
}

pub(crate) fn request(items: Vec<SaleItemRequest>, payments: Vec<PaymentRequest>) -> SaleRequest {
    SaleRequest {
        items,
        payment_details: payments,
    }
}

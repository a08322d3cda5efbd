//! # Product Repository
//!
//! Catalog products and their stock-tracked variants.
//!
//! ## Storage
//! ```text
//! products                         product_variants
//! ┌──────────────────────────┐     ┌────────────────────────────────────┐
//! │ id         "p-1"         │     │ product_id  position  attributes   │
//! │ name       "T-Shirt"     │◄────│ "p-1"       0   {"color":"Red",    │
//! │ sale_price 5000          │     │                  "size":"M"}  30   │
//! │ quantity   50  ◄─ authoritative │ "p-1"       1   {"color":"Blue",   │
//! └──────────────────────────┘     │                  "size":"L"}  20   │
//!                                  └────────────────────────────────────┘
//! ```
//!
//! Stock changes never go through this repository; see [`crate::inventory`].

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use till_core::validation::validate_new_product;
use till_core::{Money, NewProduct, Product, ProductVariant, ValidationError};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    barcode: Option<String>,
    description: Option<String>,
    sale_price: Money,
    purchase_cost: Money,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, variants: Vec<ProductVariant>) -> Product {
        Product {
            id: self.id,
            name: self.name,
            barcode: self.barcode,
            description: self.description,
            sale_price: self.sale_price,
            purchase_cost: self.purchase_cost,
            quantity: self.quantity,
            variants,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct VariantRow {
    pub position: i64,
    pub attributes: String,
    pub quantity: i64,
}

impl VariantRow {
    pub(crate) fn to_variant(&self) -> DbResult<ProductVariant> {
        let attributes = serde_json::from_str(&self.attributes)
            .map_err(|e| DbError::corrupt("product_variants.attributes", e))?;
        Ok(ProductVariant {
            attributes,
            quantity: self.quantity,
        })
    }
}

/// Variants of a product in position order.
pub(crate) async fn load_variant_rows<'e, E>(executor: E, product_id: &str) -> DbResult<Vec<VariantRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, VariantRow>(
        r#"
        SELECT position, attributes, quantity
        FROM product_variants
        WHERE product_id = ?1
        ORDER BY position
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

const PRODUCT_COLUMNS: &str = r#"
    id, name, barcode, description, sale_price, purchase_cost, quantity,
    created_at, updated_at
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let product = db.products().insert(&new_product).await?;
/// let same = db.products().get_by_barcode("7701234567890").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Validates and inserts a product with its variants.
    ///
    /// ## Errors
    /// - `Validation` for bad names, prices, stock or duplicate variants
    /// - `Validation(Duplicate)` when the barcode is already taken
    pub async fn insert(&self, product: &NewProduct) -> ServiceResult<Product> {
        validate_new_product(product)?;

        let id = generate_product_id();
        let now = Utc::now();
        let name = product.name.trim().to_string();

        debug!(id = %id, name = %name, variants = product.variants.len(), "Inserting product");

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO products (
                id, name, barcode, description, sale_price, purchase_cost,
                quantity, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(&product.barcode)
        .bind(&product.description)
        .bind(product.sale_price)
        .bind(product.purchase_cost)
        .bind(product.quantity)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            let err = DbError::from(err);
            if err.is_unique_violation_on("products.barcode") {
                return Err(ValidationError::Duplicate {
                    field: "barcode".to_string(),
                    value: product.barcode.clone().unwrap_or_default(),
                }
                .into());
            }
            return Err(err.into());
        }

        for (position, variant) in product.variants.iter().enumerate() {
            let attributes = serde_json::to_string(&variant.attributes).map_err(DbError::from)?;
            sqlx::query(
                r#"
                INSERT INTO product_variants (product_id, position, attributes, quantity)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&id)
            .bind(position as i64)
            .bind(attributes)
            .bind(variant.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(id = %id, name = %name, "Product created");

        Ok(Product {
            id,
            name,
            barcode: product.barcode.clone(),
            description: product.description.clone(),
            sale_price: product.sale_price,
            purchase_cost: product.purchase_cost,
            quantity: product.quantity,
            variants: product.variants.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a product (with variants) by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_variants(row).await
    }

    /// Gets a product (with variants) by barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE barcode = ?1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;

        self.with_variants(row).await
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn with_variants(&self, row: Option<ProductRow>) -> DbResult<Option<Product>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let variants = load_variant_rows(&self.pool, &row.id)
            .await?
            .iter()
            .map(VariantRow::to_variant)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Some(row.into_product(variants)))
    }
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

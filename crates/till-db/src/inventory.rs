//! # Inventory Store
//!
//! Atomic stock deduction and restore for products and their variants.
//!
//! ## Deduct
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  deduct(P, 5, {color: Red})                                             │
//! │                                                                         │
//! │  UPDATE products SET quantity = quantity - 5                            │
//! │   WHERE id = P AND quantity >= 5                                        │
//! │       │                                                                 │
//! │       ├── 0 rows ─► SELECT ─► missing?  ProductNotFound                 │
//! │       │                      └─ short?  InsufficientStock{available}    │
//! │       ▼                                                                 │
//! │  selector given? ── no ──► done                                         │
//! │       │ yes                                                             │
//! │  first variant whose attributes contain every selector pair            │
//! │       ├── none ─► VariantNotFound                                       │
//! │       ▼                                                                 │
//! │  UPDATE product_variants SET quantity = quantity - 5                    │
//! │   WHERE product_id = P AND position = i AND quantity >= 5               │
//! │       └── 0 rows ─► InsufficientVariantStock{available}                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the decrement are one statement, so two concurrent sales
//! can never both spend the last unit. Any error leaves the caller's
//! transaction to roll back the aggregate decrement as well.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbResult, ServiceResult};
use crate::repository::product::{load_variant_rows, VariantRow};
use till_core::{describe_selector, find_variant, CoreError, Money, ProductVariant, VariantSelector};

/// Catalog figures captured while the stock row is locked for a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockedProduct {
    pub id: String,
    pub name: String,
    pub sale_price: Money,
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    name: String,
    sale_price: Money,
    quantity: i64,
}

async fn load_stock(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Option<StockRow>> {
    let row = sqlx::query_as::<_, StockRow>(
        "SELECT name, sale_price, quantity FROM products WHERE id = ?1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Resolves a selector against the product's variants.
async fn resolve_variant(
    conn: &mut SqliteConnection,
    product_id: &str,
    product_name: &str,
    selector: &VariantSelector,
) -> ServiceResult<(i64, ProductVariant)> {
    let rows = load_variant_rows(&mut *conn, product_id).await?;
    let variants = rows
        .iter()
        .map(VariantRow::to_variant)
        .collect::<DbResult<Vec<_>>>()?;

    match find_variant(&variants, selector) {
        Some(index) => Ok((rows[index].position, variants[index].clone())),
        None => Err(CoreError::VariantNotFound {
            product: product_name.to_string(),
            selector: describe_selector(selector),
        }
        .into()),
    }
}

/// Deducts stock inside the caller's transaction.
///
/// Must be the transaction's first statement (or follow other writes) so
/// the writer lock is held before anything is read.
pub(crate) async fn deduct(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    selector: Option<&VariantSelector>,
    now: DateTime<Utc>,
) -> ServiceResult<StockedProduct> {
    let result = sqlx::query(
        r#"
        UPDATE products SET quantity = quantity - ?2, updated_at = ?3
        WHERE id = ?1 AND quantity >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let stock = load_stock(conn, product_id).await?;

    if result.rows_affected() == 0 {
        return Err(match stock {
            None => CoreError::ProductNotFound(product_id.to_string()),
            Some(stock) => CoreError::InsufficientStock {
                product: stock.name,
                available: stock.quantity,
                requested: quantity,
            },
        }
        .into());
    }

    let Some(stock) = stock else {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    };

    if let Some(selector) = selector.filter(|s| !s.is_empty()) {
        let (position, variant) = resolve_variant(conn, product_id, &stock.name, selector).await?;

        let result = sqlx::query(
            r#"
            UPDATE product_variants SET quantity = quantity - ?3
            WHERE product_id = ?1 AND position = ?2 AND quantity >= ?3
            "#,
        )
        .bind(product_id)
        .bind(position)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::InsufficientVariantStock {
                product: stock.name,
                available: variant.quantity,
                requested: quantity,
            }
            .into());
        }
    }

    debug!(product_id = %product_id, quantity, "Stock deducted");

    Ok(StockedProduct {
        id: product_id.to_string(),
        name: stock.name,
        sale_price: stock.sale_price,
    })
}

/// Returns stock inside the caller's transaction. Unconditional increment.
pub(crate) async fn restore(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    selector: Option<&VariantSelector>,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let result = sqlx::query(
        "UPDATE products SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    }

    if let Some(selector) = selector.filter(|s| !s.is_empty()) {
        let name: String = sqlx::query_scalar("SELECT name FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_one(&mut *conn)
            .await?;
        let (position, _) = resolve_variant(conn, product_id, &name, selector).await?;

        sqlx::query(
            r#"
            UPDATE product_variants SET quantity = quantity + ?3
            WHERE product_id = ?1 AND position = ?2
            "#,
        )
        .bind(product_id)
        .bind(position)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }

    debug!(product_id = %product_id, quantity, "Stock restored");
    Ok(())
}

// =============================================================================
// Store
// =============================================================================

/// Standalone stock operations, each in its own transaction.
///
/// Sales use the transaction-scoped functions directly so that every line's
/// deduction commits or rolls back with the sale.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    pool: SqlitePool,
}

impl InventoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryStore { pool }
    }

    /// Deducts `quantity` units, and from the matching variant if a selector
    /// is given.
    ///
    /// ## Errors
    /// `ProductNotFound`, `InsufficientStock`, `VariantNotFound`,
    /// `InsufficientVariantStock`; on any error nothing is deducted.
    pub async fn deduct(
        &self,
        product_id: &str,
        quantity: i64,
        selector: Option<&VariantSelector>,
    ) -> ServiceResult<StockedProduct> {
        till_core::validation::validate_quantity(quantity)?;
        let mut tx = self.pool.begin().await?;
        let stocked = deduct(&mut tx, product_id, quantity, selector, Utc::now()).await?;
        tx.commit().await?;
        Ok(stocked)
    }

    /// Inverse of [`deduct`](Self::deduct).
    pub async fn restore(
        &self,
        product_id: &str,
        quantity: i64,
        selector: Option<&VariantSelector>,
    ) -> ServiceResult<()> {
        till_core::validation::validate_quantity(quantity)?;
        let mut tx = self.pool.begin().await?;
        restore(&mut tx, product_id, quantity, selector, Utc::now()).await?;
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Sale Repository
//!
//! Storage for sale snapshots: a header row, its priced items and its
//! payment lines.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (checkout, one transaction)                                 │
//! │     └── insert_sale() → sales + sale_items + sale_payments             │
//! │                                                                         │
//! │  2. LINK (ledger)                                                      │
//! │     └── set_session() → sales.session_id = open session                │
//! │                                                                         │
//! │  3. (OPTIONAL) EDIT while the session is open                          │
//! │     └── replace_lines() → new items, payments and totals               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Items and payments are copies taken at sale time. Nothing here reads the
//! live catalog.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{Page, PageRequest};
use till_core::{Discount, Money, PaymentDetail, Sale, SaleItem, VariantSelector};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    cashier_id: String,
    session_id: Option<String>,
    total_amount: Money,
    total_payment_amount: Money,
    change_amount: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    product_id: String,
    product_name: String,
    quantity: i64,
    variant: Option<String>,
    sale_price: Money,
    effective_unit_price: Money,
    discounts: String,
    line_total: Money,
}

impl SaleItemRow {
    fn into_item(self) -> DbResult<SaleItem> {
        let variant: Option<VariantSelector> = self
            .variant
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DbError::corrupt("sale_items.variant", e))?;
        let discounts: Vec<Discount> = serde_json::from_str(&self.discounts)
            .map_err(|e| DbError::corrupt("sale_items.discounts", e))?;

        Ok(SaleItem {
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            variant,
            sale_price: self.sale_price,
            effective_unit_price: self.effective_unit_price,
            discounts,
            line_total: self.line_total,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SalePaymentRow {
    payment_method_id: String,
    payment_method_code: String,
    payment_method_name: String,
    amount: Money,
}

impl From<SalePaymentRow> for PaymentDetail {
    fn from(row: SalePaymentRow) -> Self {
        PaymentDetail {
            payment_method_id: row.payment_method_id,
            payment_method_code: row.payment_method_code,
            payment_method_name: row.payment_method_name,
            amount: row.amount,
        }
    }
}

const SALE_COLUMNS: &str = r#"
    s.id, s.cashier_id, s.session_id, s.total_amount, s.total_payment_amount,
    s.change_amount, s.created_at, s.updated_at
"#;

// =============================================================================
// Transaction-scoped operations
// =============================================================================

async fn hydrate(conn: &mut SqliteConnection, row: SaleRow) -> DbResult<Sale> {
    let items = sqlx::query_as::<_, SaleItemRow>(
        r#"
        SELECT product_id, product_name, quantity, variant, sale_price,
               effective_unit_price, discounts, line_total
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(SaleItemRow::into_item)
    .collect::<DbResult<Vec<_>>>()?;

    let payment_details = load_payments(conn, &row.id).await?;

    Ok(Sale {
        id: row.id,
        cashier_id: row.cashier_id,
        items,
        total_amount: row.total_amount,
        payment_details,
        total_payment_amount: row.total_payment_amount,
        change_amount: row.change_amount,
        session_id: row.session_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Loads a full sale snapshot.
pub(crate) async fn load_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {} FROM sales s WHERE s.id = ?1", SALE_COLUMNS);
    let row = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

/// Payment lines of a sale, in request order.
pub(crate) async fn load_payments(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<PaymentDetail>> {
    let rows = sqlx::query_as::<_, SalePaymentRow>(
        r#"
        SELECT payment_method_id, payment_method_code, payment_method_name, amount
        FROM sale_payments
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(PaymentDetail::from).collect())
}

/// Sales linked to a session, in link order.
pub(crate) async fn load_session_sales(conn: &mut SqliteConnection, session_id: &str) -> DbResult<Vec<Sale>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM session_sales ss
        JOIN sales s ON s.id = ss.sale_id
        WHERE ss.session_id = ?1
        ORDER BY ss.rowid
        "#,
        SALE_COLUMNS
    );
    let rows = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

    let mut sales = Vec::with_capacity(rows.len());
    for row in rows {
        sales.push(hydrate(conn, row).await?);
    }
    Ok(sales)
}

/// Inserts a sale header with its items and payments.
pub(crate) async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, total = %sale.total_amount, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, cashier_id, session_id, total_amount, total_payment_amount,
            change_amount, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.cashier_id)
    .bind(&sale.session_id)
    .bind(sale.total_amount)
    .bind(sale.total_payment_amount)
    .bind(sale.change_amount)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    insert_lines(conn, sale).await
}

/// Replaces a sale's items, payments and totals with those of `sale`.
pub(crate) async fn replace_lines(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, total = %sale.total_amount, "Replacing sale lines");

    let result = sqlx::query(
        r#"
        UPDATE sales SET
            total_amount = ?2,
            total_payment_amount = ?3,
            change_amount = ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(&sale.id)
    .bind(sale.total_amount)
    .bind(sale.total_payment_amount)
    .bind(sale.change_amount)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale", &sale.id));
    }

    sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
        .bind(&sale.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM sale_payments WHERE sale_id = ?1")
        .bind(&sale.id)
        .execute(&mut *conn)
        .await?;

    insert_lines(conn, sale).await
}

async fn insert_lines(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    for (position, item) in sale.items.iter().enumerate() {
        let variant = item.variant.as_ref().map(serde_json::to_string).transpose()?;
        let discounts = serde_json::to_string(&item.discounts)?;

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                sale_id, position, product_id, product_name, quantity, variant,
                sale_price, effective_unit_price, discounts, line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sale.id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(variant)
        .bind(item.sale_price)
        .bind(item.effective_unit_price)
        .bind(discounts)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }

    for (position, payment) in sale.payment_details.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_payments (
                sale_id, position, payment_method_id, payment_method_code,
                payment_method_name, amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sale.id)
        .bind(position as i64)
        .bind(&payment.payment_method_id)
        .bind(&payment.payment_method_code)
        .bind(&payment.payment_method_name)
        .bind(payment.amount)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Points a sale at a session, or detaches it with `None`.
pub(crate) async fn set_session(
    conn: &mut SqliteConnection,
    sale_id: &str,
    session_id: Option<&str>,
) -> DbResult<()> {
    sqlx::query("UPDATE sales SET session_id = ?2 WHERE id = ?1")
        .bind(sale_id)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to stored sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its items and payments.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        load_sale(&mut conn, id).await
    }

    /// Lists sales newest first, optionally for one cashier.
    pub async fn list(&self, cashier_id: Option<&str>, page: PageRequest) -> DbResult<Page<Sale>> {
        let mut conn = self.pool.acquire().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales s");
        push_cashier_filter(&mut count, cashier_id);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM sales s", SALE_COLUMNS));
        push_cashier_filter(&mut select, cashier_id);
        select
            .push(" ORDER BY s.created_at DESC, s.rowid DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<SaleRow> = select.build_query_as::<SaleRow>().fetch_all(&mut *conn).await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            sales.push(hydrate(&mut conn, row).await?);
        }

        Ok(Page::new(sales, total, page))
    }
}

fn push_cashier_filter<'a>(query: &mut QueryBuilder<'a, Sqlite>, cashier_id: Option<&'a str>) {
    if let Some(cashier_id) = cashier_id {
        query.push(" WHERE s.cashier_id = ").push_bind(cashier_id);
    }
}

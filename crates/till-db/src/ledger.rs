//! # Session Ledger Linker
//!
//! Attaches a completed sale to its cashier's open drawer session and rolls
//! the sale's figures into the session's running totals.
//!
//! ## Link
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_sale_to_session(sale S, cashier C)                                 │
//! │                                                                         │
//! │  INSERT OR IGNORE INTO session_sales                                    │
//! │  SELECT open session of C, S  (only if S exists and is not bound to    │
//! │                                a different session)                     │
//! │       │                                                                 │
//! │       ├── 1 row ─► contribution = SaleContribution::of_sale(S)          │
//! │       │            total_sales += ..., expected_cash += net cash, ...  │
//! │       │            payment totals upserted per method     ──► true      │
//! │       │                                                                 │
//! │       └── 0 rows ─► no open session                        ──► false    │
//! │                     already linked to it                   ──► true     │
//! │                     sale missing / bound elsewhere         ──► false    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Linking is idempotent: the (session, sale) pair is a set, so a retried
//! call never counts a sale twice. All increments are `col = col + ?`
//! statements, so concurrent links to the same session cannot lose updates.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbResult, ServiceResult};
use crate::repository::{sale, session};
use till_core::settlement::SaleContribution;

/// Adds a contribution (or a delta) to a session's running totals.
pub(crate) async fn apply_contribution(
    conn: &mut SqliteConnection,
    session_id: &str,
    contribution: &SaleContribution,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE cash_sessions SET
            total_sales = total_sales + ?2,
            expected_cash = expected_cash + ?3,
            expected_non_cash = expected_non_cash + ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(session_id)
    .bind(contribution.total_sales)
    .bind(contribution.cash)
    .bind(contribution.non_cash)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for entry in &contribution.by_method {
        sqlx::query(
            r#"
            INSERT INTO session_payment_totals (
                session_id, payment_method_id, payment_method_code, total
            ) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (session_id, payment_method_id)
            DO UPDATE SET total = total + excluded.total
            "#,
        )
        .bind(session_id)
        .bind(&entry.payment_method_id)
        .bind(&entry.payment_method_code)
        .bind(entry.total)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Links a sale inside the caller's transaction.
///
/// Returns whether the sale is (now) part of the cashier's open session.
pub(crate) async fn link_sale(
    conn: &mut SqliteConnection,
    sale_id: &str,
    cashier_id: &str,
    now: DateTime<Utc>,
) -> ServiceResult<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO session_sales (session_id, sale_id, linked_at)
        SELECT cs.id, ?1, ?3
        FROM cash_sessions cs
        WHERE cs.cashier_id = ?2
          AND cs.status = 'open'
          AND EXISTS (
              SELECT 1 FROM sales s
              WHERE s.id = ?1 AND (s.session_id IS NULL OR s.session_id = cs.id)
          )
        "#,
    )
    .bind(sale_id)
    .bind(cashier_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let Some(session_id) = session::open_session_id(&mut *conn, cashier_id).await? else {
        debug!(sale_id = %sale_id, cashier_id = %cashier_id, "No open session to link to");
        return Ok(false);
    };

    if inserted.rows_affected() == 0 {
        let already: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM session_sales WHERE session_id = ?1 AND sale_id = ?2",
        )
        .bind(&session_id)
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?;

        debug!(
            sale_id = %sale_id,
            session_id = %session_id,
            already_linked = already.is_some(),
            "Sale not linked"
        );
        return Ok(already.is_some());
    }

    // The EXISTS guard above means the sale row is present.
    let Some(linked) = sale::load_sale(conn, sale_id).await? else {
        return Ok(false);
    };
    sale::set_session(conn, sale_id, Some(&session_id)).await?;

    let contribution = SaleContribution::of_sale(&linked);
    apply_contribution(conn, &session_id, &contribution, now).await?;

    info!(
        sale_id = %sale_id,
        session_id = %session_id,
        total = %contribution.total_sales,
        cash = %contribution.cash,
        non_cash = %contribution.non_cash,
        "Sale linked to session"
    );

    Ok(true)
}

/// Standalone linker, one transaction per call.
#[derive(Debug, Clone)]
pub struct SessionLedger {
    pool: SqlitePool,
}

impl SessionLedger {
    pub fn new(pool: SqlitePool) -> Self {
        SessionLedger { pool }
    }

    /// Links `sale_id` to `cashier_id`'s open session.
    ///
    /// `Ok(false)` when the cashier has no open session; never an error for
    /// that case.
    pub async fn add_sale_to_session(&self, sale_id: &str, cashier_id: &str) -> ServiceResult<bool> {
        let mut tx = self.pool.begin().await?;
        let linked = link_sale(&mut tx, sale_id, cashier_id, Utc::now()).await?;
        tx.commit().await?;
        Ok(linked)
    }
}

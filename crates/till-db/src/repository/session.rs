//! # Session Repository
//!
//! Storage for cash drawer sessions.
//!
//! ## Tables
//! ```text
//! cash_sessions            one row per session; running or reconciled totals
//! session_sales            (session, sale) set; rowid keeps link order
//! session_payment_totals   per-method totals, keyed (session, method)
//! ```
//!
//! A partial unique index on `cash_sessions(cashier_id) WHERE status='open'`
//! enforces one open session per cashier in the database itself.

use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::DbResult;
use crate::repository::{Page, PageRequest};
use till_core::{CashSession, Money, PaymentTotal, SessionStatus};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub id: String,
    pub cashier_id: String,
    pub status: SessionStatus,
    pub opening_date: DateTime<Utc>,
    pub closing_date: Option<DateTime<Utc>>,
    pub initial_cash: Money,
    pub total_sales: Money,
    pub expected_cash: Money,
    pub expected_non_cash: Money,
    pub actual_cash: Option<Money>,
    pub cash_difference: Option<Money>,
    pub notes: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentTotalRow {
    payment_method_id: String,
    payment_method_code: String,
    total: Money,
}

const SESSION_COLUMNS: &str = r#"
    id, cashier_id, status, opening_date, closing_date, initial_cash,
    total_sales, expected_cash, expected_non_cash, actual_cash,
    cash_difference, notes
"#;

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Fetches just the session row.
pub(crate) async fn load_session_row<'e, E>(executor: E, id: &str) -> DbResult<Option<SessionRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM cash_sessions WHERE id = ?1", SESSION_COLUMNS);
    let row = sqlx::query_as::<_, SessionRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

async fn hydrate(conn: &mut SqliteConnection, row: SessionRow) -> DbResult<CashSession> {
    let sales: Vec<String> = sqlx::query_scalar(
        "SELECT sale_id FROM session_sales WHERE session_id = ?1 ORDER BY rowid",
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let payment_totals = sqlx::query_as::<_, PaymentTotalRow>(
        r#"
        SELECT payment_method_id, payment_method_code, total
        FROM session_payment_totals
        WHERE session_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|t| PaymentTotal {
        payment_method_id: t.payment_method_id,
        payment_method_code: t.payment_method_code,
        total: t.total,
    })
    .collect();

    Ok(CashSession {
        id: row.id,
        cashier_id: row.cashier_id,
        status: row.status,
        opening_date: row.opening_date,
        closing_date: row.closing_date,
        initial_cash: row.initial_cash,
        sales,
        payment_totals,
        total_sales: row.total_sales,
        expected_cash: row.expected_cash,
        expected_non_cash: row.expected_non_cash,
        actual_cash: row.actual_cash,
        cash_difference: row.cash_difference,
        notes: row.notes,
    })
}

/// Loads a session with its linked sale ids and per-method totals.
pub(crate) async fn load_session(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CashSession>> {
    match load_session_row(&mut *conn, id).await? {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

/// Id of the cashier's open session, if any.
pub(crate) async fn open_session_id<'e, E>(executor: E, cashier_id: &str) -> DbResult<Option<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar(
        "SELECT id FROM cash_sessions WHERE cashier_id = ?1 AND status = 'open'",
    )
    .bind(cashier_id)
    .fetch_optional(executor)
    .await?;
    Ok(id)
}

// =============================================================================
// Repository
// =============================================================================

/// Filters for [`SessionRepository::list`]. `from`/`to` bound the opening date.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub cashier_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the notes. Blank means no filter.
    pub search: Option<String>,
}

/// Read access to drawer sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        load_session(&mut conn, id).await
    }

    /// The cashier's open session, if any.
    pub async fn get_open_for_cashier(&self, cashier_id: &str) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        match open_session_id(&mut *conn, cashier_id).await? {
            Some(id) => load_session(&mut conn, &id).await,
            None => Ok(None),
        }
    }

    /// Lists sessions newest first.
    pub async fn list(&self, filter: &SessionFilter, page: PageRequest) -> DbResult<Page<CashSession>> {
        let mut conn = self.pool.acquire().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM cash_sessions");
        push_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM cash_sessions", SESSION_COLUMNS));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY opening_date DESC, rowid DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<SessionRow>()
            .fetch_all(&mut *conn)
            .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(hydrate(&mut conn, row).await?);
        }

        Ok(Page::new(sessions, total, page))
    }
}

fn push_filters<'a>(query: &mut QueryBuilder<'a, Sqlite>, filter: &'a SessionFilter) {
    let mut separator = " WHERE ";
    if let Some(status) = filter.status {
        query.push(separator).push("status = ").push_bind(status);
        separator = " AND ";
    }
    if let Some(cashier_id) = &filter.cashier_id {
        query.push(separator).push("cashier_id = ").push_bind(cashier_id);
        separator = " AND ";
    }
    if let Some(from) = filter.from {
        query.push(separator).push("opening_date >= ").push_bind(from);
        separator = " AND ";
    }
    if let Some(to) = filter.to {
        query.push(separator).push("opening_date <= ").push_bind(to);
        separator = " AND ";
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // SQLite LIKE folds ASCII case
        query
            .push(separator)
            .push("notes LIKE ")
            .push_bind(format!("%{}%", escape_like(search)))
            .push(" ESCAPE '\\'");
    }
}

/// Escapes `%`, `_` and `\` so they match literally inside a LIKE pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

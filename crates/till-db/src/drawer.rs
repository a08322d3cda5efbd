//! # Cash Session Manager
//!
//! Opens and closes cashier drawer sessions and answers queries about them.
//!
//! ## State Machine
//! ```text
//!   open_session ──► [open] ──close_session──► [closed]   (terminal)
//!                      │ ▲
//!                      │ └── ledger links sales, notes may change
//! ```
//!
//! ## Close
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │  UPDATE cash_sessions SET status='closed', ...                          │
//! │   WHERE id=? AND cashier_id=? AND status='open'     ← writer lock      │
//! │       │                                                                 │
//! │       ├── 0 rows ─► SessionNotFound | NotOwner | AlreadyClosed          │
//! │       ▼                                                                 │
//! │  re-read every linked sale, recompute from scratch:                    │
//! │    expectedCash   = initialCash + Σ net cash                            │
//! │    expectedNonCash = Σ non-cash                                        │
//! │    cashDifference = actualCash − expectedCash                          │
//! │  replace per-method totals                                             │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A link that commits before the close is counted by the recomputation. A
//! link that starts after the close sees no open session and returns false.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, ServiceResult};
use crate::repository::session::{self, SessionFilter, SessionRepository};
use crate::repository::{sale, Page, PageRequest};
use till_core::settlement::{cash_difference, reconcile, SaleContribution};
use till_core::validation::{validate_actual_cash, validate_initial_cash, validate_notes};
use till_core::{CashSession, CoreError, Money, Sale, SessionStatus};

/// A session together with the sales linked to it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub session: CashSession,
    pub sales: Vec<Sale>,
}

/// Manages drawer sessions.
#[derive(Debug, Clone)]
pub struct CashSessionManager {
    pool: SqlitePool,
}

impl CashSessionManager {
    pub fn new(pool: SqlitePool) -> Self {
        CashSessionManager { pool }
    }

    fn sessions(&self) -> SessionRepository {
        SessionRepository::new(self.pool.clone())
    }

    /// Opens a session for `cashier_id` with `initial_cash` in the drawer.
    ///
    /// ## Errors
    /// - `OpenSessionExists` if the cashier already has one open
    /// - `InvalidInitialCash` if `initial_cash < 0`
    pub async fn open_session(&self, cashier_id: &str, initial_cash: Money) -> ServiceResult<CashSession> {
        if session::open_session_id(&self.pool, cashier_id).await?.is_some() {
            return Err(CoreError::OpenSessionExists {
                cashier_id: cashier_id.to_string(),
            }
            .into());
        }
        validate_initial_cash(initial_cash)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, cashier_id, status, opening_date, initial_cash,
                total_sales, expected_cash, expected_non_cash, notes,
                created_at, updated_at
            ) VALUES (?1, ?2, 'open', ?3, ?4, 0, ?4, 0, '', ?3, ?3)
            "#,
        )
        .bind(&id)
        .bind(cashier_id)
        .bind(now)
        .bind(initial_cash)
        .execute(&self.pool)
        .await;

        // Lost a race with another open for the same cashier.
        if let Err(err) = inserted {
            let err = DbError::from(err);
            if err.is_unique_violation_on("cash_sessions.cashier_id") {
                return Err(CoreError::OpenSessionExists {
                    cashier_id: cashier_id.to_string(),
                }
                .into());
            }
            return Err(err.into());
        }

        info!(
            session_id = %id,
            cashier_id = %cashier_id,
            initial_cash = %initial_cash,
            "Session opened"
        );

        Ok(CashSession {
            id,
            cashier_id: cashier_id.to_string(),
            status: SessionStatus::Open,
            opening_date: now,
            closing_date: None,
            initial_cash,
            sales: Vec::new(),
            payment_totals: Vec::new(),
            total_sales: Money::zero(),
            expected_cash: initial_cash,
            expected_non_cash: Money::zero(),
            actual_cash: None,
            cash_difference: None,
            notes: String::new(),
        })
    }

    /// Closes a session and reconciles the drawer.
    ///
    /// `notes = None` keeps the session's current notes.
    ///
    /// ## Errors
    /// - `InvalidActualCash` if `actual_cash < 0`
    /// - `SessionNotFound`, then `NotOwner`, then `AlreadyClosed`
    pub async fn close_session(
        &self,
        session_id: &str,
        actual_cash: Money,
        notes: Option<&str>,
        requester_id: &str,
    ) -> ServiceResult<CashSession> {
        validate_actual_cash(actual_cash)?;
        if let Some(notes) = notes {
            validate_notes(notes)?;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                status = 'closed',
                closing_date = ?3,
                actual_cash = ?4,
                notes = COALESCE(?5, notes),
                updated_at = ?3
            WHERE id = ?1 AND cashier_id = ?2 AND status = 'open'
            "#,
        )
        .bind(session_id)
        .bind(requester_id)
        .bind(now)
        .bind(actual_cash)
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        let Some(row) = session::load_session_row(&mut *tx, session_id).await? else {
            return Err(CoreError::SessionNotFound(session_id.to_string()).into());
        };

        if closed.rows_affected() == 0 {
            return Err(if row.cashier_id != requester_id {
                CoreError::NotOwner {
                    session_id: session_id.to_string(),
                }
            } else {
                CoreError::AlreadyClosed(session_id.to_string())
            }
            .into());
        }

        let sales = sale::load_session_sales(&mut tx, session_id).await?;
        let contributions: Vec<SaleContribution> = sales.iter().map(SaleContribution::of_sale).collect();
        let totals = reconcile(row.initial_cash, contributions.iter());
        let difference = cash_difference(actual_cash, totals.expected_cash);

        debug!(
            session_id = %session_id,
            sales = sales.len(),
            drift_total_sales = %(row.total_sales - totals.total_sales),
            drift_expected_cash = %(row.expected_cash - totals.expected_cash),
            "Recomputed session totals"
        );

        sqlx::query(
            r#"
            UPDATE cash_sessions SET
                total_sales = ?2,
                expected_cash = ?3,
                expected_non_cash = ?4,
                cash_difference = ?5
            WHERE id = ?1
            "#,
        )
        .bind(session_id)
        .bind(totals.total_sales)
        .bind(totals.expected_cash)
        .bind(totals.expected_non_cash)
        .bind(difference)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM session_payment_totals WHERE session_id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        for entry in &totals.payment_totals {
            sqlx::query(
                r#"
                INSERT INTO session_payment_totals (
                    session_id, payment_method_id, payment_method_code, total
                ) VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(session_id)
            .bind(&entry.payment_method_id)
            .bind(&entry.payment_method_code)
            .bind(entry.total)
            .execute(&mut *tx)
            .await?;
        }

        let session = session::load_session(&mut tx, session_id)
            .await?
            .ok_or_else(|| DbError::not_found("Session", session_id))?;

        tx.commit().await?;

        info!(
            session_id = %session_id,
            cashier_id = %requester_id,
            expected_cash = %totals.expected_cash,
            actual_cash = %actual_cash,
            cash_difference = %difference,
            "Session closed"
        );

        Ok(session)
    }

    /// The cashier's open session, if any.
    pub async fn get_open_session(&self, cashier_id: &str) -> ServiceResult<Option<CashSession>> {
        Ok(self.sessions().get_open_for_cashier(cashier_id).await?)
    }

    /// A session with its linked sales.
    ///
    /// ## Errors
    /// `SessionNotFound`
    pub async fn get_session(&self, session_id: &str) -> ServiceResult<SessionDetail> {
        let mut conn = self.pool.acquire().await?;
        let Some(session) = session::load_session(&mut conn, session_id).await? else {
            return Err(CoreError::SessionNotFound(session_id.to_string()).into());
        };
        let sales = sale::load_session_sales(&mut conn, session_id).await?;
        Ok(SessionDetail { session, sales })
    }

    /// Sessions newest first.
    pub async fn list_sessions(&self, filter: &SessionFilter, page: PageRequest) -> ServiceResult<Page<CashSession>> {
        Ok(self.sessions().list(filter, page).await?)
    }

    /// Replaces the notes of an open session.
    ///
    /// ## Errors
    /// `SessionNotFound`, `AlreadyClosed`
    pub async fn update_notes(&self, session_id: &str, notes: &str) -> ServiceResult<CashSession> {
        validate_notes(notes)?;

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE cash_sessions SET notes = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'open'",
        )
        .bind(session_id)
        .bind(notes)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let Some(session) = session::load_session(&mut tx, session_id).await? else {
            return Err(CoreError::SessionNotFound(session_id.to_string()).into());
        };
        if updated.rows_affected() == 0 {
            return Err(CoreError::AlreadyClosed(session_id.to_string()).into());
        }

        tx.commit().await?;
        debug!(session_id = %session_id, "Session notes updated");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item, pay, request, Fixture, CASHIER};

    #[tokio::test]
    async fn test_open_session_starts_at_initial_cash() {
        let f = Fixture::new().await;
        let session = f
            .db
            .drawer()
            .open_session(CASHIER, Money::from_cents(10_000))
            .await
            .unwrap();

        assert!(session.is_open());
        assert_eq!(session.expected_cash, Money::from_cents(10_000));
        assert_eq!(session.total_sales, Money::zero());
        assert!(session.actual_cash.is_none());

        let stored = f.db.drawer().get_open_session(CASHIER).await.unwrap().unwrap();
        assert_eq!(stored.id, session.id);
        assert_eq!(stored.initial_cash, Money::from_cents(10_000));
    }

    #[tokio::test]
    async fn test_open_session_twice_conflicts() {
        let f = Fixture::new().await;
        let drawer = f.db.drawer();
        drawer.open_session(CASHIER, Money::zero()).await.unwrap();

        let err = drawer.open_session(CASHIER, Money::zero()).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::OpenSessionExists { .. })));

        // Existing session wins over bad input.
        let err = drawer.open_session(CASHIER, Money::from_cents(-1)).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::OpenSessionExists { .. })));

        drawer.open_session("cashier-2", Money::zero()).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_session_rejects_negative_cash() {
        let f = Fixture::new().await;
        let err = f
            .db
            .drawer()
            .open_session(CASHIER, Money::from_cents(-100))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidInitialCash)));
        assert!(f.db.drawer().get_open_session(CASHIER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_session_reconciles_drawer() {
        let f = Fixture::new().await;
        let drawer = f.db.drawer();
        let session = drawer.open_session(CASHIER, Money::from_cents(10_000)).await.unwrap();

        // 50.00 item paid with 60.00 cash: 10.00 change.
        let created = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![pay(&f.cash, 6_000)]))
            .await
            .unwrap();
        assert!(created.added_to_session);

        let closed = drawer
            .close_session(&session.id, Money::from_cents(14_000), Some("short"), CASHIER)
            .await
            .unwrap();

        assert_eq!(closed.status, SessionStatus::Closed);
        assert!(closed.closing_date.is_some());
        assert_eq!(closed.total_sales, Money::from_cents(5_000));
        assert_eq!(closed.expected_cash, Money::from_cents(15_000));
        assert_eq!(closed.expected_non_cash, Money::zero());
        assert_eq!(closed.actual_cash, Some(Money::from_cents(14_000)));
        assert_eq!(closed.cash_difference, Some(Money::from_cents(-1_000)));
        assert_eq!(closed.notes, "short");
        assert_eq!(closed.payment_totals.len(), 1);
        assert_eq!(closed.payment_totals[0].total, Money::from_cents(5_000));

        assert!(drawer.get_open_session(CASHIER).await.unwrap().is_none());

        // Sales after the close are not counted.
        let later = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![pay(&f.cash, 5_000)]))
            .await
            .unwrap();
        assert!(!later.added_to_session);
    }

    #[tokio::test]
    async fn test_close_session_splits_cash_and_non_cash() {
        let f = Fixture::new().await;
        let drawer = f.db.drawer();
        let session = drawer.open_session(CASHIER, Money::zero()).await.unwrap();

        // 200.00: 110.00 cash + 100.00 card, 10.00 change.
        f.db.checkout()
            .create_sale(
                CASHIER,
                &request(vec![item(&f.lamp, 2)], vec![pay(&f.cash, 11_000), pay(&f.card, 10_000)]),
            )
            .await
            .unwrap();

        let open = f.db.sessions().get_by_id(&session.id).await.unwrap().unwrap();
        let closed = drawer
            .close_session(&session.id, Money::from_cents(10_000), None, CASHIER)
            .await
            .unwrap();

        assert_eq!(closed.total_sales, Money::from_cents(20_000));
        assert_eq!(closed.expected_cash, Money::from_cents(10_000));
        assert_eq!(closed.expected_non_cash, Money::from_cents(10_000));
        assert_eq!(closed.cash_difference, Some(Money::zero()));
        assert_eq!(closed.notes, "");

        assert_eq!(open.expected_cash, closed.expected_cash);
        assert_eq!(open.expected_non_cash, closed.expected_non_cash);
        assert_eq!(open.payment_totals, closed.payment_totals);
    }

    #[tokio::test]
    async fn test_close_session_errors() {
        let f = Fixture::new().await;
        let drawer = f.db.drawer();

        let err = drawer
            .close_session("missing", Money::zero(), None, CASHIER)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::SessionNotFound(_))));

        let session = drawer.open_session(CASHIER, Money::zero()).await.unwrap();

        let err = drawer
            .close_session(&session.id, Money::zero(), None, "cashier-2")
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::NotOwner { .. })));

        let err = drawer
            .close_session(&session.id, Money::from_cents(-1), None, CASHIER)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidActualCash)));

        // Zero counted cash is a valid close.
        let closed = drawer
            .close_session(&session.id, Money::zero(), None, CASHIER)
            .await
            .unwrap();
        assert_eq!(closed.cash_difference, Some(Money::zero()));

        let err = drawer
            .close_session(&session.id, Money::zero(), None, CASHIER)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::AlreadyClosed(_))));

        // Closed sessions free the cashier to open another.
        drawer.open_session(CASHIER, Money::zero()).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_session_lists_linked_sales() {
        let f = Fixture::new().await;
        let drawer = f.db.drawer();
        let session = drawer.open_session(CASHIER, Money::zero()).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let created = f
                .db
                .checkout()
                .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![pay(&f.cash, 5_000)]))
                .await
                .unwrap();
            ids.push(created.sale.id);
        }

        let detail = drawer.get_session(&session.id).await.unwrap();
        assert_eq!(detail.session.sales, ids);
        let sale_ids: Vec<String> = detail.sales.iter().map(|s| s.id.clone()).collect();
        assert_eq!(sale_ids, ids);

        let err = drawer.get_session("missing").await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_sessions_filters_and_pages() {
        let f = Fixture::new().await;
        let drawer = f.db.drawer();

        let first = drawer.open_session(CASHIER, Money::zero()).await.unwrap();
        drawer
            .close_session(&first.id, Money::zero(), Some("Drawer short after 100% promo"), CASHIER)
            .await
            .unwrap();
        let second = drawer.open_session(CASHIER, Money::zero()).await.unwrap();
        drawer.update_notes(&second.id, "promo flyers restocked").await.unwrap();
        drawer.open_session("cashier-2", Money::zero()).await.unwrap();

        let all = drawer
            .list_sessions(&SessionFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.pagination.total, 3);
        assert_eq!(all.pagination.pages, 1);

        let mine_closed = drawer
            .list_sessions(
                &SessionFilter {
                    status: Some(SessionStatus::Closed),
                    cashier_id: Some(CASHIER.to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(mine_closed.items.len(), 1);
        assert_eq!(mine_closed.items[0].id, first.id);

        let paged = drawer
            .list_sessions(&SessionFilter::default(), PageRequest::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.pagination.pages, 2);

        let search = |term: &str| SessionFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };

        let promo = drawer
            .list_sessions(&search("PROMO"), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(promo.pagination.total, 2);

        let short = drawer
            .list_sessions(&search("  short "), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(short.items.len(), 1);
        assert_eq!(short.items[0].id, first.id);

        // wildcards in the term match literally
        let percent = drawer
            .list_sessions(&search("100%"), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(percent.pagination.total, 1);
        let underscore = drawer
            .list_sessions(&search("promo_"), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(underscore.pagination.total, 0);

        let open_promo = drawer
            .list_sessions(
                &SessionFilter {
                    status: Some(SessionStatus::Open),
                    ..search("promo")
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(open_promo.items.len(), 1);
        assert_eq!(open_promo.items[0].id, second.id);

        let blank = drawer
            .list_sessions(&search("   "), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(blank.pagination.total, 3);
    }

    #[tokio::test]
    async fn test_update_notes_only_while_open() {
        let f = Fixture::new().await;
        let drawer = f.db.drawer();
        let session = drawer.open_session(CASHIER, Money::zero()).await.unwrap();

        let updated = drawer.update_notes(&session.id, "float counted twice").await.unwrap();
        assert_eq!(updated.notes, "float counted twice");

        // Close without notes keeps them.
        let closed = drawer
            .close_session(&session.id, Money::zero(), None, CASHIER)
            .await
            .unwrap();
        assert_eq!(closed.notes, "float counted twice");

        let err = drawer.update_notes(&session.id, "late").await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::AlreadyClosed(_))));

        let err = drawer.update_notes("missing", "x").await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::SessionNotFound(_))));

        let err = drawer.update_notes(&session.id, &"x".repeat(1_001)).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Validation(_))));
    }
}

//! # Sale Processor
//!
//! Creates and edits sales. Stock, pricing, payment checks and persistence
//! share one transaction: a sale either lands with every deduction or
//! nothing changes.
//!
//! ## createSale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate request (no I/O)          MissingItems, MissingPayments, ... │
//! │  resolve payment methods            InvalidPaymentMethod               │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    for each item, in order:                                            │
//! │      inventory::deduct              ProductNotFound, Insufficient...   │
//! │      pricing::price_line                                               │
//! │    pricing::settle                  InsufficientPayment ─► ROLLBACK    │
//! │    open session of cashier ─► sale.session_id                          │
//! │    INSERT sale, items, payments                                        │
//! │    SAVEPOINT                                                            │
//! │      ledger::link_sale ─► addedToSession                               │
//! │    (link failure: roll back to savepoint, detach, keep the sale)       │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::inventory;
use crate::ledger;
use crate::repository::payment_method::PaymentMethodRepository;
use crate::repository::{sale, session};
use till_core::pricing::{price_line, sale_total, settle, Settlement};
use till_core::settlement::SaleContribution;
use till_core::validation::validate_sale_request;
use till_core::{CoreError, Money, PaymentDetail, PaymentMethod, Sale, SaleItem, SaleRequest};

/// Result of [`SaleProcessor::create_sale`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSale {
    pub sale: Sale,
    /// Whether the sale was counted into the cashier's open session.
    pub added_to_session: bool,
}

/// Creates and edits sales.
#[derive(Debug, Clone)]
pub struct SaleProcessor {
    pool: SqlitePool,
}

impl SaleProcessor {
    pub fn new(pool: SqlitePool) -> Self {
        SaleProcessor { pool }
    }

    /// Records a sale for `cashier_id`.
    ///
    /// ## Errors
    /// Any validation, stock or payment failure; on error no stock moves and
    /// no sale is stored. Failing to link the sale to a session is not an
    /// error: `added_to_session` is `false` instead.
    pub async fn create_sale(&self, cashier_id: &str, request: &SaleRequest) -> ServiceResult<CreatedSale> {
        validate_sale_request(request)?;
        let methods = PaymentMethodRepository::new(self.pool.clone())
            .resolve_active(&request.payment_details)
            .await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let items = deduct_and_price(&mut tx, request, now).await?;
        let (settlement, payment_details) = settle_payments(&items, request, &methods)?;

        let session_id = session::open_session_id(&mut *tx, cashier_id).await?;

        let mut sale = Sale {
            id: Uuid::new_v4().to_string(),
            cashier_id: cashier_id.to_string(),
            items,
            total_amount: settlement.total_amount,
            payment_details,
            total_payment_amount: settlement.total_payment_amount,
            change_amount: settlement.change_amount,
            session_id,
            created_at: now,
            updated_at: now,
        };
        sale::insert_sale(&mut tx, &sale).await?;

        let added_to_session = link_in_savepoint(&mut tx, &sale, now).await?;
        if !added_to_session && sale.session_id.is_some() {
            sale::set_session(&mut tx, &sale.id, None).await?;
            sale.session_id = None;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            cashier_id = %cashier_id,
            total = %sale.total_amount,
            change = %sale.change_amount,
            added_to_session,
            "Sale created"
        );

        Ok(CreatedSale {
            sale,
            added_to_session,
        })
    }

    /// Replaces a sale's items and payments.
    ///
    /// Old stock is restored before the new items are deducted, so an edit
    /// that keeps a line's quantity needs no spare stock. If the sale belongs
    /// to a session, the session's totals move by the difference.
    ///
    /// ## Errors
    /// - `SaleNotFound`
    /// - `SessionClosed` when the sale's session has been reconciled
    /// - everything [`create_sale`](Self::create_sale) can return
    pub async fn update_sale(&self, sale_id: &str, request: &SaleRequest) -> ServiceResult<Sale> {
        validate_sale_request(request)?;
        let methods = PaymentMethodRepository::new(self.pool.clone())
            .resolve_active(&request.payment_details)
            .await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Writer lock first.
        let touched = sqlx::query("UPDATE sales SET updated_at = ?2 WHERE id = ?1")
            .bind(sale_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        }

        let Some(old) = sale::load_sale(&mut tx, sale_id).await? else {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        };

        if let Some(session_id) = &old.session_id {
            let open = session::load_session_row(&mut *tx, session_id)
                .await?
                .map(|row| row.status == till_core::SessionStatus::Open)
                .unwrap_or(false);
            if !open {
                return Err(CoreError::SessionClosed {
                    sale_id: sale_id.to_string(),
                    session_id: session_id.clone(),
                }
                .into());
            }
        }

        for item in &old.items {
            inventory::restore(&mut tx, &item.product_id, item.quantity, item.variant.as_ref(), now)
                .await?;
        }

        let items = deduct_and_price(&mut tx, request, now).await?;
        let (settlement, payment_details) = settle_payments(&items, request, &methods)?;

        let updated = Sale {
            items,
            total_amount: settlement.total_amount,
            payment_details,
            total_payment_amount: settlement.total_payment_amount,
            change_amount: settlement.change_amount,
            updated_at: now,
            ..old.clone()
        };
        sale::replace_lines(&mut tx, &updated).await?;

        if let Some(session_id) = &updated.session_id {
            let delta = SaleContribution::of_sale(&updated).minus(&SaleContribution::of_sale(&old));
            if !delta.is_zero() {
                ledger::apply_contribution(&mut tx, session_id, &delta, now).await?;
            }
            debug!(sale_id = %sale_id, session_id = %session_id, "Session totals re-synced");
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            old_total = %old.total_amount,
            new_total = %updated.total_amount,
            "Sale updated"
        );

        Ok(updated)
    }
}

/// Deducts stock and prices every line, in request order.
async fn deduct_and_price(
    conn: &mut SqliteConnection,
    request: &SaleRequest,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<SaleItem>> {
    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        let selector = line.selector();
        let stocked = inventory::deduct(conn, &line.product_id, line.quantity, selector, now).await?;
        items.push(price_line(
            &stocked.id,
            &stocked.name,
            stocked.sale_price,
            line.quantity,
            selector.cloned(),
            line.discounts.clone(),
        )?);
    }
    Ok(items)
}

/// Checks payment sufficiency and snapshots each payment line's method.
fn settle_payments(
    items: &[SaleItem],
    request: &SaleRequest,
    methods: &[PaymentMethod],
) -> ServiceResult<(Settlement, Vec<PaymentDetail>)> {
    let amounts: Vec<Money> = request
        .payment_details
        .iter()
        .map(|p| p.amount.unwrap_or_default())
        .collect();
    let settlement = settle(sale_total(items)?, &amounts)?;

    let payment_details = methods
        .iter()
        .zip(amounts)
        .map(|(method, amount)| PaymentDetail {
            payment_method_id: method.id.clone(),
            payment_method_code: method.code.clone(),
            payment_method_name: method.name.clone(),
            amount,
        })
        .collect();

    Ok((settlement, payment_details))
}

/// Links the new sale under a savepoint so a linker failure cannot take
/// the sale down with it.
async fn link_in_savepoint(conn: &mut SqliteConnection, sale: &Sale, now: DateTime<Utc>) -> ServiceResult<bool> {
    let mut savepoint = conn.begin().await?;
    match ledger::link_sale(&mut savepoint, &sale.id, &sale.cashier_id, now).await {
        Ok(linked) => {
            savepoint.commit().await?;
            Ok(linked)
        }
        Err(err) => {
            savepoint.rollback().await?;
            warn!(
                sale_id = %sale.id,
                cashier_id = %sale.cashier_id,
                error = %err,
                "Sale saved but not linked to a session"
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::pool::{Database, DbConfig};
    use crate::testing::{item, pay, request, variant_item, Fixture, CASHIER};
    use till_core::{Discount, SaleItemRequest};

    #[tokio::test]
    async fn test_create_sale_prices_discounts_and_change() {
        let f = Fixture::new().await;
        let mut line = item(&f.shirt, 2);
        line.discounts = vec![Discount::Percentage {
            bps: 1_000,
            reason: Some("promo".to_string()),
        }];

        let created = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![line], vec![pay(&f.cash, 10_000)]))
            .await
            .unwrap();

        let sale = &created.sale;
        assert_eq!(sale.items[0].effective_unit_price, Money::from_cents(4_500));
        assert_eq!(sale.items[0].line_total, Money::from_cents(9_000));
        assert_eq!(sale.total_amount, Money::from_cents(9_000));
        assert_eq!(sale.total_payment_amount, Money::from_cents(10_000));
        assert_eq!(sale.change_amount, Money::from_cents(1_000));
        assert_eq!(sale.payment_details[0].payment_method_code, "CASH");
        assert!(!created.added_to_session);
        assert!(sale.session_id.is_none());
        assert_eq!(f.quantity(&f.shirt.id).await, 48);

        let stored = f.db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.items, sale.items);
        assert_eq!(stored.payment_details, sale.payment_details);
        assert_eq!(stored.change_amount, sale.change_amount);
    }

    #[tokio::test]
    async fn test_create_sale_insufficient_payment_rolls_back_stock() {
        let f = Fixture::new().await;
        let err = f
            .db
            .checkout()
            .create_sale(
                CASHIER,
                &request(
                    vec![item(&f.cap, 1), variant_item(&f.shirt, 3, &[("color", "Red")])],
                    vec![pay(&f.cash, 100)],
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientPayment { .. })
        ));
        assert_eq!(f.quantity(&f.cap.id).await, 100);
        assert_eq!(f.quantity(&f.shirt.id).await, 50);
        assert_eq!(f.variant_quantities(&f.shirt.id).await, vec![30, 20]);
        assert_eq!(
            f.db.sales().list(None, Default::default()).await.unwrap().pagination.total,
            0
        );
    }

    #[tokio::test]
    async fn test_create_sale_later_line_failure_restores_earlier_lines() {
        let f = Fixture::new().await;
        let err = f
            .db
            .checkout()
            .create_sale(
                CASHIER,
                &request(
                    vec![item(&f.cap, 5), item(&f.lamp, 11)],
                    vec![pay(&f.cash, 1_000_000)],
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { available: 10, requested: 11, .. })
        ));
        assert_eq!(f.quantity(&f.cap.id).await, 100);
    }

    #[tokio::test]
    async fn test_create_sale_rejects_unknown_and_inactive_methods() {
        let f = Fixture::new().await;
        let mut bogus = pay(&f.cash, 5_000);
        bogus.payment_method = Some("nope".to_string());

        let err = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![bogus]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidPaymentMethod(_))));

        f.db.payment_methods().set_active(&f.card.id, false).await.unwrap();
        let err = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![pay(&f.card, 5_000)]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidPaymentMethod(_))));
        assert_eq!(f.quantity(&f.cap.id).await, 100);
    }

    #[tokio::test]
    async fn test_create_sale_validation_runs_first() {
        let f = Fixture::new().await;
        let err = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::MissingItems)));

        let missing = SaleItemRequest {
            product_id: "missing".to_string(),
            quantity: 1,
            ..Default::default()
        };
        let err = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![missing], vec![pay(&f.cash, 100)]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_sale_rejects_oversized_amounts_without_touching_stock() {
        let f = Fixture::new().await;

        let err = f
            .db
            .checkout()
            .create_sale(
                CASHIER,
                &request(
                    vec![item(&f.cap, 1)],
                    vec![pay(&f.cash, i64::MAX), pay(&f.card, i64::MAX)],
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InvalidPaymentAmount { .. })
        ));

        let mut line = item(&f.cap, 1);
        line.discounts = vec![
            Discount::Fixed {
                cents: i64::MAX,
                reason: None,
            },
            Discount::Fixed {
                cents: i64::MAX,
                reason: None,
            },
        ];
        let err = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![line], vec![pay(&f.cash, 5_000)]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::Validation(_))));

        assert_eq!(f.quantity(&f.cap.id).await, 100);
        assert_eq!(
            f.db.sales().list(None, Default::default()).await.unwrap().pagination.total,
            0
        );
    }

    #[tokio::test]
    async fn test_create_sale_links_to_open_session() {
        let f = Fixture::new().await;
        let session = f
            .db
            .drawer()
            .open_session(CASHIER, Money::from_cents(10_000))
            .await
            .unwrap();

        let created = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![pay(&f.cash, 6_000)]))
            .await
            .unwrap();

        assert!(created.added_to_session);
        assert_eq!(created.sale.session_id.as_deref(), Some(session.id.as_str()));

        let open = f.db.sessions().get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(open.sales, vec![created.sale.id.clone()]);
        assert_eq!(open.total_sales, Money::from_cents(5_000));
        assert_eq!(open.expected_cash, Money::from_cents(15_000));
        assert_eq!(open.expected_non_cash, Money::zero());
    }

    #[tokio::test]
    async fn test_other_cashiers_session_is_not_used() {
        let f = Fixture::new().await;
        f.db.drawer().open_session("cashier-2", Money::zero()).await.unwrap();

        let created = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![pay(&f.card, 5_000)]))
            .await
            .unwrap();
        assert!(!created.added_to_session);
        assert!(created.sale.session_id.is_none());
    }

    #[tokio::test]
    async fn test_update_sale_moves_stock_and_session_totals() {
        let f = Fixture::new().await;
        let session = f.db.drawer().open_session(CASHIER, Money::zero()).await.unwrap();
        let created = f
            .db
            .checkout()
            .create_sale(
                CASHIER,
                &request(
                    vec![variant_item(&f.shirt, 2, &[("color", "Red")])],
                    vec![pay(&f.cash, 10_000)],
                ),
            )
            .await
            .unwrap();
        assert_eq!(f.variant_quantities(&f.shirt.id).await, vec![28, 20]);

        let updated = f
            .db
            .checkout()
            .update_sale(
                &created.sale.id,
                &request(
                    vec![variant_item(&f.shirt, 1, &[("color", "Blue")]), item(&f.lamp, 1)],
                    vec![pay(&f.cash, 5_000), pay(&f.card, 10_000)],
                ),
            )
            .await
            .unwrap();

        assert_eq!(updated.total_amount, Money::from_cents(15_000));
        assert_eq!(updated.change_amount, Money::zero());
        assert_eq!(updated.id, created.sale.id);
        assert_eq!(f.quantity(&f.shirt.id).await, 49);
        assert_eq!(f.variant_quantities(&f.shirt.id).await, vec![30, 19]);
        assert_eq!(f.quantity(&f.lamp.id).await, 9);

        let open = f.db.sessions().get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(open.total_sales, Money::from_cents(15_000));
        assert_eq!(open.expected_cash, Money::from_cents(5_000));
        assert_eq!(open.expected_non_cash, Money::from_cents(10_000));

        // Reconciliation from scratch agrees with the incremental totals.
        let closed = f
            .db
            .drawer()
            .close_session(&session.id, Money::from_cents(5_000), None, CASHIER)
            .await
            .unwrap();
        assert_eq!(closed.total_sales, open.total_sales);
        assert_eq!(closed.expected_cash, open.expected_cash);
        assert_eq!(closed.expected_non_cash, open.expected_non_cash);
        assert_eq!(closed.payment_totals, open.payment_totals);
        assert_eq!(closed.cash_difference, Some(Money::zero()));
    }

    #[tokio::test]
    async fn test_update_sale_failure_keeps_old_sale() {
        let f = Fixture::new().await;
        let created = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.lamp, 4)], vec![pay(&f.cash, 40_000)]))
            .await
            .unwrap();

        // Old stock is restored before deduction: 6 + 4 = 10 available, not 11.
        let err = f
            .db
            .checkout()
            .update_sale(
                &created.sale.id,
                &request(vec![item(&f.lamp, 11)], vec![pay(&f.cash, 110_000)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { available: 10, .. })
        ));
        assert_eq!(f.quantity(&f.lamp.id).await, 6);

        let stored = f.db.sales().get_by_id(&created.sale.id).await.unwrap().unwrap();
        assert_eq!(stored.items, created.sale.items);
        assert_eq!(stored.total_amount, Money::from_cents(40_000));

        let same = f
            .db
            .checkout()
            .update_sale(
                &created.sale.id,
                &request(vec![item(&f.lamp, 10)], vec![pay(&f.cash, 100_000)]),
            )
            .await
            .unwrap();
        assert_eq!(same.total_amount, Money::from_cents(100_000));
        assert_eq!(f.quantity(&f.lamp.id).await, 0);
    }

    #[tokio::test]
    async fn test_update_sale_not_found_and_closed_session() {
        let f = Fixture::new().await;
        let err = f
            .db
            .checkout()
            .update_sale("missing", &request(vec![item(&f.cap, 1)], vec![pay(&f.cash, 5_000)]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::SaleNotFound(_))));

        let session = f.db.drawer().open_session(CASHIER, Money::zero()).await.unwrap();
        let created = f
            .db
            .checkout()
            .create_sale(CASHIER, &request(vec![item(&f.cap, 1)], vec![pay(&f.cash, 5_000)]))
            .await
            .unwrap();
        f.db.drawer()
            .close_session(&session.id, Money::from_cents(5_000), None, CASHIER)
            .await
            .unwrap();

        let err = f
            .db
            .checkout()
            .update_sale(
                &created.sale.id,
                &request(vec![item(&f.cap, 2)], vec![pay(&f.cash, 10_000)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::SessionClosed { .. })));
        assert_eq!(f.quantity(&f.cap.id).await, 99);
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("till.db")).max_connections(5))
            .await
            .unwrap();
        let f = Fixture::with_db(db).await;
        f.db.drawer().open_session(CASHIER, Money::zero()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let checkout = f.db.checkout();
            let req = request(vec![item(&f.lamp, 1)], vec![pay(&f.cash, 10_000)]);
            handles.push(tokio::spawn(async move {
                checkout.create_sale(CASHIER, &req).await
            }));
        }

        let mut sold = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(created) => {
                    assert!(created.added_to_session);
                    sold += 1;
                }
                Err(ServiceError::Domain(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(sold, 10);
        assert_eq!(f.quantity(&f.lamp.id).await, 0);

        let session = f.db.drawer().get_open_session(CASHIER).await.unwrap().unwrap();
        assert_eq!(session.sales.len(), 10);
        assert_eq!(session.total_sales, Money::from_cents(100_000));
        assert_eq!(session.expected_cash, Money::from_cents(100_000));
    }
}

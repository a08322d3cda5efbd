//! # Drawer Settlement
//!
//! The single source of truth for how a sale moves a cash drawer session's
//! totals. The incremental linker and the close-time recomputation both go
//! through [`SaleContribution::of_payments`], so they cannot disagree.
//!
//! ## Net Cash Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale total 200, tendered CASH 110 + CARD 100, change 10                │
//! │                                                                         │
//! │   CASH entries ──► 110 − change 10 = 100  ──► expectedCash    += 100   │
//! │   other entries ─► 100 (gross)            ──► expectedNonCash += 100   │
//! │                                                                         │
//! │   cash + nonCash == totalAmount  (change always leaves the drawer)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Close
//! ```text
//! expectedCash   = initialCash + Σ net cash of linked sales
//! cashDifference = actualCash − expectedCash      (negative = short)
//! ```

use crate::money::Money;
use crate::types::{PaymentDetail, PaymentTotal, Sale};

// =============================================================================
// Per-Sale Contribution
// =============================================================================

/// What one sale adds to its drawer session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleContribution {
    pub total_sales: Money,
    /// Net cash retained: CASH tendered minus change.
    pub cash: Money,
    pub non_cash: Money,
    /// Per payment method, in first-seen order. The CASH entry is net of change.
    pub by_method: Vec<PaymentTotal>,
}

impl SaleContribution {
    pub fn of_sale(sale: &Sale) -> Self {
        Self::of_payments(sale.total_amount, sale.change_amount, &sale.payment_details)
    }

    /// Computes the contribution from a sale's snapshot figures.
    ///
    /// Change is taken out of the first CASH entry. A sale with change but no
    /// cash line still lowers `cash` by the change; its per-method totals then
    /// stay gross.
    ///
    /// That makes `cash` negative for an overpaid card-only sale: the change
    /// is handed out from the drawer whatever method overpaid, so expected
    /// drawer cash drops by it (see "Net cash" in DESIGN.md).
    pub fn of_payments(total_amount: Money, change_amount: Money, payments: &[PaymentDetail]) -> Self {
        let mut by_method: Vec<PaymentTotal> = Vec::new();
        let mut cash_tendered = Money::zero();
        let mut non_cash = Money::zero();

        for payment in payments {
            if payment.is_cash() {
                cash_tendered += payment.amount;
            } else {
                non_cash += payment.amount;
            }
            add_to_totals(
                &mut by_method,
                &payment.payment_method_id,
                &payment.payment_method_code,
                payment.amount,
            );
        }

        if let Some(entry) = by_method
            .iter_mut()
            .find(|t| t.payment_method_code == crate::types::CASH_CODE)
        {
            entry.total -= change_amount;
        }

        SaleContribution {
            total_sales: total_amount,
            cash: cash_tendered - change_amount,
            non_cash,
            by_method,
        }
    }

    /// `self − previous`, for re-syncing a session after a sale edit.
    ///
    /// Methods whose amount is unchanged are dropped from `by_method`.
    pub fn minus(&self, previous: &SaleContribution) -> SaleContribution {
        let mut by_method = self.by_method.clone();
        for old in &previous.by_method {
            add_to_totals(
                &mut by_method,
                &old.payment_method_id,
                &old.payment_method_code,
                -old.total,
            );
        }
        by_method.retain(|t| !t.total.is_zero());

        SaleContribution {
            total_sales: self.total_sales - previous.total_sales,
            cash: self.cash - previous.cash,
            non_cash: self.non_cash - previous.non_cash,
            by_method,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total_sales.is_zero()
            && self.cash.is_zero()
            && self.non_cash.is_zero()
            && self.by_method.is_empty()
    }
}

fn add_to_totals(totals: &mut Vec<PaymentTotal>, method_id: &str, code: &str, amount: Money) {
    match totals.iter_mut().find(|t| t.payment_method_id == method_id) {
        Some(entry) => entry.total += amount,
        None => totals.push(PaymentTotal {
            payment_method_id: method_id.to_string(),
            payment_method_code: code.to_string(),
            total: amount,
        }),
    }
}

// =============================================================================
// Session Totals
// =============================================================================

/// Reconciled figures for a drawer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTotals {
    pub total_sales: Money,
    pub expected_cash: Money,
    pub expected_non_cash: Money,
    pub payment_totals: Vec<PaymentTotal>,
}

impl SessionTotals {
    /// Totals of a session with no sales yet.
    pub fn opening(initial_cash: Money) -> Self {
        SessionTotals {
            total_sales: Money::zero(),
            expected_cash: initial_cash,
            expected_non_cash: Money::zero(),
            payment_totals: Vec::new(),
        }
    }

    pub fn apply(&mut self, contribution: &SaleContribution) {
        self.total_sales += contribution.total_sales;
        self.expected_cash += contribution.cash;
        self.expected_non_cash += contribution.non_cash;
        for entry in &contribution.by_method {
            add_to_totals(
                &mut self.payment_totals,
                &entry.payment_method_id,
                &entry.payment_method_code,
                entry.total,
            );
        }
    }
}

/// Recomputes a session's totals from scratch.
pub fn reconcile<'a, I>(initial_cash: Money, contributions: I) -> SessionTotals
where
    I: IntoIterator<Item = &'a SaleContribution>,
{
    let mut totals = SessionTotals::opening(initial_cash);
    for contribution in contributions {
        totals.apply(contribution);
    }
    totals
}

/// `actual − expected`; negative means the drawer is short.
#[inline]
pub fn cash_difference(actual_cash: Money, expected_cash: Money) -> Money {
    actual_cash - expected_cash
}

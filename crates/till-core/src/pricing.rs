//! # Pricing
//!
//! Turns a requested line item into a frozen, priced [`SaleItem`] and checks
//! that a set of payment lines covers the sale.
//!
//! ## Line Pricing
//! ```text
//! salePrice ─┬─ Σ percentage(bps) of salePrice ─┐
//!            └─ Σ fixed cents                 ──┴─► discount per unit
//!
//! effectiveUnitPrice = max(0, salePrice − discount per unit)
//! lineTotal          = effectiveUnitPrice × quantity
//! totalAmount        = Σ lineTotal
//! ```
//!
//! Every discount is computed against the undiscounted sale price, so the
//! order of the discount list never changes the result.
//!
//! All sums and products are checked. A result that does not fit in i64
//! cents is a [`ValidationError::Overflow`], never a wrapped total.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Discount, SaleItem, VariantSelector};

impl Discount {
    /// Amount this discount takes off one unit priced at `unit_price`.
    pub fn amount_off(&self, unit_price: Money) -> Money {
        match self {
            Discount::Percentage { bps, .. } => unit_price.percentage(*bps),
            Discount::Fixed { cents, .. } => Money::from_cents(*cents),
        }
    }
}

/// Unit price after applying every discount, clamped at zero.
///
/// ## Example
/// ```rust
/// use till_core::money::Money;
/// use till_core::pricing::effective_unit_price;
/// use till_core::types::Discount;
///
/// let ten_percent = Discount::Percentage { bps: 1_000, reason: None };
/// let price = effective_unit_price(Money::from_cents(5_000), &[ten_percent]).unwrap();
/// assert_eq!(price.cents(), 4_500);
/// ```
pub fn effective_unit_price(sale_price: Money, discounts: &[Discount]) -> CoreResult<Money> {
    let off = discounts
        .iter()
        .try_fold(Money::zero(), |acc, d| acc.checked_add(d.amount_off(sale_price)))
        .ok_or_else(|| overflow("discount"))?;
    let discounted = sale_price.checked_sub(off).ok_or_else(|| overflow("discount"))?;
    Ok(discounted.non_negative())
}

/// Prices one line item from the product snapshot taken inside the sale
/// transaction.
pub fn price_line(
    product_id: &str,
    product_name: &str,
    sale_price: Money,
    quantity: i64,
    variant: Option<VariantSelector>,
    discounts: Vec<Discount>,
) -> CoreResult<SaleItem> {
    let effective = effective_unit_price(sale_price, &discounts)?;
    let line_total = effective
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| overflow("lineTotal"))?;
    Ok(SaleItem {
        product_id: product_id.to_string(),
        product_name: product_name.to_string(),
        quantity,
        variant,
        sale_price,
        effective_unit_price: effective,
        discounts,
        line_total,
    })
}

/// Σ line totals.
pub fn sale_total(items: &[SaleItem]) -> CoreResult<Money> {
    Money::checked_sum(items.iter().map(|i| &i.line_total)).ok_or_else(|| overflow("totalAmount"))
}

fn overflow(field: &str) -> CoreError {
    ValidationError::Overflow {
        field: field.to_string(),
    }
    .into()
}

// =============================================================================
// Payment Settlement
// =============================================================================

/// Totals that close out a sale's payment side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub total_amount: Money,
    pub total_payment_amount: Money,
    pub change_amount: Money,
}

/// Checks that `payments` cover `total_amount` and computes the change.
///
/// ## Errors
/// - [`CoreError::InsufficientPayment`] when the tendered sum is short.
/// - [`ValidationError::Overflow`] when the tendered sum does not fit in i64.
pub fn settle(total_amount: Money, payments: &[Money]) -> CoreResult<Settlement> {
    let total_payment_amount =
        Money::checked_sum(payments).ok_or_else(|| overflow("totalPaymentAmount"))?;
    if total_payment_amount < total_amount {
        return Err(CoreError::InsufficientPayment {
            total: total_amount,
            paid: total_payment_amount,
        });
    }
    Ok(Settlement {
        total_amount,
        total_payment_amount,
        change_amount: total_payment_amount - total_amount,
    })
}

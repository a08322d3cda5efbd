//! # Domain Types
//!
//! Core domain types used throughout Till POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  CashSession    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  salePrice      │   │  items[]  ◄─ snapshot   cashierId     │       │
//! │  │  quantity       │   │  paymentDetails[]│   │  status         │       │
//! │  │  variants[]     │   │  changeAmount   │   │  sales[] (set)  │       │
//! │  └─────────────────┘   │  sessionId ─────┼──►│  expectedCash   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │ PaymentMethod   │   │    Discount     │                             │
//! │  │  code "CASH" is │   │  Percentage(bps)│                             │
//! │  │  the cash tender│   │  Fixed(cents)   │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A `Sale` copies product names, prices, discounts and payment method codes
//! at creation. Later catalog edits never change a past sale or a past
//! drawer reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::money::Money;

/// Payment method code that marks physical cash.
pub const CASH_CODE: &str = "CASH";

/// Attribute map identifying a stock-tracked variant (e.g. color/size).
pub type VariantAttributes = BTreeMap<String, String>;

/// Partial attribute map used to pick one variant of a product.
pub type VariantSelector = BTreeMap<String, String>;

// =============================================================================
// Product
// =============================================================================

/// One stock-tracked variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductVariant {
    pub attributes: VariantAttributes,
    pub quantity: i64,
}

impl ProductVariant {
    /// True when every selector key is present with an equal value.
    ///
    /// An empty selector matches nothing; callers treat it as "no selector".
    pub fn matches(&self, selector: &VariantSelector) -> bool {
        !selector.is_empty()
            && selector
                .iter()
                .all(|(key, value)| self.attributes.get(key) == Some(value))
    }
}

/// Returns the index of the first variant matching `selector`.
///
/// Attribute maps are unique per product (see
/// [`validate_new_product`](crate::validation::validate_new_product)), so a
/// selector naming every attribute resolves to at most one variant.
pub fn find_variant(variants: &[ProductVariant], selector: &VariantSelector) -> Option<usize> {
    variants.iter().position(|v| v.matches(selector))
}

/// Renders a selector as `color=Red, size=M` for messages and logs.
pub fn describe_selector(selector: &VariantSelector) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Unique when present.
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub sale_price: Money,
    pub purchase_cost: Money,
    /// Aggregate sellable stock. Authoritative; variant quantities are
    /// sub-allocations of it.
    pub quantity: i64,
    pub variants: Vec<ProductVariant>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub sale_price: Money,
    pub purchase_cost: Money,
    pub quantity: i64,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// A tender type (cash, credit card, bank transfer, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    /// Unique. [`CASH_CODE`] identifies cash.
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PaymentMethod {
    #[inline]
    pub fn is_cash(&self) -> bool {
        self.code == CASH_CODE
    }
}

/// Input for creating a payment method.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewPaymentMethod {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

// =============================================================================
// Discounts
// =============================================================================

/// A per-unit discount on a line item.
///
/// ```json
/// { "type": "percentage", "bps": 1000, "reason": "10% promo" }
/// { "type": "fixed", "cents": 500 }
/// ```
///
/// Requests may also carry a generic `value` instead of the unit field. For
/// `percentage` it is whole percent (`10` or `12.5`) and is converted to
/// basis points; for `fixed` it is cents, like every other amount on the
/// wire. Responses always use `bps` / `cents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(try_from = "DiscountWire")]
#[ts(export)]
pub enum Discount {
    /// Basis points of the undiscounted sale price (1000 = 10%).
    Percentage {
        bps: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Flat amount off each unit.
    Fixed {
        cents: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Accepted request shape for [`Discount`].
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DiscountWire {
    Percentage {
        bps: Option<u32>,
        value: Option<f64>,
        #[serde(default)]
        reason: Option<String>,
    },
    Fixed {
        cents: Option<i64>,
        value: Option<i64>,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl TryFrom<DiscountWire> for Discount {
    type Error = String;

    fn try_from(wire: DiscountWire) -> Result<Self, Self::Error> {
        match wire {
            DiscountWire::Percentage { bps, value, reason } => {
                let bps = match (bps, value) {
                    (Some(bps), None) => bps,
                    (None, Some(percent)) => percent_to_bps(percent)?,
                    (Some(_), Some(_)) => {
                        return Err("percentage discount has both bps and value".into())
                    }
                    (None, None) => return Err("percentage discount needs bps or value".into()),
                };
                Ok(Discount::Percentage { bps, reason })
            }
            DiscountWire::Fixed { cents, value, reason } => {
                let cents = match (cents, value) {
                    (Some(cents), None) | (None, Some(cents)) => cents,
                    (Some(_), Some(_)) => {
                        return Err("fixed discount has both cents and value".into())
                    }
                    (None, None) => return Err("fixed discount needs cents or value".into()),
                };
                Ok(Discount::Fixed { cents, reason })
            }
        }
    }
}

/// `12.5` → `1250`. Anything outside 0-100% is rejected here.
fn percent_to_bps(percent: f64) -> Result<u32, String> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(format!("percentage value {percent} must be between 0 and 100"));
    }
    Ok((percent * 100.0).round() as u32)
}

// =============================================================================
// Sale
// =============================================================================

/// A priced, settled line of a sale. Frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub product_id: String,
    /// Product name at time of sale.
    pub product_name: String,
    pub quantity: i64,
    pub variant: Option<VariantSelector>,
    /// Undiscounted unit price at time of sale.
    pub sale_price: Money,
    /// Unit price after discounts.
    pub effective_unit_price: Money,
    pub discounts: Vec<Discount>,
    /// `effective_unit_price × quantity`.
    pub line_total: Money,
}

/// One tender allocation of a sale, with the method snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentDetail {
    pub payment_method_id: String,
    pub payment_method_code: String,
    pub payment_method_name: String,
    pub amount: Money,
}

impl PaymentDetail {
    #[inline]
    pub fn is_cash(&self) -> bool {
        self.payment_method_code == CASH_CODE
    }
}

/// A completed sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub cashier_id: String,
    pub items: Vec<SaleItem>,
    pub total_amount: Money,
    pub payment_details: Vec<PaymentDetail>,
    /// Σ `payment_details.amount`.
    pub total_payment_amount: Money,
    /// `total_payment_amount − total_amount`, never negative.
    pub change_amount: Money,
    /// Cashier's open session when the sale was created.
    pub session_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A requested line item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItemRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub variant: Option<VariantSelector>,
    #[serde(default)]
    pub discounts: Vec<Discount>,
}

impl SaleItemRequest {
    /// The selector to resolve, ignoring empty maps.
    pub fn selector(&self) -> Option<&VariantSelector> {
        self.variant.as_ref().filter(|s| !s.is_empty())
    }
}

/// A requested payment line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentRequest {
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub amount: Option<Money>,
}

/// Body of `POST /sales` and `PUT /sales/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleRequest {
    #[serde(default)]
    pub items: Vec<SaleItemRequest>,
    #[serde(default)]
    pub payment_details: Vec<PaymentRequest>,
}

// =============================================================================
// Cash Drawer Session
// =============================================================================

/// Lifecycle of a drawer session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

/// Running or reconciled total for one payment method within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentTotal {
    pub payment_method_id: String,
    pub payment_method_code: String,
    pub total: Money,
}

/// A cashier's drawer accounting period.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub cashier_id: String,
    pub status: SessionStatus,
    #[ts(as = "String")]
    pub opening_date: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closing_date: Option<DateTime<Utc>>,
    pub initial_cash: Money,
    /// Linked sale ids in link order, each at most once.
    pub sales: Vec<String>,
    pub payment_totals: Vec<PaymentTotal>,
    pub total_sales: Money,
    pub expected_cash: Money,
    pub expected_non_cash: Money,
    pub actual_cash: Option<Money>,
    /// `actual_cash − expected_cash`; negative means the drawer is short.
    pub cash_difference: Option<Money>,
    pub notes: String,
}

impl CashSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

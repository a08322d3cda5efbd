//! # till-core: Pure Business Logic for Till POS
//!
//! Everything about a sale or a cash drawer that can be decided without
//! touching storage lives here, as pure functions over plain types.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/till-api (axum)                         │   │
//! │  │    POST /sales   PUT /sales/:id   POST /pos-sessions/{open,close}│  │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (transactions)                       │   │
//! │  │    inventory ─ checkout ─ ledger ─ drawer                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐ │   │
//! │  │   │   types   │  │  pricing  │  │ settlement │  │ validation│ │   │
//! │  │   │  Sale     │  │ discounts │  │  net cash  │  │   rules   │ │   │
//! │  │   │  Session  │  │  change   │  │  reconcile │  │           │ │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, CashSession, ...)
//! - [`money`] - Integer minor-unit money
//! - [`pricing`] - Discounted line pricing and payment settlement
//! - [`settlement`] - How a sale moves a drawer session's totals
//! - [`validation`] - Request and catalog validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Money;
//! use till_core::pricing::{price_line, settle};
//! use till_core::types::Discount;
//!
//! let ten_percent = Discount::Percentage { bps: 1_000, reason: None };
//! let line = price_line("p1", "Shirt", Money::from_cents(5_000), 2, None, vec![ten_percent])
//!     .unwrap();
//! assert_eq!(line.line_total.cents(), 9_000);
//!
//! let settled = settle(line.line_total, &[Money::from_cents(10_000)]).unwrap();
//! assert_eq!(settled.change_amount.cents(), 1_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in a single sale.
pub const MAX_SALE_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Catches typos such as 1000 for 10 before stock is touched.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest amount accepted for a single price, payment line or fixed
/// discount, in cents (1,000,000,000.00).
///
/// Keeps every line total and payment sum far inside i64.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

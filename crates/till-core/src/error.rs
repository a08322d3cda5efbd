//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core (this file)                                                 │
//! │  ├── CoreError        - Sale / inventory / drawer rule violations      │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  till-db                                                               │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - CoreError | DbError from an operation          │
//! │                                                                         │
//! │  till-api                                                              │
//! │  └── ApiError         - HTTP status + JSON body                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError → client  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` belongs to exactly one [`ErrorKind`], which is what the
//! HTTP layer turns into a status code.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input, or a business rule the request broke (400).
    Validation,
    /// A referenced product, sale or session does not exist (404).
    NotFound,
    /// The request conflicts with current state (400).
    Conflict,
    /// The requester may not act on the resource (403).
    Forbidden,
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by sales, inventory and cash sessions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale request without line items.
    #[error("At least one item is required")]
    MissingItems,

    /// A sale request without payment lines.
    #[error("At least one payment is required")]
    MissingPayments,

    /// Payment line references a method that is unknown or inactive.
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// Payment line amount is zero or negative.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Aggregate stock is lower than the requested quantity.
    ///
    /// ## Flow
    /// ```text
    /// POST /sales  { productId: P, quantity: 5 }
    ///      │
    ///      ▼
    /// UPDATE products SET quantity = quantity - 5
    ///  WHERE id = P AND quantity >= 5        ← matches 0 rows
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 } → 400, nothing kept
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// No variant of the product carries every attribute in the selector.
    #[error("Variant not found for {product}: {selector}")]
    VariantNotFound { product: String, selector: String },

    #[error(
        "Insufficient variant stock for {product}: available {available}, requested {requested}"
    )]
    InsufficientVariantStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Tendered total is below the priced total.
    #[error("Insufficient payment: total {total}, paid {paid}")]
    InsufficientPayment { total: Money, paid: Money },

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Cashier already has an open drawer session.
    #[error("Cashier {cashier_id} already has an open session")]
    OpenSessionExists { cashier_id: String },

    #[error("Initial cash must be zero or greater and within the amount limit")]
    InvalidInitialCash,

    #[error("Actual cash must be zero or greater and within the amount limit")]
    InvalidActualCash,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Requester is not the cashier who opened the session.
    #[error("Session {session_id} belongs to another cashier")]
    NotOwner { session_id: String },

    #[error("Session {0} is already closed")]
    AlreadyClosed(String),

    /// A sale cannot be edited once its drawer session has been reconciled.
    #[error("Sale {sale_id} belongs to closed session {session_id}")]
    SessionClosed { sale_id: String, session_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::SessionNotFound(_) => ErrorKind::NotFound,
            CoreError::OpenSessionExists { .. }
            | CoreError::AlreadyClosed(_)
            | CoreError::SessionClosed { .. } => ErrorKind::Conflict,
            CoreError::NotOwner { .. } => ErrorKind::Forbidden,
            CoreError::MissingItems
            | CoreError::MissingPayments
            | CoreError::InvalidPaymentMethod(_)
            | CoreError::InvalidPaymentAmount { .. }
            | CoreError::InsufficientStock { .. }
            | CoreError::VariantNotFound { .. }
            | CoreError::InsufficientVariantStock { .. }
            | CoreError::InsufficientPayment { .. }
            | CoreError::InvalidInitialCash
            | CoreError::InvalidActualCash
            | CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// An amount computed from valid inputs does not fit in i64 cents.
    #[error("{field} is too large")]
    Overflow { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., two variants with the same attributes).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

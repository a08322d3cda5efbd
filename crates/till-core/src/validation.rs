//! # Validation Module
//!
//! Input validation for sale requests, drawer counts and catalog entries.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler                                                 │
//! │  └── JSON shape (deserialization)                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any transaction starts)                  │
//! │  ├── items / payments present, amounts > 0                             │
//! │  └── quantities, discounts, cash counts in range                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Inside the transaction                                       │
//! │  ├── product / variant exists, stock sufficient                        │
//! │  └── payment covers total                                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite constraints (UNIQUE, FK, partial unique index)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::validate_quantity;
//!
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(1_000).is_err());
//! ```

use std::collections::HashSet;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, BPS_PER_WHOLE};
use crate::types::{Discount, NewPaymentMethod, NewProduct, SaleRequest};
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY, MAX_SALE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_BARCODE_LEN: usize = 64;
const MAX_CODE_LEN: usize = 32;
const MAX_NOTES_LEN: usize = 1_000;

// =============================================================================
// Sale Requests
// =============================================================================

/// Checks everything about a sale request that needs no stored state.
///
/// ## Order
/// ```text
/// items empty?            → MissingItems
/// payments empty?         → MissingPayments
/// each payment:
///   method missing/blank? → InvalidPaymentMethod
///   amount missing / ≤ 0? → InvalidPaymentAmount
///   amount > max?         → InvalidPaymentAmount
/// too many items?         → Validation(OutOfRange)
/// each item:
///   productId blank?      → Validation(Required)
///   quantity ∉ 1..=999?   → Validation(...)
///   bad discount?         → Validation(...)
/// ```
///
/// Every amount is capped at [`MAX_AMOUNT_CENTS`], so the sums and products
/// taken while pricing stay inside i64.
pub fn validate_sale_request(request: &SaleRequest) -> CoreResult<()> {
    if request.items.is_empty() {
        return Err(CoreError::MissingItems);
    }
    if request.payment_details.is_empty() {
        return Err(CoreError::MissingPayments);
    }

    for (index, payment) in request.payment_details.iter().enumerate() {
        match payment.payment_method.as_deref().map(str::trim) {
            Some(method) if !method.is_empty() => {}
            _ => {
                return Err(CoreError::InvalidPaymentMethod(format!(
                    "payment {} has no payment method",
                    index + 1
                )))
            }
        }
        match payment.amount {
            Some(amount) if amount.cents() > MAX_AMOUNT_CENTS => {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!(
                        "payment {} amount {} exceeds the maximum of {}",
                        index + 1,
                        amount,
                        Money::from_cents(MAX_AMOUNT_CENTS)
                    ),
                })
            }
            Some(amount) if amount.is_positive() => {}
            Some(amount) => {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("payment {} amount {} must be greater than zero", index + 1, amount),
                })
            }
            None => {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("payment {} has no amount", index + 1),
                })
            }
        }
    }

    validate_item_count(request.items.len())?;
    for item in &request.items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            }
            .into());
        }
        validate_quantity(item.quantity)?;
        for discount in &item.discounts {
            validate_discount(discount)?;
        }
    }

    Ok(())
}

/// Validates a line quantity: `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count > MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_ITEMS as i64,
        });
    }
    Ok(())
}

/// Percentages are capped at 100%; fixed amounts lie in `0..=MAX_AMOUNT_CENTS`.
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    match discount {
        Discount::Percentage { bps, .. } if *bps > BPS_PER_WHOLE => Err(ValidationError::OutOfRange {
            field: "discount.bps".to_string(),
            min: 0,
            max: BPS_PER_WHOLE as i64,
        }),
        Discount::Fixed { cents, .. } if !(0..=MAX_AMOUNT_CENTS).contains(cents) => {
            Err(ValidationError::OutOfRange {
                field: "discount.cents".to_string(),
                min: 0,
                max: MAX_AMOUNT_CENTS,
            })
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Cash Drawer
// =============================================================================

pub fn validate_initial_cash(initial_cash: Money) -> CoreResult<()> {
    if !within_amount_limit(initial_cash) {
        return Err(CoreError::InvalidInitialCash);
    }
    Ok(())
}

pub fn validate_actual_cash(actual_cash: Money) -> CoreResult<()> {
    if !within_amount_limit(actual_cash) {
        return Err(CoreError::InvalidActualCash);
    }
    Ok(())
}

fn within_amount_limit(amount: Money) -> bool {
    (0..=MAX_AMOUNT_CENTS).contains(&amount.cents())
}

pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.len() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

/// Validates a product name.
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Camiseta Básica").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Barcodes are optional; when present they are non-blank, at most 64
/// characters, with no whitespace.
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    if barcode.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }
    if barcode.len() > MAX_BARCODE_LEN {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: MAX_BARCODE_LEN,
        });
    }
    if barcode.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }
    Ok(())
}

/// Zero is allowed (free items).
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if !within_amount_limit(price) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }
    Ok(())
}

pub fn validate_stock(field: &str, quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a product before insert.
///
/// ## Variant Rules
/// - each variant has at least one attribute and non-negative stock
/// - attribute maps are pairwise distinct
/// - Σ variant quantity ≤ aggregate quantity
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    if let Some(barcode) = &product.barcode {
        validate_barcode(barcode)?;
    }
    validate_price("salePrice", product.sale_price)?;
    validate_price("purchaseCost", product.purchase_cost)?;
    validate_stock("quantity", product.quantity)?;

    let mut seen = HashSet::new();
    let mut allocated: i64 = 0;
    for variant in &product.variants {
        if variant.attributes.is_empty() {
            return Err(ValidationError::Required {
                field: "variant.attributes".to_string(),
            });
        }
        validate_stock("variant.quantity", variant.quantity)?;
        if !seen.insert(&variant.attributes) {
            return Err(ValidationError::Duplicate {
                field: "variant".to_string(),
                value: crate::types::describe_selector(&variant.attributes),
            });
        }
        allocated += variant.quantity;
    }

    if allocated > product.quantity {
        return Err(ValidationError::OutOfRange {
            field: "variant quantities".to_string(),
            min: 0,
            max: product.quantity,
        });
    }

    Ok(())
}

/// Validates a payment method before insert. Codes are upper-case
/// identifiers such as `CASH` or `CREDIT`.
pub fn validate_new_payment_method(method: &NewPaymentMethod) -> ValidationResult<()> {
    validate_product_name(&method.name).map_err(|_| ValidationError::Required {
        field: "name".to_string(),
    })?;

    let code = method.code.as_str();
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }
    if code.len() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "only A-Z, 0-9 and underscores allowed".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

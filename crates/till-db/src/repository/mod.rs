//! # Repository Module
//!
//! Database repository implementations for Till POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Read paths (handlers, tests)                                          │
//! │       │  db.sessions().get_by_id(id)                                   │
//! │       ▼                                                                 │
//! │  XxxRepository { pool }  ── one query per call on the pool             │
//! │                                                                         │
//! │  Write paths (checkout, ledger, drawer)                                │
//! │       │  sale::insert_sale(&mut tx, &sale)                             │
//! │       ▼                                                                 │
//! │  free functions over &mut SqliteConnection ── run inside the caller's  │
//! │  transaction, never touch the pool                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog products and variants
//! - [`PaymentMethodRepository`](payment_method::PaymentMethodRepository) - Tender types
//! - [`SaleRepository`](sale::SaleRepository) - Sale snapshots
//! - [`SessionRepository`](session::SessionRepository) - Cash drawer sessions

use serde::Serialize;

pub mod payment_method;
pub mod product;
pub mod sale;
pub mod session;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a caller may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

/// One page of results plus its position in the full result set.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let limit = request.limit as i64;
        Page {
            items,
            pagination: Pagination {
                total,
                page: request.page,
                limit: request.limit,
                pages: ((total + limit - 1) / limit) as u32,
            },
        }
    }
}

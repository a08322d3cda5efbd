//! # till-db: Database Layer for Till POS
//!
//! SQLite storage and the transactional operations of the POS core: stock,
//! sales, the session ledger and cash drawer sessions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /sales)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌──────────┐ │   │
//! │  │   │ inventory  │  │  checkout  │  │   ledger   │  │  drawer  │ │   │
//! │  │   │ deduct /   │◄─│ create /   │─►│ link sale  │  │ open /   │ │   │
//! │  │   │ restore    │  │ update     │  │ to session │  │ close    │ │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘  └──────────┘ │   │
//! │  │          │               │               │              │      │   │
//! │  │   ┌──────▼───────────────▼───────────────▼──────────────▼────┐ │   │
//! │  │   │  repository (rows ↔ till-core types)   pool   migrations │ │   │
//! │  │   └──────────────────────────────────────────────────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and operation error types
//! - [`repository`] - Row mapping and read paths
//! - [`inventory`] - Inventory Store
//! - [`checkout`] - Sale Processor
//! - [`ledger`] - Session Ledger Linker
//! - [`drawer`] - Cash Session Manager
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./till.db")).await?;
//!
//! let session = db.drawer().open_session("cashier-1", Money::from_cents(10_000)).await?;
//! let created = db.checkout().create_sale("cashier-1", &request).await?;
//! let closed = db.drawer().close_session(&session.id, counted, None, "cashier-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod drawer;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};

pub use checkout::{CreatedSale, SaleProcessor};
pub use drawer::{CashSessionManager, SessionDetail};
pub use inventory::{InventoryStore, StockedProduct};
pub use ledger::SessionLedger;

pub use repository::payment_method::PaymentMethodRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::session::{SessionFilter, SessionRepository};
pub use repository::{Page, PageRequest, Pagination};

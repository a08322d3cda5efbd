//! # Till API
//!
//! REST server for sales and cash drawer sessions.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Till API Server                                │
//! │                                                                         │
//! │  Client ───► HTTP (8080) ───► TraceLayer ───► handlers ───► till-db    │
//! │                                   │               │                     │
//! │                        X-User-ID ─┘               └─ ApiError ─► JSON   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod startup;

use till_db::Database;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db }
    }
}

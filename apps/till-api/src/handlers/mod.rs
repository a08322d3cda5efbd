//! HTTP handlers, one module per resource.

pub mod health;
pub mod payment_methods;
pub mod sales;
pub mod sessions;

//! HTTP route handlers, one module per resource.

pub mod account;
pub mod categories;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

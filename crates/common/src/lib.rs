//! Shared types for the shop backend.
//!
//! Typed UUID identifiers for the core entities and the [`Money`] value
//! object used for prices and order totals.

mod ids;
mod money;

pub use ids::{OrderId, ProductId, ReviewId, UserId};
pub use money::Money;

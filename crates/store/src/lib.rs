//! Storage layer for the shop backend.
//!
//! This crate defines the entity records, one repository trait per entity,
//! and two implementations: [`InMemoryStore`] for tests and [`PgStore`]
//! backed by PostgreSQL. Uniqueness rules the domain depends on (email,
//! one review per author per product, one line per product per order, one
//! wishlist row per user per product) are enforced here, at the storage
//! layer, so concurrent check-then-insert races cannot slip past the
//! services.

mod entities;
mod error;
mod memory;
mod postgres;
mod repo;

pub use entities::{
    AccountToken, Category, Order, OrderFilter, OrderItem, OrderStatus, Product, ProductFilter,
    ProductOrdering, Review, Session, TokenPurpose, User, WishListEntry,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use repo::{
    CategoryRepo, OrderRepo, ProductRepo, ReviewRepo, SessionRepo, Store, TokenRepo, UserRepo,
    WishListRepo,
};

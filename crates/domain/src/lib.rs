//! Business rules of the shop: accounts, catalog, and orders.
//!
//! Each service is generic over a [`store::Store`] implementation and
//! enforces the access policy itself; callers identify themselves with an
//! explicit [`Actor`] instead of any ambient context.

pub mod account;
pub mod authz;
pub mod catalog;
pub mod error;
pub mod mailer;
pub mod orders;

pub use account::{AccountService, RegisterRequest, UserProfile};
pub use authz::{AccessRule, Actor, authorize};
pub use catalog::{
    CatalogService, LikeStatus, ProductDetail, ProductInput, ProductPatch, ReviewAuthor,
    ReviewInput, ReviewView,
};
pub use error::{DomainError, Result};
pub use mailer::{LogMailer, MailError, Mailer, RecordingMailer};
pub use orders::{OrderLine, OrderRequest, OrderService, OrderView};

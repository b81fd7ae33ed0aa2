//! Repository traits, one per entity.
//!
//! All implementations must be thread-safe (Send + Sync). The [`Store`]
//! supertrait bundles every repository so services can take a single
//! generic parameter.

use async_trait::async_trait;
use common::{OrderId, ProductId, ReviewId, UserId};

use crate::entities::{
    AccountToken, Category, Order, OrderFilter, OrderItem, Product, ProductFilter, ProductOrdering,
    Review, Session, TokenPurpose, User, WishListEntry,
};
use crate::error::Result;
use crate::OrderStatus;

/// Read/write access to user rows.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Inserts a new user.
    ///
    /// Fails with `Conflict` if the email is already registered.
    async fn insert_user(&self, user: User) -> Result<()>;

    /// Looks a user up by id.
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>>;

    /// Looks a user up by email.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Sets the active flag. Fails with `NotFound` if the user is absent.
    async fn set_user_active(&self, id: UserId, active: bool) -> Result<()>;

    /// Replaces the stored password hash.
    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()>;
}

/// Read/write access to category rows.
#[async_trait]
pub trait CategoryRepo: Send + Sync {
    /// Inserts a category. Fails with `Conflict` on duplicate slug or title.
    async fn insert_category(&self, category: Category) -> Result<()>;

    /// Looks a category up by slug.
    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Lists all categories ordered by title.
    async fn list_categories(&self) -> Result<Vec<Category>>;
}

/// Read/write access to product rows.
#[async_trait]
pub trait ProductRepo: Send + Sync {
    /// Inserts a product.
    async fn insert_product(&self, product: Product) -> Result<()>;

    /// Looks a product up by id.
    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>>;

    /// Replaces a product row. Fails with `NotFound` if absent.
    async fn update_product(&self, product: Product) -> Result<()>;

    /// Deletes a product. Fails with `NotFound` if absent.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    /// Lists products matching `filter`, ordered per `ordering`
    /// (insertion order when `None`).
    async fn list_products(
        &self,
        filter: &ProductFilter,
        ordering: Option<ProductOrdering>,
    ) -> Result<Vec<Product>>;
}

/// Read/write access to review rows.
#[async_trait]
pub trait ReviewRepo: Send + Sync {
    /// Inserts a review.
    ///
    /// Fails with `Conflict` if the author already reviewed the product;
    /// this is the storage-level guarantee that closes the check-then-insert
    /// race.
    async fn insert_review(&self, review: Review) -> Result<()>;

    /// Looks a review up by id.
    async fn review_by_id(&self, id: ReviewId) -> Result<Option<Review>>;

    /// Finds the review a given author left on a given product.
    async fn review_by_author_and_product(
        &self,
        author: UserId,
        product: ProductId,
    ) -> Result<Option<Review>>;

    /// Lists all reviews for a product, oldest first.
    async fn reviews_for_product(&self, product: ProductId) -> Result<Vec<Review>>;

    /// Replaces a review row. Fails with `NotFound` if absent.
    async fn update_review(&self, review: Review) -> Result<()>;

    /// Deletes a review. Fails with `NotFound` if absent.
    async fn delete_review(&self, id: ReviewId) -> Result<()>;
}

/// Read/write access to order and order-item rows.
#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Persists an order and all of its items as a single atomic unit.
    ///
    /// Either the order row and every item row are stored, or nothing is.
    /// Fails with `Conflict` if `items` repeats a product.
    async fn insert_order_with_items(&self, order: Order, items: Vec<OrderItem>) -> Result<()>;

    /// Looks an order up by id.
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists the items of an order.
    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>>;

    /// Lists orders, newest first. `scope` restricts to one user's orders;
    /// `None` lists everything (staff view).
    async fn list_orders(&self, scope: Option<UserId>, filter: &OrderFilter)
    -> Result<Vec<Order>>;

    /// Updates the status of an order. Fails with `NotFound` if absent.
    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;
}

/// Read/write access to wishlist rows.
#[async_trait]
pub trait WishListRepo: Send + Sync {
    /// Looks up the entry for a (user, product) pair.
    async fn wishlist_entry(&self, user: UserId, product: ProductId)
    -> Result<Option<WishListEntry>>;

    /// Inserts or updates the entry for (entry.user, entry.product).
    ///
    /// The (user, product) pair is unique at the storage layer, so
    /// concurrent upserts converge on one row.
    async fn upsert_wishlist_entry(&self, entry: WishListEntry) -> Result<()>;
}

/// Read/write access to session-token rows.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Stores a newly issued session token.
    async fn insert_session(&self, session: Session) -> Result<()>;

    /// Resolves a bearer token to its session, if any.
    async fn session_by_token(&self, token: &str) -> Result<Option<Session>>;

    /// Deletes all sessions of a user. Returns the number removed;
    /// zero is not an error.
    async fn delete_sessions_for_user(&self, user: UserId) -> Result<u64>;
}

/// Read/write access to single-use account tokens.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Stores a freshly issued token.
    async fn insert_token(&self, token: AccountToken) -> Result<()>;

    /// Looks a token up by value and purpose.
    async fn token_by_value(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<AccountToken>>;

    /// Marks a token consumed. Fails with `NotFound` if absent.
    async fn consume_token(&self, token: &str) -> Result<()>;

    /// Marks all unconsumed tokens of a purpose for a user as consumed.
    /// Returns the number revoked.
    async fn revoke_tokens_for_user(&self, user: UserId, purpose: TokenPurpose) -> Result<u64>;
}

/// Everything the domain services need from storage.
pub trait Store:
    UserRepo
    + CategoryRepo
    + ProductRepo
    + ReviewRepo
    + OrderRepo
    + WishListRepo
    + SessionRepo
    + TokenRepo
{
}

// Blanket implementation: any type providing all repositories is a Store.
impl<T> Store for T where
    T: UserRepo
        + CategoryRepo
        + ProductRepo
        + ReviewRepo
        + OrderRepo
        + WishListRepo
        + SessionRepo
        + TokenRepo
{
}

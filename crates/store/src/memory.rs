use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, ProductId, ReviewId, UserId};
use tokio::sync::RwLock;

use crate::entities::{
    AccountToken, Category, Order, OrderFilter, OrderItem, Product, ProductFilter, ProductOrdering,
    Review, Session, TokenPurpose, User, WishListEntry,
};
use crate::error::{Result, StoreError};
use crate::repo::{
    CategoryRepo, OrderRepo, ProductRepo, ReviewRepo, SessionRepo, TokenRepo, UserRepo,
    WishListRepo,
};
use crate::OrderStatus;

#[derive(Default)]
struct State {
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<Product>,
    reviews: Vec<Review>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    wishlist: Vec<WishListEntry>,
    sessions: Vec<Session>,
    tokens: Vec<AccountToken>,
    fail_after_first_item: bool,
}

/// In-memory store implementation for testing.
///
/// Provides the same interface and uniqueness guarantees as the PostgreSQL
/// implementation. A single lock guards all tables, so multi-row writes
/// (order + items) are atomic here as well.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `insert_order_with_items` to fail after writing the first
    /// item, for exercising atomicity guarantees in tests.
    pub async fn set_fail_after_first_item(&self, fail: bool) {
        self.state.write().await.fail_after_first_item = fail;
    }

    /// Returns the number of stored order-item rows.
    pub async fn order_item_count(&self) -> usize {
        self.state.read().await.order_items.len()
    }

    /// Returns the number of stored order rows.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of stored user rows.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Returns all stored tokens for a user, for test inspection.
    pub async fn tokens_for_user(&self, user: UserId) -> Vec<AccountToken> {
        self.state
            .read()
            .await
            .tokens
            .iter()
            .filter(|t| t.user == user)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepo for InMemoryStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::conflict("users_email_key"));
        }
        state.users.push(user);
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::not_found("user"))?;
        user.is_active = active;
        Ok(())
    }

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::not_found("user"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl CategoryRepo for InMemoryStore {
    async fn insert_category(&self, category: Category) -> Result<()> {
        let mut state = self.state.write().await;
        if state.categories.iter().any(|c| c.slug == category.slug) {
            return Err(StoreError::conflict("categories_pkey"));
        }
        if state.categories.iter().any(|c| c.title == category.title) {
            return Err(StoreError::conflict("categories_title_key"));
        }
        state.categories.push(category);
        Ok(())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }
}

#[async_trait]
impl ProductRepo for InMemoryStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.push(product);
        Ok(())
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn update_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| StoreError::not_found("product"))?;
        *existing = product;
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.products.iter().any(|p| p.id == id) {
            return Err(StoreError::not_found("product"));
        }
        // Order items keep their product row; mirrors the schema's plain
        // foreign key without ON DELETE CASCADE.
        if state.order_items.iter().any(|i| i.product == id) {
            return Err(StoreError::conflict("order_items_product_fkey"));
        }
        state.products.retain(|p| p.id != id);
        // Cascades mirror the schema's ON DELETE CASCADE.
        state.reviews.retain(|r| r.product != id);
        state.wishlist.retain(|w| w.product != id);
        Ok(())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        ordering: Option<ProductOrdering>,
    ) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        match ordering {
            Some(ProductOrdering::Title) => products.sort_by(|a, b| a.title.cmp(&b.title)),
            Some(ProductOrdering::Price) => products.sort_by_key(|p| p.price),
            None => {}
        }
        Ok(products)
    }
}

#[async_trait]
impl ReviewRepo for InMemoryStore {
    async fn insert_review(&self, review: Review) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .reviews
            .iter()
            .any(|r| r.author == review.author && r.product == review.product)
        {
            return Err(StoreError::conflict("reviews_author_product_key"));
        }
        state.reviews.push(review);
        Ok(())
    }

    async fn review_by_id(&self, id: ReviewId) -> Result<Option<Review>> {
        let state = self.state.read().await;
        Ok(state.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn review_by_author_and_product(
        &self,
        author: UserId,
        product: ProductId,
    ) -> Result<Option<Review>> {
        let state = self.state.read().await;
        Ok(state
            .reviews
            .iter()
            .find(|r| r.author == author && r.product == product)
            .cloned())
    }

    async fn reviews_for_product(&self, product: ProductId) -> Result<Vec<Review>> {
        let state = self.state.read().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| r.product == product)
            .cloned()
            .collect();
        reviews.sort_by_key(|r| r.created_at);
        Ok(reviews)
    }

    async fn update_review(&self, review: Review) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .reviews
            .iter_mut()
            .find(|r| r.id == review.id)
            .ok_or_else(|| StoreError::not_found("review"))?;
        *existing = review;
        Ok(())
    }

    async fn delete_review(&self, id: ReviewId) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.reviews.len();
        state.reviews.retain(|r| r.id != id);
        if state.reviews.len() == before {
            return Err(StoreError::not_found("review"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepo for InMemoryStore {
    async fn insert_order_with_items(&self, order: Order, items: Vec<OrderItem>) -> Result<()> {
        // One lock acquisition for the whole write keeps the order and its
        // items atomic: on any failure nothing is left behind.
        let mut state = self.state.write().await;

        let mut seen: Vec<ProductId> = Vec::with_capacity(items.len());
        for item in &items {
            if seen.contains(&item.product) {
                return Err(StoreError::conflict("order_items_order_product_key"));
            }
            seen.push(item.product);
        }

        if state.fail_after_first_item && items.len() > 1 {
            // Simulated mid-write crash. The lock is still held and no
            // mutation has happened, matching a rolled-back transaction.
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }

        state.orders.push(order);
        state.order_items.extend(items);
        Ok(())
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .iter()
            .filter(|i| i.order == order)
            .cloned()
            .collect())
    }

    async fn list_orders(
        &self,
        scope: Option<UserId>,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let needle = filter.product.as_ref().map(|p| p.to_lowercase());
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| scope.is_none_or(|user| o.user == user))
            .filter(|o| filter.matches(o))
            .filter(|o| {
                needle.as_ref().is_none_or(|needle| {
                    state
                        .order_items
                        .iter()
                        .filter(|i| i.order == o.id)
                        .any(|i| {
                            state.products.iter().any(|p| {
                                p.id == i.product && p.title.to_lowercase().contains(needle)
                            })
                        })
                })
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("order"))?;
        order.status = status;
        Ok(())
    }
}

#[async_trait]
impl WishListRepo for InMemoryStore {
    async fn wishlist_entry(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<Option<WishListEntry>> {
        let state = self.state.read().await;
        Ok(state
            .wishlist
            .iter()
            .find(|w| w.user == user && w.product == product)
            .cloned())
    }

    async fn upsert_wishlist_entry(&self, entry: WishListEntry) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .wishlist
            .iter_mut()
            .find(|w| w.user == entry.user && w.product == entry.product)
        {
            existing.is_liked = entry.is_liked;
        } else {
            state.wishlist.push(entry);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepo for InMemoryStore {
    async fn insert_session(&self, session: Session) -> Result<()> {
        let mut state = self.state.write().await;
        state.sessions.push(session);
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<Session>> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|s| s.token == token).cloned())
    }

    async fn delete_sessions_for_user(&self, user: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.user != user);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl TokenRepo for InMemoryStore {
    async fn insert_token(&self, token: AccountToken) -> Result<()> {
        let mut state = self.state.write().await;
        state.tokens.push(token);
        Ok(())
    }

    async fn token_by_value(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<AccountToken>> {
        let state = self.state.read().await;
        Ok(state
            .tokens
            .iter()
            .find(|t| t.token == token && t.purpose == purpose)
            .cloned())
    }

    async fn consume_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .tokens
            .iter_mut()
            .find(|t| t.token == token)
            .ok_or_else(|| StoreError::not_found("token"))?;
        stored.consumed = true;
        Ok(())
    }

    async fn revoke_tokens_for_user(&self, user: UserId, purpose: TokenPurpose) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut revoked = 0;
        for token in state
            .tokens
            .iter_mut()
            .filter(|t| t.user == user && t.purpose == purpose && !t.consumed)
        {
            token.consumed = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::Money;

    use super::*;

    fn test_user(email: &str) -> User {
        User {
            id: UserId::new(),
            email: email.to_string(),
            password_hash: "$2b$12$hash".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: false,
            is_staff: false,
            created_at: Utc::now(),
        }
    }

    fn test_product(title: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(),
            title: title.to_string(),
            description: String::new(),
            price: Money::from_cents(cents),
            category_slug: "misc".to_string(),
            image: None,
        }
    }

    fn test_review(author: UserId, product: ProductId, rating: i16) -> Review {
        let now = Utc::now();
        Review {
            id: ReviewId::new(),
            author,
            product,
            text: "fine".to_string(),
            rating,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = InMemoryStore::new();
        store.insert_user(test_user("a@x.com")).await.unwrap();

        let result = store.insert_user(test_user("a@x.com")).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_review_is_a_conflict() {
        let store = InMemoryStore::new();
        let author = UserId::new();
        let product = ProductId::new();

        store
            .insert_review(test_review(author, product, 4))
            .await
            .unwrap();
        let result = store.insert_review(test_review(author, product, 5)).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn order_insert_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let order = Order {
            id: OrderId::new(),
            user: UserId::new(),
            status: OrderStatus::New,
            total_sum: Money::from_cents(3000),
            notes: String::new(),
            created_at: Utc::now(),
        };
        let items = vec![
            OrderItem {
                order: order.id,
                product: ProductId::new(),
                quantity: 1,
            },
            OrderItem {
                order: order.id,
                product: ProductId::new(),
                quantity: 2,
            },
        ];

        store.set_fail_after_first_item(true).await;
        let result = store.insert_order_with_items(order.clone(), items.clone()).await;
        assert!(result.is_err());
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);

        store.set_fail_after_first_item(false).await;
        store.insert_order_with_items(order, items).await.unwrap();
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.order_item_count().await, 2);
    }

    #[tokio::test]
    async fn duplicate_product_in_one_order_is_a_conflict() {
        let store = InMemoryStore::new();
        let order = Order {
            id: OrderId::new(),
            user: UserId::new(),
            status: OrderStatus::New,
            total_sum: Money::from_cents(1000),
            notes: String::new(),
            created_at: Utc::now(),
        };
        let product = ProductId::new();
        let items = vec![
            OrderItem {
                order: order.id,
                product,
                quantity: 1,
            },
            OrderItem {
                order: order.id,
                product,
                quantity: 2,
            },
        ];

        let result = store.insert_order_with_items(order, items).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn list_orders_scopes_by_user() {
        let store = InMemoryStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        for user in [alice, alice, bob] {
            let order = Order {
                id: OrderId::new(),
                user,
                status: OrderStatus::New,
                total_sum: Money::from_cents(100),
                notes: String::new(),
                created_at: Utc::now(),
            };
            store.insert_order_with_items(order, vec![]).await.unwrap();
        }

        let all = store
            .list_orders(None, &OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let alices = store
            .list_orders(Some(alice), &OrderFilter::default())
            .await
            .unwrap();
        assert_eq!(alices.len(), 2);
        assert!(alices.iter().all(|o| o.user == alice));
    }

    #[tokio::test]
    async fn list_orders_filters_by_product_title() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let apple = test_product("Gala Apple", 999);
        let pear = test_product("Pear", 500);
        store.insert_product(apple.clone()).await.unwrap();
        store.insert_product(pear.clone()).await.unwrap();

        for product in [apple.id, pear.id] {
            let order = Order {
                id: OrderId::new(),
                user,
                status: OrderStatus::New,
                total_sum: Money::from_cents(999),
                notes: String::new(),
                created_at: Utc::now(),
            };
            let items = vec![OrderItem {
                order: order.id,
                product,
                quantity: 1,
            }];
            store.insert_order_with_items(order, items).await.unwrap();
        }

        let filter = OrderFilter {
            product: Some("apple".to_string()),
            ..Default::default()
        };
        let matched = store.list_orders(None, &filter).await.unwrap();
        assert_eq!(matched.len(), 1);

        let filter = OrderFilter {
            product: Some("kiwi".to_string()),
            ..Default::default()
        };
        assert!(store.list_orders(None, &filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ordered_product_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let product = test_product("Apple", 999);
        store.insert_product(product.clone()).await.unwrap();

        let order = Order {
            id: OrderId::new(),
            user: UserId::new(),
            status: OrderStatus::New,
            total_sum: Money::from_cents(999),
            notes: String::new(),
            created_at: Utc::now(),
        };
        let items = vec![OrderItem {
            order: order.id,
            product: product.id,
            quantity: 1,
        }];
        store.insert_order_with_items(order, items).await.unwrap();

        let result = store.delete_product(product.id).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert!(store.product_by_id(product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wishlist_upsert_flips_in_place() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let product = ProductId::new();

        assert!(store.wishlist_entry(user, product).await.unwrap().is_none());

        store
            .upsert_wishlist_entry(WishListEntry {
                user,
                product,
                is_liked: true,
            })
            .await
            .unwrap();
        store
            .upsert_wishlist_entry(WishListEntry {
                user,
                product,
                is_liked: false,
            })
            .await
            .unwrap();

        let entry = store.wishlist_entry(user, product).await.unwrap().unwrap();
        assert!(!entry.is_liked);
    }

    #[tokio::test]
    async fn product_listing_filters_and_orders() {
        let store = InMemoryStore::new();
        store.insert_product(test_product("Mug", 999)).await.unwrap();
        store
            .insert_product(test_product("Kettle", 4999))
            .await
            .unwrap();
        store
            .insert_product(test_product("Apron", 1999))
            .await
            .unwrap();

        let by_price = store
            .list_products(&ProductFilter::default(), Some(ProductOrdering::Price))
            .await
            .unwrap();
        assert_eq!(by_price[0].title, "Mug");
        assert_eq!(by_price[2].title, "Kettle");

        let cheap = store
            .list_products(
                &ProductFilter {
                    price_to: Some(2000),
                    ..Default::default()
                },
                Some(ProductOrdering::Title),
            )
            .await
            .unwrap();
        assert_eq!(cheap.len(), 2);
        assert_eq!(cheap[0].title, "Apron");
    }

    #[tokio::test]
    async fn revoke_tokens_consumes_only_matching_purpose() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let now = Utc::now();

        for (value, purpose) in [
            ("act-1", TokenPurpose::Activation),
            ("rst-1", TokenPurpose::PasswordReset),
            ("rst-2", TokenPurpose::PasswordReset),
        ] {
            store
                .insert_token(AccountToken {
                    token: value.to_string(),
                    user,
                    purpose,
                    created_at: now,
                    expires_at: now + chrono::Duration::hours(1),
                    consumed: false,
                })
                .await
                .unwrap();
        }

        let revoked = store
            .revoke_tokens_for_user(user, TokenPurpose::PasswordReset)
            .await
            .unwrap();
        assert_eq!(revoked, 2);

        let activation = store
            .token_by_value("act-1", TokenPurpose::Activation)
            .await
            .unwrap()
            .unwrap();
        assert!(!activation.consumed);
    }

    #[tokio::test]
    async fn sessions_delete_is_idempotent() {
        let store = InMemoryStore::new();
        let user = UserId::new();

        store
            .insert_session(Session {
                token: "tok".to_string(),
                user,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(store.delete_sessions_for_user(user).await.unwrap(), 1);
        assert_eq!(store.delete_sessions_for_user(user).await.unwrap(), 0);
        assert!(store.session_by_token("tok").await.unwrap().is_none());
    }
}

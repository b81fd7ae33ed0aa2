use async_trait::async_trait;
use common::{Money, OrderId, ProductId, ReviewId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

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

/// Constraints the services rely on. Violations of these become typed
/// `Conflict` errors instead of opaque database failures.
const KNOWN_CONSTRAINTS: &[&str] = &[
    "users_email_key",
    "categories_pkey",
    "categories_title_key",
    "reviews_author_product_key",
    "order_items_order_product_key",
    "order_items_product_fkey",
    "wishlist_user_product_key",
];

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and runs pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store
            .run_migrations()
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(store)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn map_conflict(e: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = e
            && let Some(name) = db_err.constraint()
            && let Some(known) = KNOWN_CONSTRAINTS.iter().find(|c| **c == name)
        {
            return StoreError::conflict(known);
        }
        StoreError::Database(e)
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            is_active: row.try_get("is_active")?,
            is_staff: row.try_get("is_staff")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            category_slug: row.try_get("category_slug")?,
            image: row.try_get("image")?,
        })
    }

    fn row_to_review(row: &PgRow) -> Result<Review> {
        Ok(Review {
            id: ReviewId::from_uuid(row.try_get::<Uuid, _>("id")?),
            author: UserId::from_uuid(row.try_get::<Uuid, _>("author")?),
            product: ProductId::from_uuid(row.try_get::<Uuid, _>("product")?),
            text: row.try_get("text")?,
            rating: row.try_get("rating")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown order status: {status}").into()))?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status,
            total_sum: Money::from_cents(row.try_get("total_sum_cents")?),
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_token(row: &PgRow) -> Result<AccountToken> {
        let purpose: String = row.try_get("purpose")?;
        let purpose = TokenPurpose::parse(&purpose)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown token purpose: {purpose}").into()))?;
        Ok(AccountToken {
            token: row.try_get("token")?,
            user: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            purpose,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            consumed: row.try_get("consumed")?,
        })
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, is_active, is_staff, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_conflict)?;
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn set_user_active(&self, id: UserId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(active)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user"));
        }
        Ok(())
    }

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user"));
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryRepo for PgStore {
    async fn insert_category(&self, category: Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (slug, title) VALUES ($1, $2)")
            .bind(&category.slug)
            .bind(&category.title)
            .execute(&self.pool)
            .await
            .map_err(Self::map_conflict)?;
        Ok(())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT slug, title FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Category {
            slug: row.get("slug"),
            title: row.get("title"),
        }))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT slug, title FROM categories ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Category {
                slug: row.get("slug"),
                title: row.get("title"),
            })
            .collect())
    }
}

#[async_trait]
impl ProductRepo for PgStore {
    async fn insert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, title, description, price_cents, category_slug, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.category_slug)
        .bind(&product.image)
        .execute(&self.pool)
        .await
        .map_err(Self::map_conflict)?;
        Ok(())
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn update_product(&self, product: Product) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET title = $2, description = $3, price_cents = $4, category_slug = $5, image = $6
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.category_slug)
        .bind(&product.image)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product"));
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        // Deleting a product that an order references trips the
        // order_items foreign key, which maps to a conflict.
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(Self::map_conflict)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product"));
        }
        Ok(())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        ordering: Option<ProductOrdering>,
    ) -> Result<Vec<Product>> {
        let mut sql = String::from("SELECT * FROM products WHERE 1=1");
        let mut param_count = 0;

        if filter.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category_slug = ${param_count}"));
        }
        if filter.title.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND title ILIKE ${param_count}"));
        }
        if filter.description.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND description ILIKE ${param_count}"));
        }
        if filter.price_from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_cents >= ${param_count}"));
        }
        if filter.price_to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_cents <= ${param_count}"));
        }

        match ordering {
            Some(ProductOrdering::Title) => sql.push_str(" ORDER BY title"),
            Some(ProductOrdering::Price) => sql.push_str(" ORDER BY price_cents"),
            None => {}
        }

        let mut query = sqlx::query(&sql);
        if let Some(ref category) = filter.category {
            query = query.bind(category);
        }
        if let Some(ref title) = filter.title {
            query = query.bind(format!("%{title}%"));
        }
        if let Some(ref description) = filter.description {
            query = query.bind(format!("%{description}%"));
        }
        if let Some(from) = filter.price_from {
            query = query.bind(from);
        }
        if let Some(to) = filter.price_to {
            query = query.bind(to);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl ReviewRepo for PgStore {
    async fn insert_review(&self, review: Review) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (id, author, product, text, rating, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(review.id.as_uuid())
        .bind(review.author.as_uuid())
        .bind(review.product.as_uuid())
        .bind(&review.text)
        .bind(review.rating)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_conflict)?;
        Ok(())
    }

    async fn review_by_id(&self, id: ReviewId) -> Result<Option<Review>> {
        let row = sqlx::query("SELECT * FROM reviews WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_review).transpose()
    }

    async fn review_by_author_and_product(
        &self,
        author: UserId,
        product: ProductId,
    ) -> Result<Option<Review>> {
        let row = sqlx::query("SELECT * FROM reviews WHERE author = $1 AND product = $2")
            .bind(author.as_uuid())
            .bind(product.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_review).transpose()
    }

    async fn reviews_for_product(&self, product: ProductId) -> Result<Vec<Review>> {
        let rows = sqlx::query("SELECT * FROM reviews WHERE product = $1 ORDER BY created_at")
            .bind(product.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_review).collect()
    }

    async fn update_review(&self, review: Review) -> Result<()> {
        let result = sqlx::query(
            "UPDATE reviews SET text = $2, rating = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(review.id.as_uuid())
        .bind(&review.text)
        .bind(review.rating)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("review"));
        }
        Ok(())
    }

    async fn delete_review(&self, id: ReviewId) -> Result<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("review"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepo for PgStore {
    async fn insert_order_with_items(&self, order: Order, items: Vec<OrderItem>) -> Result<()> {
        // One transaction for the header and every item row; a failure on
        // any item rolls the whole order back.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total_sum_cents, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_sum.cents())
        .bind(&order.notes)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(item.order.as_uuid())
            .bind(item.product.as_uuid())
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_conflict)?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn items_for_order(&self, order: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT order_id, product_id, quantity FROM order_items WHERE order_id = $1",
        )
        .bind(order.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(OrderItem {
                    order: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                    product: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                })
            })
            .collect()
    }

    async fn list_orders(
        &self,
        scope: Option<UserId>,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>> {
        let mut sql = String::from("SELECT * FROM orders WHERE 1=1");
        let mut param_count = 0;

        if scope.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if filter.total_sum_from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND total_sum_cents >= ${param_count}"));
        }
        if filter.total_sum_to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND total_sum_cents <= ${param_count}"));
        }
        if filter.created_after.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if filter.created_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }
        if filter.product.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM order_items oi \
                 JOIN products p ON p.id = oi.product_id \
                 WHERE oi.order_id = orders.id AND p.title ILIKE ${param_count})"
            ));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query(&sql);
        if let Some(user) = scope {
            query = query.bind(user.as_uuid());
        }
        if let Some(from) = filter.total_sum_from {
            query = query.bind(from);
        }
        if let Some(to) = filter.total_sum_to {
            query = query.bind(to);
        }
        if let Some(after) = filter.created_after {
            query = query.bind(after);
        }
        if let Some(before) = filter.created_before {
            query = query.bind(before);
        }
        if let Some(product) = &filter.product {
            query = query.bind(format!("%{product}%"));
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order"));
        }
        Ok(())
    }
}

#[async_trait]
impl WishListRepo for PgStore {
    async fn wishlist_entry(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<Option<WishListEntry>> {
        let row = sqlx::query(
            "SELECT user_id, product_id, is_liked FROM wishlist WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user.as_uuid())
        .bind(product.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            Ok(WishListEntry {
                user: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                product: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                is_liked: row.try_get("is_liked")?,
            })
        })
        .transpose()
    }

    async fn upsert_wishlist_entry(&self, entry: WishListEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wishlist (user_id, product_id, is_liked)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT wishlist_user_product_key
            DO UPDATE SET is_liked = EXCLUDED.is_liked
            "#,
        )
        .bind(entry.user.as_uuid())
        .bind(entry.product.as_uuid())
        .bind(entry.is_liked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepo for PgStore {
    async fn insert_session(&self, session: Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(&session.token)
            .bind(session.user.as_uuid())
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT token, user_id, created_at FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Session {
                token: row.try_get("token")?,
                user: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn delete_sessions_for_user(&self, user: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenRepo for PgStore {
    async fn insert_token(&self, token: AccountToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_tokens (token, user_id, purpose, created_at, expires_at, consumed)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&token.token)
        .bind(token.user.as_uuid())
        .bind(token.purpose.as_str())
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.consumed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn token_by_value(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<AccountToken>> {
        let row = sqlx::query("SELECT * FROM account_tokens WHERE token = $1 AND purpose = $2")
            .bind(token)
            .bind(purpose.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_token).transpose()
    }

    async fn consume_token(&self, token: &str) -> Result<()> {
        let result = sqlx::query("UPDATE account_tokens SET consumed = TRUE WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("token"));
        }
        Ok(())
    }

    async fn revoke_tokens_for_user(&self, user: UserId, purpose: TokenPurpose) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE account_tokens
            SET consumed = TRUE
            WHERE user_id = $1 AND purpose = $2 AND NOT consumed
            "#,
        )
        .bind(user.as_uuid())
        .bind(purpose.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

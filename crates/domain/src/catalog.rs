//! Catalog policy engine.
//!
//! Products, categories, reviews, and wishlist likes. Reads are public;
//! catalog writes are staff-only; reviews belong to their author.

use chrono::Utc;
use common::{Money, ProductId, ReviewId};
use store::{
    Category, Product, ProductFilter, ProductOrdering, Review, Store, WishListEntry,
};

use crate::authz::{AccessRule, Actor, authorize};
use crate::error::{DomainError, Result};

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub title: String,
    pub description: String,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Slug of an existing category.
    pub category: String,
    pub image: Option<String>,
}

/// Partial update for a product. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category: Option<String>,
    pub image: Option<String>,
}

/// Input for creating or updating a review.
#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub text: String,
    /// 1..=5 inclusive.
    pub rating: i16,
}

/// Author of a review, reduced to what the detail page shows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReviewAuthor {
    pub first_name: String,
    pub last_name: String,
}

impl ReviewAuthor {
    /// Name shown next to a review. Users without a name stay anonymous.
    pub fn display_name(&self) -> String {
        if self.first_name.is_empty() && self.last_name.is_empty() {
            "Anonymous User".to_string()
        } else {
            format!("{} {}", self.first_name, self.last_name)
                .trim()
                .to_string()
        }
    }
}

/// A review joined with its author's display data.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewView {
    pub id: ReviewId,
    pub author: ReviewAuthor,
    pub text: String,
    pub rating: i16,
    pub created_at: chrono::DateTime<Utc>,
}

/// A product with its aggregated review data.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProductDetail {
    pub product: Product,
    /// Mean review rating rounded to one decimal, `0.0` with no reviews.
    pub rating: f64,
    pub reviews: Vec<ReviewView>,
}

/// Result of toggling a wishlist like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeStatus {
    Liked,
    Disliked,
}

/// Service for catalog management.
pub struct CatalogService<S> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists products matching `filter`. Public.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        ordering: Option<ProductOrdering>,
    ) -> Result<Vec<Product>> {
        Ok(self.store.list_products(filter, ordering).await?)
    }

    /// Returns one product with its reviews and mean rating. Public.
    #[tracing::instrument(skip(self))]
    pub async fn product_detail(&self, id: ProductId) -> Result<ProductDetail> {
        let product = self
            .store
            .product_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product"))?;
        let reviews = self.store.reviews_for_product(id).await?;

        let rating = mean_rating(&reviews);
        let mut views = Vec::with_capacity(reviews.len());
        for review in reviews {
            let author = match self.store.user_by_id(review.author).await? {
                Some(user) => ReviewAuthor {
                    first_name: user.first_name,
                    last_name: user.last_name,
                },
                None => ReviewAuthor {
                    first_name: String::new(),
                    last_name: String::new(),
                },
            };
            views.push(ReviewView {
                id: review.id,
                author,
                text: review.text,
                rating: review.rating,
                created_at: review.created_at,
            });
        }

        Ok(ProductDetail {
            product,
            rating,
            reviews: views,
        })
    }

    /// Adds a product to the catalog. Staff only.
    #[tracing::instrument(skip(self, actor, input), fields(title = %input.title))]
    pub async fn create_product(&self, actor: &Actor, input: ProductInput) -> Result<Product> {
        authorize(actor, AccessRule::StaffOnly)?;
        validate_title(&input.title)?;
        let price = validate_price(input.price_cents)?;
        self.require_category(&input.category).await?;

        let product = Product {
            id: ProductId::new(),
            title: input.title,
            description: input.description,
            price,
            category_slug: input.category,
            image: input.image,
        };
        self.store.insert_product(product.clone()).await?;

        metrics::counter!("products_created_total").increment(1);
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Applies a partial update to a product. Staff only.
    #[tracing::instrument(skip(self, actor, patch))]
    pub async fn update_product(
        &self,
        actor: &Actor,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product> {
        authorize(actor, AccessRule::StaffOnly)?;
        let mut product = self
            .store
            .product_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product"))?;

        if let Some(title) = patch.title {
            validate_title(&title)?;
            product.title = title;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(cents) = patch.price_cents {
            product.price = validate_price(cents)?;
        }
        if let Some(category) = patch.category {
            self.require_category(&category).await?;
            product.category_slug = category;
        }
        if let Some(image) = patch.image {
            product.image = Some(image);
        }

        self.store.update_product(product.clone()).await?;
        Ok(product)
    }

    /// Removes a product, cascading its reviews and wishlist rows. Staff only.
    #[tracing::instrument(skip(self, actor))]
    pub async fn delete_product(&self, actor: &Actor, id: ProductId) -> Result<()> {
        authorize(actor, AccessRule::StaffOnly)?;
        if self.store.product_by_id(id).await?.is_none() {
            return Err(DomainError::not_found("product"));
        }
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Publishes a review for a product. One review per author and product.
    #[tracing::instrument(skip(self, actor, input))]
    pub async fn create_review(
        &self,
        actor: &Actor,
        product: ProductId,
        input: ReviewInput,
    ) -> Result<Review> {
        authorize(actor, AccessRule::Authenticated)?;
        let author = actor.user_id().ok_or_else(|| {
            DomainError::Authentication("authentication required".to_string())
        })?;
        validate_rating(input.rating)?;
        if self.store.product_by_id(product).await?.is_none() {
            return Err(DomainError::not_found("product"));
        }
        if self
            .store
            .review_by_author_and_product(author, product)
            .await?
            .is_some()
        {
            return Err(DomainError::validation(
                "product",
                "you have already reviewed this product",
            ));
        }

        let now = Utc::now();
        let review = Review {
            id: ReviewId::new(),
            author,
            product,
            text: input.text,
            rating: input.rating,
            created_at: now,
            updated_at: now,
        };
        // The store's unique constraint still backs the check above when
        // two requests race.
        self.store.insert_review(review.clone()).await?;

        metrics::counter!("reviews_created_total").increment(1);
        Ok(review)
    }

    /// Edits a review. Author or staff only.
    #[tracing::instrument(skip(self, actor, input))]
    pub async fn update_review(
        &self,
        actor: &Actor,
        id: ReviewId,
        input: ReviewInput,
    ) -> Result<Review> {
        let mut review = self
            .store
            .review_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("review"))?;
        authorize(actor, AccessRule::OwnerOrStaff { owner: review.author })?;
        validate_rating(input.rating)?;

        review.text = input.text;
        review.rating = input.rating;
        review.updated_at = Utc::now();
        self.store.update_review(review.clone()).await?;
        Ok(review)
    }

    /// Deletes a review. Author or staff only.
    #[tracing::instrument(skip(self, actor))]
    pub async fn delete_review(&self, actor: &Actor, id: ReviewId) -> Result<()> {
        let review = self
            .store
            .review_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("review"))?;
        authorize(actor, AccessRule::OwnerOrStaff { owner: review.author })?;
        self.store.delete_review(id).await?;
        Ok(())
    }

    /// Flips the actor's like on a product, creating the wishlist row on
    /// first use.
    #[tracing::instrument(skip(self, actor))]
    pub async fn toggle_like(&self, actor: &Actor, product: ProductId) -> Result<LikeStatus> {
        authorize(actor, AccessRule::Authenticated)?;
        let user = actor.user_id().ok_or_else(|| {
            DomainError::Authentication("authentication required".to_string())
        })?;
        if self.store.product_by_id(product).await?.is_none() {
            return Err(DomainError::not_found("product"));
        }

        let is_liked = match self.store.wishlist_entry(user, product).await? {
            Some(entry) => !entry.is_liked,
            None => true,
        };
        self.store
            .upsert_wishlist_entry(WishListEntry {
                user,
                product,
                is_liked,
            })
            .await?;

        Ok(if is_liked {
            LikeStatus::Liked
        } else {
            LikeStatus::Disliked
        })
    }

    /// Creates a category; the slug is derived from the title. Staff only.
    #[tracing::instrument(skip(self, actor))]
    pub async fn create_category(&self, actor: &Actor, title: &str) -> Result<Category> {
        authorize(actor, AccessRule::StaffOnly)?;
        validate_title(title)?;

        let category = Category {
            slug: slugify(title),
            title: title.to_string(),
        };
        self.store.insert_category(category.clone()).await?;
        Ok(category)
    }

    /// Lists all categories. Public.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    async fn require_category(&self, slug: &str) -> Result<()> {
        if self.store.category_by_slug(slug).await?.is_none() {
            return Err(DomainError::validation("category", "unknown category slug"));
        }
        Ok(())
    }
}

/// Mean review rating rounded to one decimal. `0.0` with no reviews.
fn mean_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
    let mean = sum as f64 / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Derives a URL slug from a category title.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("title", "title must not be empty"));
    }
    Ok(())
}

fn validate_price(cents: i64) -> Result<Money> {
    if cents < 0 {
        return Err(DomainError::validation(
            "price",
            "price must not be negative",
        ));
    }
    Ok(Money::from_cents(cents))
}

fn validate_rating(rating: i16) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(DomainError::validation(
            "rating",
            "rating must be between 1 and 5",
        ));
    }
    Ok(())
}

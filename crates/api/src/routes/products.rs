//! Catalog endpoints: products, reviews, wishlist likes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::{ProductId, ReviewId};
use domain::{LikeStatus, ProductInput, ProductPatch, ReviewInput};
use serde::{Deserialize, Serialize};
use store::{Product, ProductFilter, ProductOrdering, Review, Store};
use uuid::Uuid;

use crate::AppState;
use crate::auth::resolve_actor;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_from: Option<i64>,
    pub price_to: Option<i64>,
    pub ordering: Option<ProductOrdering>,
}

#[derive(Deserialize)]
pub struct CreateProductBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateProductBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize)]
pub struct ReviewBody {
    #[serde(default)]
    pub text: String,
    pub rating: i16,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    pub image: Option<String>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        ProductResponse {
            id: p.id,
            title: p.title,
            description: p.description,
            price_cents: p.price.cents(),
            category: p.category_slug,
            image: p.image,
        }
    }
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub id: ReviewId,
    pub author: String,
    pub text: String,
    pub rating: i16,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct ProductDetailResponse {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub rating: f64,
    pub reviews: Vec<ReviewResponse>,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub status: LikeStatus,
}

// -- Handlers --

/// GET /products — list products, optionally filtered and ordered.
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let filter = ProductFilter {
        category: query.category,
        title: query.title,
        description: query.description,
        price_from: query.price_from,
        price_to: query.price_to,
    };
    let products = state.catalog.list_products(&filter, query.ordering).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// POST /products — add a product to the catalog (staff).
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<CreateProductBody>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let product = state
        .catalog
        .create_product(
            &actor,
            ProductInput {
                title: body.title,
                description: body.description,
                price_cents: body.price_cents,
                category: body.category,
                image: body.image,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/:id — product with its reviews and mean rating.
pub async fn detail<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductDetailResponse>, ApiError> {
    let detail = state
        .catalog
        .product_detail(ProductId::from_uuid(id))
        .await?;
    let reviews = detail
        .reviews
        .into_iter()
        .map(|r| ReviewResponse {
            id: r.id,
            author: r.author.display_name(),
            text: r.text,
            rating: r.rating,
            created_at: r.created_at,
        })
        .collect();
    Ok(Json(ProductDetailResponse {
        product: detail.product.into(),
        rating: detail.rating,
        reviews,
    }))
}

/// PUT/PATCH /products/:id — partial product update (staff).
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdateProductBody>,
) -> Result<Json<ProductResponse>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let product = state
        .catalog
        .update_product(
            &actor,
            ProductId::from_uuid(id),
            ProductPatch {
                title: body.title,
                description: body.description,
                price_cents: body.price_cents,
                category: body.category,
                image: body.image,
            },
        )
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /products/:id — remove a product (staff).
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    state
        .catalog
        .delete_product(&actor, ProductId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/:id/create_review — publish a review.
pub async fn create_review<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ReviewBody>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let review = state
        .catalog
        .create_review(
            &actor,
            ProductId::from_uuid(id),
            ReviewInput {
                text: body.text,
                rating: body.rating,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// PUT/PATCH /reviews/:id — edit a review (author or staff).
pub async fn update_review<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ReviewBody>,
) -> Result<Json<Review>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let review = state
        .catalog
        .update_review(
            &actor,
            ReviewId::from_uuid(id),
            ReviewInput {
                text: body.text,
                rating: body.rating,
            },
        )
        .await?;
    Ok(Json(review))
}

/// DELETE /reviews/:id — remove a review (author or staff).
pub async fn delete_review<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    state
        .catalog
        .delete_review(&actor, ReviewId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/:id/like — toggle the caller's like on a product.
pub async fn like<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<LikeResponse>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let status = state
        .catalog
        .toggle_like(&actor, ProductId::from_uuid(id))
        .await?;
    Ok(Json(LikeResponse { status }))
}

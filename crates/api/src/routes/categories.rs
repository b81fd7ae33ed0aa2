//! Category endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use store::{Category, Store};

use crate::AppState;
use crate::auth::resolve_actor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateCategoryBody {
    pub title: String,
}

/// GET /categories — list all categories.
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.catalog.list_categories().await?))
}

/// POST /categories — create a category (staff).
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<CreateCategoryBody>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let category = state.catalog.create_category(&actor, &body.title).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

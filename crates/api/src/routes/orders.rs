//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::{OrderId, ProductId};
use domain::{OrderLine, OrderRequest, OrderView};
use serde::{Deserialize, Serialize};
use store::{Order, OrderFilter, OrderStatus, Store};
use uuid::Uuid;

use crate::AppState;
use crate::auth::resolve_actor;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderBody {
    pub items: Vec<OrderItemBody>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct OrderItemBody {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub total_sum_from: Option<i64>,
    pub total_sum_to: Option<i64>,
    pub created_after: Option<chrono::DateTime<chrono::Utc>>,
    pub created_before: Option<chrono::DateTime<chrono::Utc>>,
    pub product: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub notes: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Order> for OrderSummary {
    fn from(o: Order) -> Self {
        OrderSummary {
            id: o.id,
            status: o.status,
            total_cents: o.total_sum.cents(),
            notes: o.notes,
            created_at: o.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(view: OrderView) -> Self {
        OrderResponse {
            order: view.order.into(),
            items: view
                .items
                .into_iter()
                .map(|i| OrderItemResponse {
                    product_id: i.product,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /orders — place an order from catalog products.
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let view = state
        .orders
        .create_order(
            &actor,
            OrderRequest {
                items: body
                    .items
                    .into_iter()
                    .map(|i| OrderLine {
                        product: ProductId::from_uuid(i.product_id),
                        quantity: i.quantity,
                    })
                    .collect(),
                notes: body.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// GET /orders — the caller's orders; staff see every order.
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let filter = OrderFilter {
        total_sum_from: query.total_sum_from,
        total_sum_to: query.total_sum_to,
        created_after: query.created_after,
        created_before: query.created_before,
        product: query.product,
    };
    let orders = state.orders.list_orders(&actor, &filter).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/:id — one order with its items (owner or staff).
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let view = state
        .orders
        .get_order(&actor, OrderId::from_uuid(id))
        .await?;
    Ok(Json(view.into()))
}

/// PUT/PATCH /orders/:id — move an order to a new status (staff).
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<OrderSummary>, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    let order = state
        .orders
        .update_status(&actor, OrderId::from_uuid(id), body.status)
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /orders/:id — always refused; orders are kept for the record.
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let actor = resolve_actor(&state.store, &headers).await?;
    state
        .orders
        .delete_order(&actor, OrderId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

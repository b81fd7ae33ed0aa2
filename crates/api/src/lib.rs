//! HTTP API server with observability for the shop backend.
//!
//! Exposes the account, catalog, and order services as REST endpoints,
//! with structured logging (tracing) and Prometheus metrics. Callers
//! authenticate with a bearer session token; everyone else is served as
//! an anonymous actor with read-only access to the catalog.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{AccountService, CatalogService, Mailer, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
    /// Used directly for bearer-token actor resolution.
    pub store: S,
}

/// Wires the services over one store and mailer.
pub fn create_state<S: Store + Clone + 'static>(
    store: S,
    mailer: Arc<dyn Mailer>,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        accounts: AccountService::new(store.clone(), mailer),
        catalog: CatalogService::new(store.clone()),
        orders: OrderService::new(store.clone()),
        store,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/account/register", post(routes::account::register::<S>))
        .route("/account/activation", post(routes::account::activation::<S>))
        .route("/account/login", post(routes::account::login::<S>))
        .route("/account/logout", post(routes::account::logout::<S>))
        .route(
            "/account/reset_password",
            post(routes::account::reset_password::<S>),
        )
        .route(
            "/account/reset_password_complete",
            post(routes::account::reset_password_complete::<S>),
        )
        .route(
            "/account/change_password",
            post(routes::account::change_password::<S>),
        )
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::detail::<S>)
                .put(routes::products::update::<S>)
                .patch(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/products/{id}/create_review",
            post(routes::products::create_review::<S>),
        )
        .route("/products/{id}/like", post(routes::products::like::<S>))
        .route(
            "/reviews/{id}",
            axum::routing::put(routes::products::update_review::<S>)
                .patch(routes::products::update_review::<S>)
                .delete(routes::products::delete_review::<S>),
        )
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>)
                .put(routes::orders::update_status::<S>)
                .patch(routes::orders::update_status::<S>)
                .delete(routes::orders::delete::<S>),
        )
        .route(
            "/categories",
            get(routes::categories::list::<S>).post(routes::categories::create::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

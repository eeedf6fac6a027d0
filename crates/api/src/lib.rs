//! HTTP API server for the ticket reservation core.
//!
//! Exposes the reservation lifecycle over REST with structured logging
//! (tracing) and Prometheus metrics. Caller identity arrives from the
//! gateway in `x-user-id` / `x-user-role` headers.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use lifecycle::LifecycleEngine;
use metrics_exporter_prometheus::PrometheusHandle;
use store::TicketStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::transactions::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: TicketStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/transactions/checkout",
            post(routes::transactions::checkout::<S>),
        )
        .route("/transactions", get(routes::transactions::list::<S>))
        .route("/transactions/{id}", get(routes::transactions::get::<S>))
        .route(
            "/transactions/{id}/proof",
            post(routes::transactions::upload_proof::<S>),
        )
        .route(
            "/transactions/{id}/decision",
            post(routes::transactions::decide::<S>),
        )
        .route(
            "/transactions/{id}/cancel",
            post(routes::transactions::cancel::<S>),
        )
        .route(
            "/events/{id}/approvals",
            get(routes::transactions::approvals::<S>),
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

/// Creates the shared application state over a store.
pub fn create_state<S: TicketStore + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        engine: LifecycleEngine::new(store),
    })
}

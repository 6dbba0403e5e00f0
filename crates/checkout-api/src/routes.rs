//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - POST /api/v1/collections - Seed a payment collection (dev mode)
/// - POST /api/v1/collections/{collection_id}/sessions - Ensure the active session
/// - POST /api/v1/collections/{collection_id}/confirm - Confirm and place the order
/// - GET  /api/v1/orders/{order_id} - Placed-order lookup
/// - GET  /health - Health check
pub fn create_router(state: AppState) -> Router {
    // Storefront origins vary per deployment; the API itself carries no
    // credentials beyond the publishable key.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/collections", post(handlers::create_collection))
        .route(
            "/collections/{collection_id}/sessions",
            post(handlers::create_session),
        )
        .route(
            "/collections/{collection_id}/confirm",
            post(handlers::confirm),
        )
        .route("/orders/{order_id}", get(handlers::get_order));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

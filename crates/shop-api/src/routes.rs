//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers::{self, HX_REDIRECT_HEADER, REFERENCE_ID_HEADER};
use crate::state::AppState;
use axum::{
    http::header::AUTHORIZATION,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  /health - Health check
/// - POST /create-order - Start a checkout
/// - POST /capture-order/{order_id} - Capture an approved provider order
pub fn create_router(state: AppState) -> Router {
    // Browser clients read the capture credentials back from the create-order response
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([AUTHORIZATION, REFERENCE_ID_HEADER, HX_REDIRECT_HEADER]);

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        // Checkout
        .route("/create-order", post(handlers::create_order))
        .route("/capture-order/{order_id}", post(handlers::capture_order))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        // State
        .with_state(state)
}

//! # Routes
//!
//! Axum router configuration for the petcare API.

use crate::handlers;
use crate::middleware::resolve_locale;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET   /health - Health check
/// - GET   /api/languages - Enabled languages
/// - PATCH /api/languages/{code} - Enable/disable a language (admin)
/// - GET   /api/user - Current user and resolved locale
///
/// - Payments:
///   - POST /api/payments - Create (or reuse) an order and start a payment
///   - GET  /api/payments/result?orderId= - Payment result for an order
///   - POST /api/payments/{driver}/callback - Provider callback
///   - POST /api/payments/handle - Provider callback for the default driver
///
/// Every route runs behind the locale middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let payment_routes = Router::new()
        .route("/", post(handlers::create_payment))
        .route("/result", get(handlers::payment_result))
        .route("/handle", post(handlers::default_callback))
        .route("/{driver}/callback", post(handlers::driver_callback));

    let api_routes = Router::new()
        .route("/languages", get(handlers::list_languages))
        .route("/languages/{code}", patch(handlers::toggle_language))
        .route("/user", get(handlers::current_user))
        .nest("/payments", payment_routes);

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), resolve_locale))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

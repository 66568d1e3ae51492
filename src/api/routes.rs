//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for unknown routes
async fn fallback_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(handlers::ApiError {
            error: format!("No route for {}", uri.path()),
        }),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket for real-time updates
        .route("/ws", get(ws_handler))
        // Chain and accounts
        .route("/api/chain", get(handlers::get_chain_info))
        .route("/api/accounts/{address}", get(handlers::get_account))
        // Quorum wallets (read only; owners act through their own keys)
        .route("/api/wallets", get(handlers::list_wallets))
        .route("/api/wallets/{address}", get(handlers::get_wallet))
        .route(
            "/api/wallets/{address}/transactions",
            get(handlers::list_transactions),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}",
            get(handlers::get_transaction),
        )
        // Permit relay
        .route("/api/permits", post(handlers::relay_permit))
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}

//! Router construction.

use axum::{middleware::from_fn, Router};
use gateway_core::headers::X_REQUEST_ID;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::{
    handlers,
    middleware::{logging_middleware, MakeRequestUuidV4},
    state::AppState,
};

/// Create the gateway router.
///
/// There are no fixed routes: every path goes through the gateway handler,
/// which classifies it against the configured route table.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(handlers::gateway)
        // Apply middleware
        .layer(from_fn(logging_middleware))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
        // Add state
        .with_state(state)
}

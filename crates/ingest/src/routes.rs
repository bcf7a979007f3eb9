//! Router assembly

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the ingest router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(handlers::ingest_events))
        .route("/v1/opt-out", post(handlers::opt_out))
        .route("/v1/privacy/delete", post(handlers::privacy_delete))
        .route("/health", get(handlers::health))
        .with_state(state)
}

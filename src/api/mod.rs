//! API module for all HTTP handlers

pub mod handlers;
pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;

pub use handlers::health;
pub use webhook::handle_webhook;

/// Routes served by the hook: the push endpoint at `/` and `/webhook`, plus `/health`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::post(handle_webhook))
        .route("/webhook", routing::post(handle_webhook))
        .route("/health", routing::get(health))
        .with_state(state)
}

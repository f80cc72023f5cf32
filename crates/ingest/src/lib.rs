//! Ingest service library.
//!
//! `main.rs` is a thin binary wrapper around these modules; integration
//! tests build the router directly and serve it on an ephemeral port.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;

use axum::Router;
use axum::routing::post;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Builds the `/ingest/{subscription_id}` router, shared by the binary
/// entry point and integration tests.
pub fn app(state: Arc<AppState>, max_payload_bytes: usize) -> Router {
    Router::new()
        .route("/ingest/{subscription_id}", post(handlers::ingest))
        .layer(RequestBodyLimitLayer::new(max_payload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

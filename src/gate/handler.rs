//! The single catch-all route.
//!
//! Only authenticated connections ever reach this router, so it has nothing
//! to check: every method on every path gets the same `200 OK` text.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tower_http::trace::TraceLayer;

/// Build the router answering every request with `body`.
pub fn create_router(body: impl Into<Arc<str>>) -> Router {
    Router::new()
        .fallback(confirm_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(body.into())
}

async fn confirm_handler(State(body): State<Arc<str>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.to_string(),
    )
}

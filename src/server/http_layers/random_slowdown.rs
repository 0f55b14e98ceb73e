//! Random slowdown middleware for testing
#![allow(dead_code)] // Feature-gated middleware

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use rand::Rng;

/// Delays each request by up to 1.5 seconds, to exercise client loading
/// states against a local server.
pub async fn slowdown_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let delay_ms = rand::rng().random_range(0..1500);
    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    next.run(request).await
}

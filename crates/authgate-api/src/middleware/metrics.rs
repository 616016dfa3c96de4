//! Request counting middleware
//!
//! Counts every request in total and per matched route for `/metrics`.

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Label used for requests that matched no route
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Record the request against its route, then pass it on
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(request.extensions().get::<MatchedPath>());
    let method = request.method().clone();

    state.record_request(&endpoint).await;
    let response = next.run(request).await;

    tracing::debug!(
        method = %method,
        endpoint = %endpoint,
        status = response.status().as_u16(),
        latency_us = start.elapsed().as_micros() as u64,
        "Request completed"
    );

    response
}

fn endpoint_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}

// ============================
// crates/backend-lib/src/middleware/monitor.rs
// ============================
use std::sync::Arc;
use std::time::Instant;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::storage::Storage;
use crate::AppState;

/// Feed every request's status and latency to the performance monitor
pub async fn track_requests<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    state
        .monitor
        .record(method.as_str(), &path, response.status().as_u16(), start.elapsed());
    response
}

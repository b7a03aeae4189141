// ============================
// crates/backend-lib/src/middleware/rate_limit.rs
// ============================
//! Fixed-window request limits keyed by client address.
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::storage::Storage;
use crate::{error::AppError, AppState};

/// Key used when no forwarding header names the client
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limit entry for a client
#[derive(Debug)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

/// Counts requests per client inside a fixed window
#[derive(Debug)]
pub struct RateLimiter {
    clients: DashMap<String, RateLimitEntry>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            clients: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// Count one request from `client`. Returns false when the client has
    /// used up its window.
    pub fn check(&self, client: &str) -> bool {
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| RateLimitEntry {
                requests: 0,
                window_start: Instant::now(),
            });

        // Check if window has expired
        if entry.window_start.elapsed() >= self.window {
            entry.requests = 0;
            entry.window_start = Instant::now();
        }

        if entry.requests >= self.max_requests {
            return false;
        }
        entry.requests += 1;
        true
    }

    /// Drop entries whose window has passed
    pub fn cleanup(&self) {
        self.clients
            .retain(|_, entry| entry.window_start.elapsed() < self.window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Client address from `x-real-ip`, then the first `x-forwarded-for` hop
pub fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-real-ip")
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
        })
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

async fn limit_with(
    limiter: &RateLimiter,
    scope: &'static str,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_ip(request.headers());
    if !limiter.check(&client) {
        tracing::warn!(client = %client, scope, path = %request.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimitExceeded);
    }
    Ok(next.run(request).await)
}

/// Global limit applied to every route
pub async fn rate_limit<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limit_with(&state.rate_limiter, "global", request, next).await
}

/// Tighter limit for the public form endpoints
pub async fn form_rate_limit<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limit_with(&state.form_limiter, "form", request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_limit_per_client() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        // Other clients are counted separately
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 1);
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_cleanup_drops_stale_entries() {
        let limiter = RateLimiter::new(Duration::from_millis(10), 5);
        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.tracked_clients(), 2);
        std::thread::sleep(Duration::from_millis(20));
        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_client_ip_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), UNKNOWN_CLIENT);

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "1.2.3.4");

        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(client_ip(&headers), "5.6.7.8");
    }
}

// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Lockout for repeated failed logins.
//!
//! Failures are counted per client in a fixed window opened by the first
//! failure. Once a client reaches `max_attempts` failures inside its window
//! it is refused until the window closes. A successful login clears the
//! client's count.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    failures: u32,
    opened: Instant,
}

impl FailureWindow {
    fn is_open(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.opened) < window
    }
}

/// Failed-login counter keyed by client IP
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    failures: Arc<DashMap<String, FailureWindow>>,
    max_attempts: u32,
    window: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            failures: Arc::new(DashMap::new()),
            max_attempts,
            window,
        }
    }

    pub fn record_failed_attempt(&self, client: &str) {
        let now = Instant::now();
        let mut entry = self
            .failures
            .entry(client.to_string())
            .or_insert(FailureWindow { failures: 0, opened: now });

        if !entry.is_open(now, self.window) {
            *entry = FailureWindow { failures: 0, opened: now };
        }
        entry.failures += 1;

        if entry.failures == self.max_attempts {
            let remaining = self.window.saturating_sub(now.duration_since(entry.opened));
            tracing::warn!(
                client,
                attempts = entry.failures,
                lockout_secs = remaining.as_secs(),
                "client locked out after repeated failed logins"
            );
        }
    }

    pub fn record_success(&self, client: &str) {
        self.failures.remove(client);
    }

    /// `false` while the client has used up its failures for the current window
    pub fn check_rate_limit(&self, client: &str) -> bool {
        let now = Instant::now();
        self.failures.get(client).map_or(true, |entry| {
            !entry.is_open(now, self.window) || entry.failures < self.max_attempts
        })
    }

    /// Drop clients whose window has closed
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.failures.retain(|_, entry| entry.is_open(now, self.window));
    }

    pub fn tracked_clients(&self) -> usize {
        self.failures.len()
    }
}

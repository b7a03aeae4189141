// ============================
// crates/backend-lib/src/middleware/mod.rs
// ============================
//! Request middleware: authentication, rate limits and monitoring.

pub mod auth;
pub mod monitor;
pub mod rate_limit;

pub use auth::{bearer_token, require_admin, require_auth};
pub use monitor::track_requests;
pub use rate_limit::{client_ip, form_rate_limit, rate_limit, RateLimiter};

// ============================
// backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

mod manager;
pub mod password;
pub mod rate_limit;
mod service;
pub mod session;
pub mod token;
mod user;

pub use manager::AuthManager;
pub use password::{
    validate_password_strength, verify_password, PasswordRequirements, MIN_PASSWORD_LENGTH,
};
pub use rate_limit::AuthRateLimiter;
pub use service::{AuthService, IssuedToken};
pub use session::{SessionRecord, SessionStore};
pub use token::{Claims, TokenSigner};
pub use user::{AuthUser, User, ADMIN_ROLE};

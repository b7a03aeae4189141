use async_trait::async_trait;
use dingfeng_common::{SessionStats, UserProfile};

use super::AuthUser;
use crate::error::AppError;

/// Token and profile handed out by a successful login
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user: UserProfile,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Whether an account exists yet
    async fn is_initialized(&self) -> Result<bool, AppError>;
    async fn create_initial_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AppError>;
    async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<IssuedToken, AppError>;
    /// Resolve a bearer token to the account behind it. Failures are
    /// `AppError::Auth` carrying the reason.
    async fn verify_token(&self, token: &str) -> Result<AuthUser, AppError>;
    async fn logout(&self, token: &str) -> Result<(), AppError>;
    async fn change_password(
        &self,
        user_id: u64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError>;
    async fn cleanup_expired_sessions(&self) -> Result<usize, AppError>;
    async fn session_stats(&self) -> Result<SessionStats, AppError>;
}

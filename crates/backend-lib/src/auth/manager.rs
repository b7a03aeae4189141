// ============================
// backend-lib/src/auth/manager.rs
// ============================
//! File-backed implementation of [`AuthService`].
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dingfeng_common::{SessionStats, UserProfile};
use metrics::counter;
use scrypt::Params;

use super::password::{self, PasswordRequirements};
use super::session::{SessionRecord, SessionStore};
use super::token::{TokenError, TokenSigner};
use super::user::{User, ADMIN_ROLE};
use super::{AuthService, AuthUser, IssuedToken};
use crate::config::{AuthSettings, Settings};
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCESS};
use crate::storage::{self, Collection, Storage};
use crate::validation::{self, ValidationError};

/// Id given to the account created during setup
const INITIAL_USER_ID: u64 = 1;

pub struct AuthManager<S> {
    storage: S,
    sessions: SessionStore<S>,
    signer: TokenSigner,
    settings: AuthSettings,
    requirements: PasswordRequirements,
    hash_params: Params,
}

impl<S: Storage + Clone> AuthManager<S> {
    pub fn new(
        storage: S,
        signer: TokenSigner,
        settings: AuthSettings,
        requirements: PasswordRequirements,
    ) -> anyhow::Result<Self> {
        let hash_params = password::hash_params(settings.password_hash_log_n)?;
        Ok(Self {
            sessions: SessionStore::new(storage.clone()),
            storage,
            signer,
            settings,
            requirements,
            hash_params,
        })
    }

    /// Build a manager from settings, loading or creating the signing
    /// secret inside the storage root.
    pub fn from_settings(storage: S, settings: &Settings) -> anyhow::Result<Self> {
        let signer =
            TokenSigner::load_or_create(settings.auth.jwt_secret.as_deref(), storage.root())?;
        Self::new(
            storage,
            signer,
            settings.auth.clone(),
            settings.password_requirements.clone(),
        )
    }

    async fn users(&self) -> Result<Vec<User>, AppError> {
        storage::load(&self.storage, Collection::Users).await
    }

    async fn save_users(&self, users: &[User]) -> Result<(), AppError> {
        storage::save(&self.storage, Collection::Users, users).await
    }

    async fn hash(&self, plain: &str) -> Result<String, AppError> {
        let mut plain = plain.to_string();
        let params = self.hash_params;
        tokio::task::spawn_blocking(move || password::hash_password_secure(&mut plain, params))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
            .map_err(AppError::from)
    }

    async fn verify(&self, hash: &str, plain: &str) -> Result<bool, AppError> {
        let hash = hash.to_string();
        let plain = zeroize::Zeroizing::new(plain.to_string());
        tokio::task::spawn_blocking(move || password::verify_password(&hash, &plain))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
    }

    fn check_password_policy(&self, password: &str) -> Result<(), AppError> {
        if !password::validate_password_strength(password, &self.requirements) {
            return Err(AppError::InvalidInput(self.requirements.describe()));
        }
        Ok(())
    }

    /// Drop a session while reporting the reason the token was refused
    async fn reject(&self, token: &str, reason: &str) -> AppError {
        if let Err(err) = self.sessions.remove(token).await {
            tracing::error!(error = %err, "failed to remove rejected session");
        }
        AppError::Auth(reason.to_string())
    }
}

fn token_prefix(token: &str) -> &str {
    token.get(..10).unwrap_or(token)
}

#[async_trait]
impl<S: Storage + Clone + 'static> AuthService for AuthManager<S> {
    async fn is_initialized(&self) -> Result<bool, AppError> {
        Ok(!self.users().await?.is_empty())
    }

    async fn create_initial_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AppError> {
        let _guard = self.storage.lock(Collection::Users).await;
        if !self.users().await?.is_empty() {
            return Err(AppError::AlreadyInitialized);
        }

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                ValidationError::MissingAccountFields.to_string(),
            ));
        }
        validation::validate_username(username)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        validation::validate_account_email(email)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        self.check_password_policy(password)?;

        let user = User {
            id: INITIAL_USER_ID,
            username: username.to_string(),
            password: self.hash(password).await?,
            role: ADMIN_ROLE.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
            last_login: None,
            is_active: true,
        };
        self.save_users(std::slice::from_ref(&user)).await?;

        tracing::info!(username, email, "initial admin account created");
        Ok(user.profile())
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<IssuedToken, AppError> {
        let _guard = self.storage.lock(Collection::Users).await;
        let mut users = self.users().await?;

        let Some(idx) = users
            .iter()
            .position(|u| u.username == username && u.is_active)
        else {
            tracing::warn!(username, "login failed: unknown user");
            counter!(LOGIN_FAILED).increment(1);
            return Err(AppError::InvalidCredentials);
        };

        if !self.verify(&users[idx].password, password).await? {
            tracing::warn!(username, "login failed: wrong password");
            counter!(LOGIN_FAILED).increment(1);
            return Err(AppError::InvalidCredentials);
        }

        let ttl = if remember_me {
            self.settings.remember_me_ttl()
        } else {
            self.settings.token_ttl()
        };
        let user = &mut users[idx];
        let claims = self
            .signer
            .claims_for(user.id, &user.username, &user.role, ttl);
        let token = self
            .signer
            .issue(&claims)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let now = Utc::now();
        user.last_login = Some(now);
        let profile = user.profile();
        let session = SessionRecord {
            token: token.clone(),
            user_id: user.id,
            username: user.username.clone(),
            login_time: now,
            expires_at: DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or(now),
            remember_me,
        };
        self.save_users(&users).await?;
        self.sessions.replace_for_user(session).await?;

        counter!(LOGIN_SUCCESS).increment(1);
        tracing::info!(username, remember_me, "user logged in");
        Ok(IssuedToken {
            token,
            user: profile,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<AuthUser, AppError> {
        let claims = match self.signer.verify(token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return Err(self.reject(token, "Token expired").await),
            Err(err) => {
                tracing::debug!(error = %err, "token rejected");
                return Err(AppError::Auth("Invalid token".to_string()));
            },
        };

        let Some(session) = self.sessions.find(token).await? else {
            return Err(AppError::Auth("Session not found".to_string()));
        };
        if session.is_expired(Utc::now()) {
            return Err(self.reject(token, "Session expired").await);
        }

        let users = self.users().await?;
        match users
            .iter()
            .find(|u| u.id == claims.user_id && u.is_active)
        {
            Some(user) => Ok(AuthUser::from(user)),
            None => Err(self.reject(token, "User not found or disabled").await),
        }
    }

    async fn logout(&self, token: &str) -> Result<(), AppError> {
        self.sessions.remove(token).await?;
        tracing::info!(token = %format!("{}...", token_prefix(token)), "user logged out");
        Ok(())
    }

    async fn change_password(
        &self,
        user_id: u64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let _guard = self.storage.lock(Collection::Users).await;
        let mut users = self.users().await?;
        let Some(idx) = users.iter().position(|u| u.id == user_id) else {
            return Err(AppError::NotFound("User not found".to_string()));
        };

        if !self.verify(&users[idx].password, old_password).await? {
            return Err(AppError::InvalidInput(
                "Current password is incorrect".to_string(),
            ));
        }
        self.check_password_policy(new_password)?;

        users[idx].password = self.hash(new_password).await?;
        self.save_users(&users).await?;
        let cleared = self.sessions.clear_user(user_id).await?;

        tracing::info!(
            user_id,
            username = %users[idx].username,
            sessions_cleared = cleared,
            "password changed"
        );
        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> Result<usize, AppError> {
        self.sessions.cleanup_expired().await
    }

    async fn session_stats(&self) -> Result<SessionStats, AppError> {
        self.sessions.stats().await
    }
}

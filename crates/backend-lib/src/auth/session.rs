// ============================
// backend-lib/src/auth/session.rs
// ============================
//! Server-side session list.
//!
//! Tokens carry their own expiry; the session file exists so that logout
//! and password changes can revoke a token before it expires.
use chrono::{DateTime, Utc};
use dingfeng_common::SessionStats;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};
use crate::storage::{self, Collection, Storage};

/// One issued token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub token: String,
    pub user_id: u64,
    pub username: String,
    pub login_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub remember_me: bool,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Session persistence over the `sessions.json` collection
#[derive(Clone)]
pub struct SessionStore<S> {
    storage: S,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn all(&self) -> Result<Vec<SessionRecord>, AppError> {
        storage::load(&self.storage, Collection::Sessions).await
    }

    pub async fn find(&self, token: &str) -> Result<Option<SessionRecord>, AppError> {
        Ok(self.all().await?.into_iter().find(|s| s.token == token))
    }

    /// Replace every session of the user with `session`
    pub async fn replace_for_user(&self, session: SessionRecord) -> Result<(), AppError> {
        let _guard = self.storage.lock(Collection::Sessions).await;
        let mut sessions = self.all().await?;
        sessions.retain(|s| s.user_id != session.user_id);
        sessions.push(session);
        self.persist(&sessions).await?;
        counter!(SESSION_CREATED).increment(1);
        Ok(())
    }

    /// Remove one session. Returns whether it existed.
    pub async fn remove(&self, token: &str) -> Result<bool, AppError> {
        let _guard = self.storage.lock(Collection::Sessions).await;
        let mut sessions = self.all().await?;
        let before = sessions.len();
        sessions.retain(|s| s.token != token);
        if sessions.len() == before {
            return Ok(false);
        }
        self.persist(&sessions).await?;
        Ok(true)
    }

    /// Remove every session of a user, returning how many were dropped
    pub async fn clear_user(&self, user_id: u64) -> Result<usize, AppError> {
        let _guard = self.storage.lock(Collection::Sessions).await;
        let mut sessions = self.all().await?;
        let before = sessions.len();
        sessions.retain(|s| s.user_id != user_id);
        let removed = before - sessions.len();
        if removed > 0 {
            self.persist(&sessions).await?;
        }
        Ok(removed)
    }

    /// Drop sessions whose `expiresAt` has passed
    pub async fn cleanup_expired(&self) -> Result<usize, AppError> {
        let _guard = self.storage.lock(Collection::Sessions).await;
        let mut sessions = self.all().await?;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|s| !s.is_expired(now));
        let removed = before - sessions.len();
        if removed > 0 {
            self.persist(&sessions).await?;
            counter!(SESSION_EXPIRED).increment(removed as u64);
            tracing::info!(
                total = before,
                active = sessions.len(),
                removed,
                "cleaned up expired sessions"
            );
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<SessionStats, AppError> {
        let sessions = self.all().await?;
        let now = Utc::now();
        let active = sessions.iter().filter(|s| !s.is_expired(now)).count();
        Ok(SessionStats {
            total: sessions.len(),
            active,
            expired: sessions.len() - active,
        })
    }

    async fn persist(&self, sessions: &[SessionRecord]) -> Result<(), AppError> {
        storage::save(&self.storage, Collection::Sessions, sessions).await?;
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        Ok(())
    }
}

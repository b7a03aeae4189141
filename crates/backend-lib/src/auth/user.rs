// ============================
// backend-lib/src/auth/user.rs
// ============================
//! Admin account model.
use chrono::{DateTime, Utc};
use dingfeng_common::UserProfile;
use serde::{Deserialize, Serialize};

/// Role given to the account created during setup
pub const ADMIN_ROLE: &str = "admin";

/// A stored account. `password` holds a PHC-format hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            role: self.role.clone(),
            email: self.email.clone(),
            created_at: Some(self.created_at.to_rfc3339()),
            last_login: self.last_login.map(|t| t.to_rfc3339()),
        }
    }
}

/// Identity attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: u64,
    pub username: String,
    pub role: String,
    pub email: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            role: self.role.clone(),
            email: self.email.clone(),
            created_at: None,
            last_login: None,
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
            email: user.email.clone(),
        }
    }
}

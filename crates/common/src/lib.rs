// ================
// common/src/lib.rs
// ================
//! Request and response bodies shared between the admin backend
//! and its browser client.
//!
//! Field names are camelCase on the wire because the admin pages were
//! written against that shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored registration or contact. Form fields vary between page
/// versions, so records stay schemaless.
pub type Record = Map<String, Value>;

/// Body of `POST /api/setup`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SetupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /api/login`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Body of `POST /api/change-password`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Public view of an admin account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub role: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

/// Reply to a successful login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

/// Reply to `POST /api/verify-token`. Invalid tokens are reported in the
/// body rather than through the status code.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Generic acknowledgement
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Reply to `GET /api/check-initialization`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InitializationStatus {
    pub success: bool,
    pub initialized: bool,
}

/// Reply to a public form submission
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// Body of the batch delete endpoints
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub ids: Vec<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchDeleteResponse {
    pub deleted: usize,
    pub message: String,
}

/// Reply to a single-record delete
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub data: Record,
}

/// Body of the import endpoints. `data` is kept as a raw value so that a
/// non-array payload can be rejected with a readable message.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ImportRequest {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub replace: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
    pub total: usize,
    pub message: String,
}

/// Query string of `GET /api/search`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub course: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Query string of `GET /api/export`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub status: Option<String>,
    pub course: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// One page of search results
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub pending: usize,
    pub completed: usize,
    pub cancelled: usize,
}

/// Reply to `GET /api/stats`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStats {
    pub total: usize,
    pub today: usize,
    pub this_week: usize,
    pub this_month: usize,
    pub pending: usize,
    pub completed: usize,
    pub by_status: StatusBreakdown,
    pub by_course: std::collections::BTreeMap<String, usize>,
    pub by_country: std::collections::BTreeMap<String, usize>,
}

/// One day of `GET /api/trends`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    pub date: String,
    pub count: usize,
    pub label: String,
}

/// Session counters reported on `/metrics`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

/// One entry of `GET /api/backups`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackupInfo {
    pub timestamp: String,
    pub date: String,
    pub size: String,
    pub path: String,
}

/// Result of creating or restoring a backup
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BackupOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    pub files_count: usize,
}

// ============================
// crates/backend-lib/src/handlers/system.rs
// ============================
//! Health, metrics and backup endpoints.
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use dingfeng_common::{BackupInfo, BackupOutcome, SessionStats};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::metrics::{HealthReport, MetricsSnapshot};
use crate::storage::Storage;
use crate::{error::AppError, AppState};

pub async fn health<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthReport>) {
    let report = state.monitor.health();
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub performance: MetricsSnapshot,
    pub sessions: SessionStats,
}

pub async fn metrics<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<MetricsResponse>, AppError> {
    Ok(Json(MetricsResponse {
        performance: state.monitor.snapshot(),
        sessions: state.auth.session_stats().await?,
    }))
}

#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: BackupOutcome,
}

pub async fn create_backup<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BackupResponse>, AppError> {
    let outcome = state.backups.create().await?;
    tracing::info!(username = %user.username, files = outcome.files_count, "manual backup");
    Ok(Json(BackupResponse {
        success: true,
        message: "Backup created".to_string(),
        outcome,
    }))
}

pub async fn list_backups<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<BackupInfo>>, AppError> {
    Ok(Json(state.backups.list().await?))
}

pub async fn restore_backup<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Path(name): Path<String>,
) -> Result<Json<BackupResponse>, AppError> {
    let outcome = state.backups.restore(&name).await?;
    tracing::warn!(username = %user.username, backup = %name, "backup restored");
    Ok(Json(BackupResponse {
        success: true,
        message: format!("Restored backup {name}"),
        outcome,
    }))
}

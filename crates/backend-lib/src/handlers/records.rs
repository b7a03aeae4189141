// ============================
// crates/backend-lib/src/handlers/records.rs
// ============================
//! Admin endpoints over registrations and contacts.
//!
//! The CRUD handlers are shared by both collections; the router attaches
//! the [`RecordKind`] as a request extension.
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use dingfeng_common::{
    BatchDeleteRequest, BatchDeleteResponse, DeleteResponse, ExportQuery, ImportRequest,
    ImportResponse, Page, Record, RegistrationStats, SearchQuery, TrendPoint,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::records::{RecordKind, DEFAULT_TREND_DAYS};
use crate::storage::Storage;
use crate::{error::AppError, AppState};

pub async fn list_records<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<RecordKind>,
) -> Result<Json<Vec<Record>>, AppError> {
    Ok(Json(state.records.list(kind).await?))
}

pub async fn get_record<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<RecordKind>,
    Path(id): Path<String>,
) -> Result<Json<Record>, AppError> {
    Ok(Json(state.records.get(kind, &id).await?))
}

pub async fn create_record<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<RecordKind>,
    Json(body): Json<Record>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let record = state.records.create(kind, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<RecordKind>,
    Path(id): Path<String>,
    Json(body): Json<Record>,
) -> Result<Json<Record>, AppError> {
    Ok(Json(state.records.update(kind, &id, body).await?))
}

pub async fn delete_record<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<RecordKind>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let data = state.records.delete(kind, &id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Deleted".to_string(),
        data,
    }))
}

/// Serves both `POST .../batch-delete` and `DELETE` on the collection
pub async fn batch_delete_records<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<RecordKind>,
    Json(req): Json<BatchDeleteRequest>,
) -> Result<Json<BatchDeleteResponse>, AppError> {
    let deleted = state.records.batch_delete(kind, &req.ids).await?;
    Ok(Json(BatchDeleteResponse {
        deleted,
        message: format!("Deleted {deleted} records"),
    }))
}

pub async fn search<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<Record>>, AppError> {
    Ok(Json(state.records.search(&query).await?))
}

pub async fn courses<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.records.courses().await?))
}

pub async fn stats<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<RegistrationStats>, AppError> {
    Ok(Json(state.records.stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub days: Option<u32>,
}

pub async fn trends<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<Vec<TrendPoint>>, AppError> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS);
    Ok(Json(state.records.trends(days).await?))
}

/// Filtered registrations as a downloadable JSON file
pub async fn export<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let records = state.records.export(&query).await?;
    tracing::info!(username = %user.username, count = records.len(), "registrations exported");

    let disposition = format!(
        "attachment; filename=\"registrations_{}.json\"",
        Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(records),
    )
        .into_response())
}

async fn import<S: Storage + Clone + 'static>(
    state: &AppState<S>,
    kind: RecordKind,
    user: &AuthUser,
    req: ImportRequest,
) -> Result<Json<ImportResponse>, AppError> {
    let (imported, total) = state.records.import(kind, &req.data, req.replace).await?;
    tracing::info!(username = %user.username, kind = kind.label(), imported, "import finished");
    Ok(Json(ImportResponse {
        success: true,
        imported,
        total,
        message: format!("Imported {imported} {} records", kind.label()),
    }))
}

pub async fn import_registrations<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    import(&state, RecordKind::Registration, &user, req).await
}

pub async fn import_contacts<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    import(&state, RecordKind::Contact, &user, req).await
}

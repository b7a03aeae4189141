// ============================
// crates/backend-lib/src/handlers/submissions.rs
// ============================
//! Public form endpoints.
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use dingfeng_common::{Record, SubmissionResponse};
use metrics::counter;

use crate::metrics::FORM_SUBMITTED;
use crate::middleware::client_ip;
use crate::records::RecordKind;
use crate::storage::Storage;
use crate::{error::AppError, AppState};

pub async fn submit_registration<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(form): Json<Record>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let id = state
        .records
        .submit(RecordKind::Registration, form, &client_ip(&headers))
        .await?;
    counter!(FORM_SUBMITTED, "kind" => "registration").increment(1);

    Ok(Json(SubmissionResponse {
        success: true,
        message: "Registration submitted".to_string(),
        id: Some(id),
    }))
}

pub async fn submit_contact<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(form): Json<Record>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let id = state
        .records
        .submit(RecordKind::Contact, form, &client_ip(&headers))
        .await?;
    counter!(FORM_SUBMITTED, "kind" => "contact").increment(1);

    Ok(Json(SubmissionResponse {
        success: true,
        message: "Thank you, we will contact you soon".to_string(),
        id: Some(id),
    }))
}

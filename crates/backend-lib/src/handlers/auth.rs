// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Setup, login and session endpoints.
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Extension, Json};
use dingfeng_common::{
    ChangePasswordRequest, InitializationStatus, LoginRequest, LoginResponse, MessageResponse,
    SetupRequest, VerifyResponse,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::middleware::{bearer_token, client_ip};
use crate::storage::Storage;
use crate::{error::AppError, AppState};

pub async fn check_initialization<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<InitializationStatus>, AppError> {
    let initialized = state.auth.is_initialized().await?;
    Ok(Json(InitializationStatus {
        success: true,
        initialized,
    }))
}

/// Create the first admin account
pub async fn setup<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<SetupRequest>,
) -> Result<Json<Value>, AppError> {
    let ip = client_ip(&headers);
    let user = state
        .auth
        .create_initial_user(req.username.trim(), req.email.trim(), &req.password)
        .await
        .inspect_err(|err| {
            tracing::warn!(username = %req.username, ip = %ip, reason = %err.sanitized_message(), "setup failed");
        })?;

    tracing::info!(username = %user.username, ip = %ip, "system initialized");
    Ok(Json(json!({
        "success": true,
        "message": "System initialized, please log in",
        "user": user,
    })))
}

pub async fn login<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Username and password are required".to_string(),
        ));
    }

    let client = client_ip(&headers);
    if !state.auth_rate_limiter.check_rate_limit(&client) {
        tracing::warn!(client = %client, username = %req.username, "login refused while locked out");
        return Err(AppError::AuthRateLimited);
    }

    match state
        .auth
        .login(&req.username, &req.password, req.remember_me)
        .await
    {
        Ok(issued) => {
            state.auth_rate_limiter.record_success(&client);
            Ok(Json(LoginResponse {
                success: true,
                token: issued.token,
                user: issued.user,
            }))
        },
        Err(AppError::InvalidCredentials) => {
            state.auth_rate_limiter.record_failed_attempt(&client);
            Err(AppError::InvalidCredentials)
        },
        Err(err) => Err(err),
    }
}

/// Report whether the bearer token is still usable. An unusable token is
/// a 200 with `success: false`; only a missing header is a 401.
pub async fn verify_token<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Auth("Invalid token format".to_string()))?;

    let response = match state.auth.verify_token(token).await {
        Ok(user) => VerifyResponse {
            success: true,
            user: Some(user.profile()),
            message: None,
        },
        Err(AppError::Auth(reason)) => VerifyResponse {
            success: false,
            user: None,
            message: Some(reason),
        },
        Err(err) => return Err(err),
    };
    Ok(Json(response))
}

pub async fn logout<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some(token) = bearer_token(&headers) {
        state.auth.logout(token).await?;
    }
    tracing::info!(username = %user.username, ip = %client_ip(&headers), "user logged out");
    Ok(Json(MessageResponse::ok("Logged out")))
}

pub async fn change_password<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(AppError::InvalidInput(
            "Old and new password are required".to_string(),
        ));
    }

    state
        .auth
        .change_password(user.id, &req.old_password, &req.new_password)
        .await
        .inspect_err(|err| {
            tracing::warn!(username = %user.username, reason = %err.sanitized_message(), "password change failed");
        })?;

    tracing::info!(username = %user.username, "password changed");
    Ok(Json(MessageResponse::ok(
        "Password changed, please log in again",
    )))
}

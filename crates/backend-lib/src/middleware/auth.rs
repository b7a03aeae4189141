// ============================
// crates/backend-lib/src/middleware/auth.rs
// ============================
//! Bearer-token guard for the admin API.
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::AuthUser;
use crate::storage::Storage;
use crate::{error::AppError, AppState};

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reject requests without a valid token. The resolved [`AuthUser`] is
/// stored in the request extensions.
pub async fn require_auth<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Auth("Access token missing".to_string()))?;
    let user = state.auth.verify_token(token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Only let admins through. Must run inside [`require_auth`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let is_admin = match request.extensions().get::<AuthUser>() {
        Some(user) => {
            if !user.is_admin() {
                tracing::warn!(username = %user.username, path = %request.uri().path(), "admin route refused");
            }
            user.is_admin()
        },
        None => return Err(AppError::Auth("Access token missing".to_string())),
    };

    if !is_admin {
        return Err(AppError::Forbidden("admin role required".to_string()));
    }
    Ok(next.run(request).await)
}

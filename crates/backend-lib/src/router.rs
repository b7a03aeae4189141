// ============================
// crates/backend-lib/src/router.rs
// ============================
//! Route table and middleware stack.
use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{auth, records, submissions, system};
use crate::middleware::{form_rate_limit, rate_limit, require_admin, require_auth, track_requests};
use crate::records::RecordKind;
use crate::storage::Storage;
use crate::AppState;

/// CRUD routes for one record collection under `base`
fn record_routes<S: Storage + Clone + 'static>(
    base: &str,
    kind: RecordKind,
) -> Router<Arc<AppState<S>>> {
    Router::new()
        .route(
            base,
            get(records::list_records::<S>)
                .post(records::create_record::<S>)
                .delete(records::batch_delete_records::<S>),
        )
        .route(
            &format!("{base}/batch-delete"),
            post(records::batch_delete_records::<S>),
        )
        .route(
            &format!("{base}/{{id}}"),
            get(records::get_record::<S>)
                .put(records::update_record::<S>)
                .delete(records::delete_record::<S>),
        )
        .layer(Extension(kind))
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            },
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Build the full application router
pub fn create_router<S: Storage + Clone + 'static>(state: Arc<AppState<S>>) -> Router {
    let public = Router::new()
        .route("/health", get(system::health::<S>))
        .route("/api/check-initialization", get(auth::check_initialization::<S>))
        .route("/api/setup", post(auth::setup::<S>))
        .route("/api/login", post(auth::login::<S>))
        .route("/api/verify-token", post(auth::verify_token::<S>));

    let forms = Router::new()
        .route("/submit-registration", post(submissions::submit_registration::<S>))
        .route("/api/contact", post(submissions::submit_contact::<S>))
        .route_layer(from_fn_with_state(state.clone(), form_rate_limit::<S>));

    let admin_only = Router::new()
        .route("/api/backup", post(system::create_backup::<S>))
        .route("/api/backups", get(system::list_backups::<S>))
        .route("/api/backups/{name}/restore", post(system::restore_backup::<S>))
        .route_layer(from_fn(require_admin));

    let authenticated = Router::new()
        .route("/api/logout", post(auth::logout::<S>))
        .route("/api/change-password", post(auth::change_password::<S>))
        .route("/api/search", get(records::search::<S>))
        .route("/api/courses", get(records::courses::<S>))
        .route("/api/stats", get(records::stats::<S>))
        .route("/api/trends", get(records::trends::<S>))
        .route("/api/export", get(records::export::<S>))
        .route("/api/import-registrations", post(records::import_registrations::<S>))
        .route("/api/import-contacts", post(records::import_contacts::<S>))
        .route("/metrics", get(system::metrics::<S>))
        .merge(record_routes::<S>("/api/registrations", RecordKind::Registration))
        .merge(record_routes::<S>("/api/contacts", RecordKind::Contact))
        .merge(admin_only)
        .route_layer(from_fn_with_state(state.clone(), require_auth::<S>));

    let mut router = Router::new()
        .merge(public)
        .merge(forms)
        .merge(authenticated);

    if let Some(dir) = &state.settings.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    let mut router = router
        .layer(from_fn_with_state(state.clone(), rate_limit::<S>))
        .layer(from_fn_with_state(state.clone(), track_requests::<S>))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.settings.cors_origins) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

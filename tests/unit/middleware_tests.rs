// ==============================
// tests/unit/middleware_tests.rs
// ==============================
//! Rate limits and the auth guard as wired into the router
use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::test_utils::{login_admin, send, setup_test_env, setup_with};

fn contact_form() -> serde_json::Value {
    json!({ "name": "Li Lei", "phone": "13800138000", "message": "Call me" })
}

#[tokio::test]
async fn test_global_rate_limit() {
    let (_state, app, _dir) = setup_with(|s| s.rate_limit.max_requests = 3);

    for _ in 0..3 {
        let (status, _) = send(&app, Method::GET, "/api/check-initialization", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app, Method::GET, "/api/check-initialization", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_001");
}

#[tokio::test]
async fn test_form_rate_limit() {
    let (_state, app, _dir) = setup_test_env();

    // Five submissions per window by default
    for _ in 0..5 {
        let (status, _) = send(&app, Method::POST, "/api/contact", None, Some(contact_form())).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(&app, Method::POST, "/api/contact", None, Some(contact_form())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // The form limit does not spill over to other routes
    let (status, _) = send(&app, Method::GET, "/api/check-initialization", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let (_state, app, _dir) = setup_test_env();

    for uri in ["/api/registrations", "/api/stats", "/metrics", "/api/backups"] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["success"], false);
    }

    let (status, body) = send(&app, Method::GET, "/api/stats", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_monitor_counts_requests() {
    let (state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;

    send(&app, Method::GET, "/api/registrations/missing", Some(&token), None).await;
    let snapshot = state.monitor.snapshot();
    // setup, login, the 404
    assert_eq!(snapshot.requests.total, 3);
    assert_eq!(snapshot.requests.error, 1);
}

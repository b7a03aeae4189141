// =================================
// tests/integration/auth_flow_tests.rs
// =================================
//! Setup, login, token checks and password changes over HTTP
use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::test_utils::{
    login_admin, send, setup_test_env, setup_with, ADMIN_EMAIL, ADMIN_PASSWORD, ADMIN_USERNAME,
};

#[tokio::test]
async fn test_setup_only_once() {
    let (_state, app, _dir) = setup_test_env();

    let (status, body) = send(&app, Method::GET, "/api/check-initialization", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["initialized"], false);

    // Weak password
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/setup",
        None,
        Some(json!({ "username": "admin", "email": ADMIN_EMAIL, "password": "password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Bad username
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/setup",
        None,
        Some(json!({ "username": "a!", "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let _token = login_admin(&app).await;

    let (_, body) = send(&app, Method::GET, "/api/check-initialization", None, None).await;
    assert_eq!(body["initialized"], true);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/setup",
        None,
        Some(json!({ "username": "other", "email": "o@example.com", "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SETUP_001");
}

#[tokio::test]
async fn test_login_and_verify() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;

    let (status, body) = send(&app, Method::POST, "/api/verify-token", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["username"], ADMIN_USERNAME);
    assert_eq!(body["user"]["role"], "admin");

    // Missing header
    let (status, _) = send(&app, Method::POST, "/api/verify-token", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Present but bad token is reported in the body
    let (status, body) = send(&app, Method::POST, "/api/verify-token", Some("a.b.c"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_login_failures() {
    let (_state, app, _dir) = setup_test_env();
    let _ = login_admin(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "username": ADMIN_USERNAME })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, wrong_password) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "username": ADMIN_USERNAME, "password": "Wrong!pass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown_user) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "username": "nobody", "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Same answer whether the user exists or not
    assert_eq!(wrong_password["message"], unknown_user["message"]);
}

#[tokio::test]
async fn test_login_lockout() {
    let (_state, app, _dir) = setup_with(|s| s.auth.login_max_attempts = 2);
    let _ = login_admin(&app).await;

    let bad = json!({ "username": ADMIN_USERNAME, "password": "Wrong!pass1" });
    for _ in 0..2 {
        let (status, _) = send(&app, Method::POST, "/api/login", None, Some(bad.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Locked out even with the right password
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "AUTH_003");
}

#[tokio::test]
async fn test_relogin_replaces_session() {
    let (_state, app, _dir) = setup_test_env();
    let first = login_admin(&app).await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD, "rememberMe": true })),
    )
    .await;
    let second = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/stats", Some(&first), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Session not found");

    let (status, _) = send(&app, Method::GET, "/api/stats", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;

    let (status, body) = send(&app, Method::POST, "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, Method::POST, "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = send(&app, Method::POST, "/api/verify-token", Some(&token), None).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_change_password() {
    let (state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/change-password",
        Some(&token),
        Some(json!({ "oldPassword": "Wrong!pass1", "newPassword": "N3w!passw0rd" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Current password is incorrect");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/change-password",
        Some(&token),
        Some(json!({ "oldPassword": ADMIN_PASSWORD, "newPassword": "weak" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/change-password",
        Some(&token),
        Some(json!({ "oldPassword": ADMIN_PASSWORD, "newPassword": "N3w!passw0rd" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Every session of the user is gone
    let (status, _) = send(&app, Method::GET, "/api/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.auth.session_stats().await.unwrap().total, 0);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "username": ADMIN_USERNAME, "password": "N3w!passw0rd" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (_state, app, _dir) = setup_test_env();

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let token = login_admin(&app).await;
    let (status, body) = send(&app, Method::GET, "/metrics", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"]["active"], 1);
    assert!(body["requests"]["total"].as_u64().unwrap() >= 3);
    assert!(body["responseTimes"].get("p95").is_some());
}

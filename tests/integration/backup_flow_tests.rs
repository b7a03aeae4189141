// ====================================
// tests/integration/backup_flow_tests.rs
// ====================================
//! Admin-only backup endpoints
use axum::http::{Method, StatusCode};
use backend_lib::storage::{Collection, Storage};
use serde_json::{json, Value};

use crate::test_utils::{login_admin, send, setup_test_env};

#[tokio::test]
async fn test_backup_and_restore() {
    let (state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;
    let token = Some(token.as_str());

    let (status, _) = send(&app, Method::POST, "/api/registrations", token, Some(json!({ "name": "Keep" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, "/api/backup", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["filesCount"], 1);

    let (status, backups) = send(&app, Method::GET, "/api/backups", token, None).await;
    assert_eq!(status, StatusCode::OK);
    let name = backups[0]["timestamp"].as_str().unwrap().to_string();

    state
        .storage
        .write_collection(Collection::Registrations, &[])
        .await
        .unwrap();

    let (status, _) = send(&app, Method::POST, &format!("/api/backups/{name}/restore"), token, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = send(&app, Method::GET, "/api/registrations", token, None).await;
    assert_eq!(list[0]["name"], "Keep");

    let (status, _) = send(&app, Method::POST, "/api/backups/..%2Fdata/restore", token, None).await;
    assert!(status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_backup_needs_admin_role() {
    let (state, app, _dir) = setup_test_env();
    let _ = login_admin(&app).await;

    // Demote the admin on disk; the token resolves against the current record
    let mut users = state.storage.read_collection(Collection::Users).await.unwrap();
    users[0]["role"] = Value::from("editor");
    state
        .storage
        .write_collection(Collection::Users, &users)
        .await
        .unwrap();

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "username": "admin", "password": crate::test_utils::ADMIN_PASSWORD })),
    )
    .await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::POST, "/api/backup", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_004");

    // Non-admin routes still work
    let (status, _) = send(&app, Method::GET, "/api/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

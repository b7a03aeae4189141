// ====================================
// tests/integration/records_flow_tests.rs
// ====================================
//! Public submissions and the admin record API
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::test_utils::{login_admin, send, setup_test_env};

fn registration(name: &str, phone: &str, course: &str) -> Value {
    json!({
        "name": name,
        "phone": phone,
        "email": "lead@example.com",
        "course": course,
        "target_country": "UK",
    })
}

#[tokio::test]
async fn test_submit_registration_is_sanitized() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/submit-registration",
        None,
        Some(json!({
            "name": "  <b>Han Meimei</b> ",
            "phone": "13912345678",
            "course": "IELTS",
            "id": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let id = body["id"].as_u64().unwrap();
    assert!(id > 1);

    let (status, list) = send(&app, Method::GET, "/api/registrations", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let stored = &list[0];
    assert_eq!(stored["id"].as_u64(), Some(id));
    assert_eq!(stored["name"], "&lt;b&gt;Han Meimei&lt;&#x2F;b&gt;");
    assert_eq!(stored["ip"], "203.0.113.7");
    assert!(stored["submitTime"].is_string());
}

#[tokio::test]
async fn test_submit_rejects_invalid_forms() {
    let (_state, app, _dir) = setup_test_env();

    let (status, body) = send(
        &app,
        Method::POST,
        "/submit-registration",
        None,
        Some(json!({ "name": "A", "phone": "12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/contact",
        None,
        Some(json!({ "name": "Li Lei", "phone": "13800138000", "message": "x".repeat(501) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0], "Message cannot exceed 500 characters");
}

#[tokio::test]
async fn test_registration_crud() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;
    let token = Some(token.as_str());

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/registrations",
        token,
        Some(registration("Zhang San", "13700000000", "A-Level")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert!(created["timestamp"].is_string());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, Method::GET, &format!("/api/registrations/{id}"), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Zhang San");

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/registrations/{id}"),
        token,
        Some(json!({ "status": "completed", "remarks": "called back" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["name"], "Zhang San");
    assert!(updated["updatedAt"].is_string());

    let (status, deleted) = send(&app, Method::DELETE, &format!("/api/registrations/{id}"), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["data"]["name"], "Zhang San");

    let (status, _) = send(&app, Method::GET, &format!("/api/registrations/{id}"), token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/registrations/{id}"), token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_delete_both_routes() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;
    let token = Some(token.as_str());

    let mut ids = Vec::new();
    for name in ["One", "Two", "Three"] {
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/contacts",
            token,
            Some(json!({ "name": name, "phone": "13800138000" })),
        )
        .await;
        ids.push(created["id"].clone());
    }

    let (status, _) = send(&app, Method::POST, "/api/contacts/batch-delete", token, Some(json!({ "ids": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/contacts/batch-delete",
        token,
        Some(json!({ "ids": [ids[0], "no-such-id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/contacts",
        token,
        Some(json!({ "ids": [ids[1], ids[2]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);

    let (_, list) = send(&app, Method::GET, "/api/contacts", token, None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_contacts_are_normalized() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/import-contacts",
        Some(&token),
        Some(json!({
            "data": [{ "id": 5, "name": "Old", "phone": "13800138000", "subject": "Visa",
                       "timestamp": "2024-01-01T00:00:00.000Z" }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = send(&app, Method::GET, "/api/contacts", Some(&token), None).await;
    let contact = &list[0];
    assert_eq!(contact["message"], "Visa");
    assert_eq!(contact["type"], "contact");
    assert_eq!(contact["submitTime"], "2024-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn test_search_courses_and_stats() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;
    let token = Some(token.as_str());

    for (name, phone, course) in [
        ("Wang Wu", "13600000001", "IELTS"),
        ("Zhao Liu", "13600000002", "TOEFL"),
        ("Wang Qi", "13600000003", "IELTS"),
    ] {
        let (status, _) = send(&app, Method::POST, "/api/registrations", token, Some(registration(name, phone, course))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&app, Method::GET, "/api/search?q=wang&limit=1", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);

    let (_, page) = send(&app, Method::GET, "/api/search?q=0002", token, None).await;
    assert_eq!(page["total"], 1);
    let (_, page) = send(&app, Method::GET, "/api/search?course=IELTS&status=pending", token, None).await;
    assert_eq!(page["total"], 2);
    let (_, page) = send(&app, Method::GET, "/api/search?status=completed", token, None).await;
    assert_eq!(page["total"], 0);

    let (_, courses) = send(&app, Method::GET, "/api/courses", token, None).await;
    assert_eq!(courses, json!(["IELTS", "TOEFL"]));

    let (status, stats) = send(&app, Method::GET, "/api/stats", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["today"], 3);
    assert_eq!(stats["pending"], 3);
    assert_eq!(stats["byCourse"]["IELTS"], 2);
    assert_eq!(stats["byCountry"]["UK"], 3);

    let (_, trends) = send(&app, Method::GET, "/api/trends?days=3", token, None).await;
    let trends = trends.as_array().unwrap();
    assert_eq!(trends.len(), 3);
    assert_eq!(trends[2]["count"], 3);
    assert_eq!(trends[0]["count"], 0);
}

#[tokio::test]
async fn test_export_and_import() {
    let (_state, app, _dir) = setup_test_env();
    let token = login_admin(&app).await;
    let token = Some(token.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/import-registrations",
        token,
        Some(json!({
            "data": [
                { "name": "A", "course": "IELTS", "timestamp": "2024-03-01T10:00:00.000Z" },
                { "name": "B", "course": "TOEFL", "timestamp": "2024-03-05T10:00:00.000Z", "status": "completed" },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], 2);
    assert_eq!(body["total"], 2);

    let (status, _) = send(&app, Method::POST, "/api/import-registrations", token, Some(json!({ "data": {} }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, exported) = send(
        &app,
        Method::GET,
        "/api/export?dateFrom=2024-03-01&dateTo=2024-03-01",
        token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported.as_array().unwrap().len(), 1);
    assert_eq!(exported[0]["name"], "A");

    let (_, exported) = send(&app, Method::GET, "/api/export?status=completed", token, None).await;
    assert_eq!(exported[0]["name"], "B");

    let (status, _) = send(&app, Method::GET, "/api/export?dateFrom=yesterday", token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Replace drops what was there
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/import-registrations",
        token,
        Some(json!({ "data": [{ "name": "C" }], "replace": true })),
    )
    .await;
    assert_eq!(body["total"], 1);
}

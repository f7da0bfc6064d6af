//! Authorization gates and the audit surface over HTTP.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{read_json, TestApp};
use orgkit_auth::models::PermissionKey;
use serde_json::json;

async fn get_authed(app: &TestApp, path: &str, access: &str) -> axum::http::Response<Body> {
    app.request(
        Request::builder()
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_audit_search_requires_permission() {
    let app = TestApp::spawn();
    let auditor = app.seed_principal("auditor", "correct-horse-battery").await;
    app.seed_role(&auditor, "auditor", &[PermissionKey::AuditView])
        .await;
    app.seed_principal("plain", "correct-horse-battery").await;

    let (auditor_token, _) = app.login("auditor", "correct-horse-battery").await;
    let (plain_token, _) = app.login("plain", "correct-horse-battery").await;

    let response = get_authed(&app, "/audit", &auditor_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_authed(&app, "/audit", &plain_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    // The denial names no permission key
    assert_eq!(body["error"], "Permission denied");

    // No token at all: 401, not 403
    let response = app
        .request(Request::builder().uri("/audit").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logins_appear_in_audit_log() {
    let app = TestApp::spawn();
    let auditor = app.seed_principal("auditor", "correct-horse-battery").await;
    app.seed_role(&auditor, "auditor", &[PermissionKey::AuditView])
        .await;

    let (token, _) = app.login("auditor", "correct-horse-battery").await;

    let response = get_authed(&app, "/audit?action=login", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["entries"][0]["action"], "login");
    assert_eq!(body["entries"][0]["entity_type"], "principal");
}

#[tokio::test]
async fn test_entity_and_user_views() {
    let app = TestApp::spawn();
    let auditor = app.seed_principal("auditor", "correct-horse-battery").await;
    app.seed_role(&auditor, "auditor", &[PermissionKey::AuditView])
        .await;
    app.seed_principal("other", "correct-horse-battery").await;

    let (token, _) = app.login("auditor", "correct-horse-battery").await;
    app.login("other", "correct-horse-battery").await;

    let path = format!("/audit/user/{}", auditor.id);
    let response = get_authed(&app, &path, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["actor_principal_id"], json!(auditor.id));

    let path = format!("/audit/entity/principal/{}", auditor.id);
    let response = get_authed(&app, &path, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_role_management_end_to_end() {
    let app = TestApp::spawn();
    let admin = app.seed_principal("admin", "correct-horse-battery").await;
    app.seed_role(&admin, "admin", &[PermissionKey::RolesManage])
        .await;
    let member = app.seed_principal("member", "correct-horse-battery").await;

    let (admin_token, _) = app.login("admin", "correct-horse-battery").await;
    let (member_token, _) = app.login("member", "correct-horse-battery").await;

    // Create a role over the API
    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/roles")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
                .body(Body::from(
                    json!({
                        "name": "treasurer",
                        "permission_keys": ["finances.view", "finances.edit"]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let role = read_json(response).await;

    // Assign it to the member
    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/assignments")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
                .body(Body::from(
                    json!({
                        "principal_id": member.id,
                        "role_id": role["role_id"]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = get_authed(&app, "/me/permissions", &member_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body["permission_keys"],
        json!(["finances.edit", "finances.view"])
    );
}

#[tokio::test]
async fn test_unknown_permission_key_is_rejected() {
    let app = TestApp::spawn();
    let admin = app.seed_principal("admin", "correct-horse-battery").await;
    app.seed_role(&admin, "admin", &[PermissionKey::RolesManage])
        .await;
    let (token, _) = app.login("admin", "correct-horse-battery").await;

    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/roles")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(
                    json!({
                        "name": "bogus",
                        "permission_keys": ["finances.transmute"]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_management_needs_roles_manage() {
    let app = TestApp::spawn();
    app.seed_principal("plain", "correct-horse-battery").await;
    let (token, _) = app.login("plain", "correct-horse-battery").await;

    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/roles")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(
                    json!({ "name": "x", "permission_keys": [] }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

//! End-to-end login, status, and logout behavior.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{read_json, refresh_cookie_value, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::spawn();

    let response = app
        .post_json(
            "/auth/register",
            json!({ "identifier": "jdoe", "secret": "correct-horse-battery" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let (access, refresh) = app.login("jdoe", "correct-horse-battery").await;
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
}

#[tokio::test]
async fn test_login_sets_hardened_cookie() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;

    let response = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "jdoe", "secret": "correct-horse-battery" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("orgkit_refresh="))
        .expect("no refresh cookie set")
        .to_string();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/auth"));
}

#[tokio::test]
async fn test_unknown_user_and_wrong_secret_get_identical_responses() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;

    let unknown = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "ghost", "secret": "whatever" }),
        )
        .await;
    let wrong = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "jdoe", "secret": "wrong-secret" }),
        )
        .await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown_body = read_json(unknown).await;
    let wrong_body = read_json(wrong).await;
    assert_eq!(unknown_body, wrong_body);
}

#[tokio::test]
async fn test_status_reflects_token_validity() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;
    let (access, _) = app.login("jdoe", "correct-horse-battery").await;

    let response = app
        .request(
            Request::builder()
                .uri("/auth/status")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["identifier"], "jdoe");

    // Garbage token: still 200, just unauthenticated
    let response = app
        .request(
            Request::builder()
                .uri("/auth/status")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_logout_is_idempotent_and_clears_cookie() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;
    let (_, refresh) = app.login("jdoe", "correct-horse-battery").await;

    for _ in 0..2 {
        let response = app
            .request(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(
                        header::COOKIE,
                        format!("orgkit_refresh={refresh}"),
                    )
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        // The replacement cookie is emptied out
        assert!(refresh_cookie_value(&response).is_none());
    }

    // Even with no token at all, logout succeeds
    let response = app.post_json("/auth/logout", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_csrf_tokens_are_random() {
    let app = TestApp::spawn();

    let first = read_json(
        app.request(
            Request::builder()
                .uri("/auth/csrf")
                .body(Body::empty())
                .unwrap(),
        )
        .await,
    )
    .await;
    let second = read_json(
        app.request(
            Request::builder()
                .uri("/auth/csrf")
                .body(Body::empty())
                .unwrap(),
        )
        .await,
    )
    .await;

    let a = first["csrf_token"].as_str().unwrap();
    let b = second["csrf_token"].as_str().unwrap();
    assert_eq!(a.len(), 64);
    assert_ne!(a, b);

    // Client configuration rides along with the token
    assert_eq!(first["cookie_name"], "orgkit_refresh");
    assert_eq!(first["access_token_expiry_seconds"], 900);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::spawn();

    let body = json!({ "identifier": "jdoe", "secret": "correct-horse-battery" });
    let response = app.post_json("/auth/register", body.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.post_json("/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_validation_rejects_short_secret() {
    let app = TestApp::spawn();

    let response = app
        .post_json(
            "/auth/register",
            json!({ "identifier": "jdoe", "secret": "short" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

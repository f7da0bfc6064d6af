//! Refresh rotation, reuse detection, and cookie precedence over HTTP.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{read_json, refresh_cookie_value, TestApp};
use serde_json::json;

async fn refresh_with_cookie(app: &TestApp, refresh: &str) -> axum::http::Response<Body> {
    app.request(
        Request::builder()
            .method("POST")
            .uri("/auth/refresh")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("orgkit_refresh={refresh}"))
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_refresh_rotates_cookie_token() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;
    let (_, refresh) = app.login("jdoe", "correct-horse-battery").await;

    let response = refresh_with_cookie(&app, &refresh).await;
    assert_eq!(response.status(), StatusCode::OK);

    let rotated = refresh_cookie_value(&response).expect("refresh set no cookie");
    assert_ne!(rotated, refresh);

    let body = read_json(response).await;
    assert!(body["access_token"].as_str().is_some());

    // The rotated token keeps working
    let response = refresh_with_cookie(&app, &rotated).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reuse_revokes_whole_family() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;
    let (_, first) = app.login("jdoe", "correct-horse-battery").await;

    let response = refresh_with_cookie(&app, &first).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = refresh_cookie_value(&response).unwrap();

    // Replaying the rotated token kills the lineage
    let response = refresh_with_cookie(&app, &first).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = refresh_with_cookie(&app, &second).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_body_token_accepted_without_cookie() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;
    let (_, refresh) = app.login("jdoe", "correct-horse-battery").await;

    let response = app
        .post_json("/auth/refresh", json!({ "refresh_token": refresh }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cookie_wins_over_body() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;
    let (_, refresh) = app.login("jdoe", "correct-horse-battery").await;

    // A garbage body token must not shadow the valid cookie
    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/auth/refresh")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("orgkit_refresh={refresh}"))
                .body(Body::from(
                    json!({ "refresh_token": "stale-garbage" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_remember_session_keeps_long_cookie_after_rotation() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;

    let response = app
        .post_json(
            "/auth/login",
            json!({
                "identifier": "jdoe",
                "secret": "correct-horse-battery",
                "remember": true
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refresh = refresh_cookie_value(&response).unwrap();

    // 30 days, not the 7-day default
    let response = refresh_with_cookie(&app, &refresh).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("orgkit_refresh="))
        .unwrap();
    assert!(cookie.contains("Max-Age=2592000"), "cookie was: {cookie}");

    // The rotated token itself still refreshes
    let rotated = refresh_cookie_value(&response).unwrap();
    let response = refresh_with_cookie(&app, &rotated).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::spawn();

    let response = app.post_json("/auth/refresh", json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logged_out_token_cannot_refresh() {
    let app = TestApp::spawn();
    app.seed_principal("jdoe", "correct-horse-battery").await;
    let (_, refresh) = app.login("jdoe", "correct-horse-battery").await;

    let response = app
        .post_json("/auth/logout", json!({ "refresh_token": refresh }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = refresh_with_cookie(&app, &refresh).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

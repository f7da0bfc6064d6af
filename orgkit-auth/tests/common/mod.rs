//! Shared harness: the full router over in-memory stores.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use orgkit_auth::{
    build_router,
    config::{
        AuthConfig, CookieConfig, DatabaseConfig, Environment, JwtConfig, RateLimitConfig,
        SecurityConfig,
    },
    models::{PermissionKey, Principal, Role},
    stores::{
        DirectoryStore, InMemoryAuditStore, InMemoryDirectoryStore, InMemoryRateLimitStore,
        InMemoryTokenStore,
    },
    utils::{hash_secret, Secret},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: orgkit_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "orgkit-auth".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "warn".to_string(),
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: "test-secret-key-0123456789abcdef0123456789abcdef".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
            refresh_token_remember_days: 30,
        },
        cookie: CookieConfig {
            name: "orgkit_refresh".to_string(),
            secure: false,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 5,
            login_window_seconds: 300,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub directory: Arc<InMemoryDirectoryStore>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let directory = Arc::new(InMemoryDirectoryStore::new());
        let state = AppState::new(
            config,
            directory.clone(),
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(InMemoryAuditStore::new()),
            Arc::new(InMemoryRateLimitStore::new()),
            None,
        )
        .expect("failed to build app state");

        TestApp {
            router: build_router(state.clone()),
            state,
            directory,
        }
    }

    /// Seed a principal with a hashed secret.
    pub async fn seed_principal(&self, identifier: &str, secret: &str) -> Principal {
        let hash = hash_secret(&Secret::new(secret.to_string())).unwrap();
        let principal = Principal::new(identifier, hash.into_string());
        self.directory.insert_principal(&principal).await.unwrap();
        principal
    }

    /// Seed a role and bind the principal to it.
    pub async fn seed_role(
        &self,
        principal: &Principal,
        name: &str,
        permissions: &[PermissionKey],
    ) -> Role {
        let role = Role::new(name, None);
        let keys: Vec<String> = permissions
            .iter()
            .map(|p| p.as_key().to_string())
            .collect();
        self.directory.insert_role(&role, &keys).await.unwrap();
        self.directory
            .assign_role(principal.id, role.id)
            .await
            .unwrap();
        role
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Login and return (access token, refresh cookie value).
    pub async fn login(&self, identifier: &str, secret: &str) -> (String, String) {
        let response = self
            .post_json(
                "/auth/login",
                serde_json::json!({ "identifier": identifier, "secret": secret }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = refresh_cookie_value(&response).expect("login set no refresh cookie");
        let body = read_json(response).await;
        let access = body["access_token"].as_str().unwrap().to_string();
        (access, cookie)
    }
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pull the refresh token out of the Set-Cookie headers.
pub fn refresh_cookie_value(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("orgkit_refresh="))
        .and_then(|v| v.split(';').next())
        .and_then(|v| v.split('=').nth(1))
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty())
}

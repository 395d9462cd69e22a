//! Test helper module for identity-service integration tests.
//!
//! Builds the full router over the in-memory store and drives it with
//! `tower::ServiceExt::oneshot`, so no listener or database is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, HashingConfig, IdentityConfig, SecurityConfig,
        SessionConfig, StoreBackend,
    },
    models::NewAccount,
    store::{IdentityStore, MemoryStore},
    utils::Password,
    AppState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_USERNAME: &str = "root";
pub const ADMIN_PASSWORD: &str = "root-secret";

pub fn test_config(revoke_on_password_change: bool) -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_seconds: 5,
        },
        session: SessionConfig {
            ttl_minutes: 60,
            revoke_on_password_change,
            cookie_secure: false,
            cleanup_interval_seconds: 60,
        },
        // Cheap hashes keep the suite fast; verification cost is not under test.
        hashing: HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

/// Test application wired over a fresh in-memory store.
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_password_change_revocation(false)
    }

    pub fn with_password_change_revocation(revoke: bool) -> Self {
        service_core::observability::init_test_tracing();
        identity_service::services::metrics::init_metrics();

        let store: Arc<dyn IdentityStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(test_config(revoke), store).expect("Failed to build state");
        let router = build_router(state.clone());

        Self { state, router }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Create an account directly through the credential store.
    pub async fn create_account(&self, username: &str, password: &str, is_admin: bool) -> Uuid {
        self.state
            .credentials
            .create_account(NewAccount {
                username: username.to_string(),
                email: format!("{}@x.com", username),
                password: Password::new(password),
                is_admin,
                is_active: true,
                group_ids: Vec::new(),
            })
            .await
            .expect("Failed to create account")
            .account_id
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post(
                "/auth/login",
                None,
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.text);
        response.body["token"]
            .as_str()
            .expect("token missing from login response")
            .to_string()
    }

    /// Seed an administrator and return a logged-in token for it.
    pub async fn admin_token(&self) -> String {
        self.create_account(ADMIN_USERNAME, ADMIN_PASSWORD, true).await;
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    pub async fn create_group(&self, token: &str, name: &str) -> Uuid {
        let response = self
            .post(
                "/api/groups",
                Some(token),
                serde_json::json!({ "name": name, "description": format!("{} group", name) }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        parse_id(&response.body["group_id"])
    }
}

pub fn parse_id(value: &Value) -> Uuid {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("expected a UUID string")
}

//! Login, logout and session resolution through the HTTP surface.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn login_returns_token_and_cookie() {
    // Arrange
    let app = TestApp::spawn();
    app.create_account("alice", "secret1", false).await;

    // Act
    let response = app
        .post(
            "/auth/login",
            None,
            json!({ "username": "alice", "password": "secret1" }),
        )
        .await;

    // Assert
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["account"]["username"], "alice");
    assert_eq!(response.body["account"]["is_admin"], false);

    let token = response.body["token"].as_str().unwrap();
    let cookie = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cookie.starts_with(&format!("session={}", token)));
    assert!(cookie.contains("HttpOnly"));
    assert!(!response.text.contains("secret1"));
}

#[tokio::test]
async fn session_cookie_authenticates_requests() {
    let app = TestApp::spawn();
    app.create_account("alice", "secret1", false).await;
    let token = app.login("alice", "secret1").await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/auth/me")
        .header(header::COOKIE, format!("session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "alice");
}

#[tokio::test]
async fn unknown_user_and_wrong_password_are_indistinguishable() {
    let app = TestApp::spawn();
    app.create_account("alice", "secret1", false).await;

    let unknown = app
        .post(
            "/auth/login",
            None,
            json!({ "username": "mallory", "password": "secret1" }),
        )
        .await;
    let wrong = app
        .post(
            "/auth/login",
            None,
            json!({ "username": "alice", "password": "secret2" }),
        )
        .await;

    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body, wrong.body);
}

#[tokio::test]
async fn inactive_account_with_correct_password_is_forbidden() {
    let app = TestApp::spawn();
    let admin = app.admin_token().await;
    let alice = app.create_account("alice", "secret1", false).await;

    let response = app
        .post(&format!("/api/users/{}/deactivate", alice), Some(&admin), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["is_active"], false);

    let response = app
        .post(
            "/auth/login",
            None,
            json!({ "username": "alice", "password": "secret1" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "Account is inactive");
}

#[tokio::test]
async fn empty_credentials_are_rejected_before_lookup() {
    let app = TestApp::spawn();

    let response = app
        .post("/auth/login", None, json!({ "username": "", "password": "" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.post("/auth/login", None, json!({ "username": "alice" })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_ends_session() {
    let app = TestApp::spawn();
    app.create_account("alice", "secret1", false).await;
    let token = app.login("alice", "secret1").await;

    assert_eq!(app.get("/auth/me", Some(&token)).await.status, StatusCode::OK);

    let response = app.post("/auth/logout", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    let cleared = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cleared.starts_with("session="));

    assert_eq!(
        app.get("/auth/me", Some(&token)).await.status,
        StatusCode::UNAUTHORIZED
    );

    // Logging out again, or anonymously, is not an error.
    assert_eq!(
        app.post("/auth/logout", Some(&token), json!({})).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.post("/auth/logout", None, json!({})).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn admin_flag_is_snapshotted_at_login() {
    // Arrange
    let app = TestApp::spawn();
    let admin = app.admin_token().await;
    let alice = app.create_account("alice", "secret1", false).await;
    let alice_token = app.login("alice", "secret1").await;

    // Act: promote alice while her session is live
    let response = app
        .post(&format!("/api/users/{}/make-admin", alice), Some(&admin), json!({}))
        .await;
    assert_eq!(response.body["is_admin"], true);

    // Assert: the old session still carries the old snapshot
    let me = app.get("/auth/me", Some(&alice_token)).await;
    assert_eq!(me.body["is_admin"], false);
    assert_eq!(
        app.get("/api/users", Some(&alice_token)).await.status,
        StatusCode::FORBIDDEN
    );

    // A fresh login picks up the promotion
    let fresh = app.login("alice", "secret1").await;
    assert_eq!(app.get("/auth/me", Some(&fresh)).await.body["is_admin"], true);
    assert_eq!(
        app.get("/api/users", Some(&fresh)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn demoted_admin_keeps_privileges_until_relogin() {
    let app = TestApp::spawn();
    let root = app.admin_token().await;
    let ops = app.create_account("ops", "ops-secret", true).await;
    let ops_token = app.login("ops", "ops-secret").await;

    app.post(&format!("/api/users/{}/remove-admin", ops), Some(&root), json!({}))
        .await;

    assert_eq!(
        app.get("/api/users", Some(&ops_token)).await.status,
        StatusCode::OK
    );

    let fresh = app.login("ops", "ops-secret").await;
    assert_eq!(
        app.get("/api/users", Some(&fresh)).await.status,
        StatusCode::FORBIDDEN
    );
}

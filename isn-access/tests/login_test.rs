mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_json, cookie_value, refresh_set_cookie, TestApp, TEST_PASSWORD};
use isn_access::{
    config::{Environment, RefreshTokenTransport},
    models::Role,
};

#[tokio::test]
async fn test_login_success_sets_refresh_cookie() {
    let app = TestApp::spawn().await;
    let account = app.seed_user("alice@example.com", Role::Member);

    let response = app.login("alice@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = refresh_set_cookie(&response).expect("refresh cookie missing");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/oauth"));
    assert!(set_cookie.contains("Max-Age=5184000"));
    assert!(!set_cookie.contains("Secure"));
    assert!(!cookie_value(&set_cookie).is_empty());

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 1800);
    assert_eq!(body["account_id"], account.account_id.to_string());
    assert_eq!(body["account_type"], "user");
    assert_eq!(body["role"], "member");
    assert!(body["access_token"].as_str().is_some());
    assert!(body.get("refresh_token").is_none());
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let app = TestApp::spawn().await;
    app.seed_user("alice@example.com", Role::Member);

    let response = app.login("Alice@Example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::spawn().await;
    app.seed_user("alice@example.com", Role::Member);

    let wrong_password = app.login("alice@example.com", "not the password").await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert!(refresh_set_cookie(&wrong_password).is_none());
    let wrong_password = body_json(wrong_password).await;

    let unknown_email = app.login("bob@example.com", TEST_PASSWORD).await;
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    let unknown_email = body_json(unknown_email).await;

    assert_eq!(wrong_password["error_code"], "authentication_error");
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn test_login_disabled_account_rejected() {
    let app = TestApp::spawn().await;
    let account = app.seed_user("alice@example.com", Role::Admin);
    app.store.set_account_active(account.account_id, false).unwrap();

    let response = app.login("alice@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "authentication_error");
}

#[tokio::test]
async fn test_login_malformed_body() {
    let app = TestApp::spawn().await;

    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"email\": "))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "malformed_body");
}

#[tokio::test]
async fn test_login_invalid_email_rejected() {
    let app = TestApp::spawn().await;

    let response = app.login("not-an-email", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_login_header_transport_returns_refresh_token_in_body() {
    let app = TestApp::spawn_with(Environment::Test, RefreshTokenTransport::Header).await;
    app.seed_user("alice@example.com", Role::Member);

    let response = app.login("alice@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(refresh_set_cookie(&response).is_none());

    let body = body_json(response).await;
    assert!(body["refresh_token"].as_str().is_some());
}

#[tokio::test]
async fn test_login_in_production_sets_secure_cookie() {
    let app = TestApp::spawn_with(Environment::Prod, RefreshTokenTransport::Cookie).await;
    app.seed_user("alice@example.com", Role::Member);

    let response = app.login("alice@example.com", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = refresh_set_cookie(&response).expect("refresh cookie missing");
    assert!(set_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_repeated_logins_leave_one_live_session() {
    let app = TestApp::spawn().await;
    let account = app.seed_user("alice@example.com", Role::Member);

    let first = app.login("alice@example.com", TEST_PASSWORD).await;
    let first_token = cookie_value(&refresh_set_cookie(&first).unwrap());
    let second = app.login("alice@example.com", TEST_PASSWORD).await;
    assert_eq!(second.status(), StatusCode::OK);

    assert_eq!(
        app.store
            .live_refresh_token_count(account.account_id, chrono::Utc::now())
            .unwrap(),
        1
    );

    let response = app.refresh_with_cookie(&first_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "refresh_token_invalid");
}

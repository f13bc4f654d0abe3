//! Test helper module for isn-access integration tests.
//!
//! Builds the full router over an in-memory store and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use isn_access::{
    build_router,
    config::{
        AccessConfig, DatabaseConfig, Environment, JwtConfig, RefreshTokenTransport,
        SecurityConfig,
    },
    models::{Account, ClientSecret, Isn, IsnGrant, Permission, Role, ServiceAccount, User, Visibility},
    services::{AccessStore, MemoryStore},
    utils::{hash_opaque_token, hash_password, Password},
    AppState,
};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET_KEY: &str = "integration-test-secret-key-0123456789abcdef";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

pub fn create_test_config(
    environment: Environment,
    transport: RefreshTokenTransport,
) -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config::default(),
        environment,
        service_name: "isn-access-test".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/isn_access_test".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 5,
        },
        jwt: JwtConfig {
            secret_key: TEST_SECRET_KEY.to_string(),
            issuer: "isn-access".to_string(),
            access_token_expiry_minutes: 30,
            refresh_token_expiry_days: 60,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            refresh_token_transport: transport,
        },
        request_timeout_seconds: 30,
    }
}

/// Router plus direct handles on its state and store for seeding.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(Environment::Test, RefreshTokenTransport::Cookie).await
    }

    pub async fn spawn_with(environment: Environment, transport: RefreshTokenTransport) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::spawn_over(store.clone(), store, environment, transport).await
    }

    /// Serve through `front` while seeding goes straight to `store`.
    pub async fn spawn_over(
        store: Arc<MemoryStore>,
        front: Arc<dyn AccessStore>,
        environment: Environment,
        transport: RefreshTokenTransport,
    ) -> Self {
        let state = AppState::new(create_test_config(environment, transport), front)
            .expect("Failed to build app state");
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router returned an error")
    }

    // ==================== Seeding ====================

    pub fn seed_user(&self, email: &str, role: Role) -> Account {
        let account = Account::new_user(role);
        let hash = hash_password(&Password::new(TEST_PASSWORD.to_string())).unwrap();
        self.store.insert_account(account.clone()).unwrap();
        self.store
            .insert_user(User::new(account.account_id, email.to_string(), hash.into_string()))
            .unwrap();
        account
    }

    pub fn seed_service_account(&self, client_id: &str, client_secret: &str) -> Account {
        let account = Account::new_service_account();
        self.store.insert_account(account.clone()).unwrap();
        self.store
            .insert_service_account(ServiceAccount::new(
                account.account_id,
                client_id.to_string(),
                "Test Org".to_string(),
                "ops@test.example".to_string(),
            ))
            .unwrap();
        self.store
            .insert_client_secret(ClientSecret::new(
                account.account_id,
                hash_opaque_token(client_secret),
                365,
            ))
            .unwrap();
        account
    }

    pub fn seed_isn(&self, slug: &str, owner_account_id: uuid::Uuid) {
        self.store
            .insert_isn(Isn::new(slug, owner_account_id, Visibility::Private))
            .unwrap();
    }

    pub fn grant(&self, account_id: uuid::Uuid, slug: &str, permission: Permission) {
        self.store
            .insert_grant(IsnGrant::new(account_id, slug, permission))
            .unwrap();
    }

    pub async fn access_token_for(&self, account_id: uuid::Uuid) -> String {
        self.state
            .tokens
            .create_access_token(account_id)
            .await
            .expect("Failed to issue access token")
            .access_token
    }

    // ==================== Requests ====================

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": email, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
    }

    pub async fn refresh_with_cookie(&self, refresh_token: &str) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri("/oauth/token?grant_type=refresh_token")
                .header(header::COOKIE, format!("refresh_token={}", refresh_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn client_credentials(&self, body: serde_json::Value) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri("/oauth/token?grant_type=client_credentials")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> Response {
        self.request(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_with_token(&self, uri: &str, token: &str) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// The `Set-Cookie` header for the refresh cookie, if any.
pub fn refresh_set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("refresh_token="))
        .map(str::to_string)
}

/// Value part of a `Set-Cookie` header.
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{request_id_middleware, REQUEST_ID_HEADER};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AccessConfig;
use crate::middleware::{
    access_token_auth, credential_type_auth, grant_type_auth, require_isn_permission,
    require_non_production, require_roles,
};
use crate::models::{Permission, Role};
use crate::services::{AccessStore, AuthService, JwtService, TokenService};
use service_core::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub store: Arc<dyn AccessStore>,
    pub tokens: TokenService,
    pub auth_service: AuthService,
}

impl AppState {
    pub fn new(config: AccessConfig, store: Arc<dyn AccessStore>) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;
        let tokens = TokenService::new(
            store.clone(),
            jwt,
            config.environment,
            config.jwt.refresh_token_expiry_days,
        );
        let auth_service = AuthService::new(store.clone());

        Ok(Self {
            config,
            store,
            tokens,
            auth_service,
        })
    }
}

const ISN_READERS: &[Permission] = &[Permission::Read, Permission::Write];
const SESSION_ADMINS: &[Role] = &[Role::Owner, Role::Admin];
const OWNERS: &[Role] = &[Role::Owner];

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Token endpoints authenticate with a client secret or refresh token
    let oauth_routes = Router::new()
        .route("/oauth/token", post(handlers::token))
        .route_layer(from_fn_with_state(state.clone(), grant_type_auth))
        .merge(
            Router::new()
                .route("/oauth/revoke", post(handlers::revoke))
                .route_layer(from_fn_with_state(state.clone(), credential_type_auth)),
        );

    let isn_routes = Router::new()
        .route(
            "/api/isn/:isn_slug/permissions",
            get(handlers::get_isn_permissions),
        )
        .route_layer(from_fn(|req: Request, next: Next| {
            require_isn_permission(ISN_READERS, req, next)
        }));

    let session_admin_routes = Router::new()
        .route(
            "/api/admin/accounts/:account_id/revoke-sessions",
            post(handlers::revoke_sessions),
        )
        .route_layer(from_fn(|req: Request, next: Next| {
            require_roles(SESSION_ADMINS, req, next)
        }));

    let reset_routes = Router::new()
        .route("/api/admin/reset", post(handlers::reset))
        .route_layer(from_fn_with_state(state.clone(), require_non_production))
        .route_layer(from_fn(|req: Request, next: Next| require_roles(OWNERS, req, next)));

    // Everything under /api requires an access token
    let api_routes = Router::new()
        .route("/api/accounts/me", get(handlers::get_me))
        .merge(isn_routes)
        .merge(session_admin_routes)
        .merge(reset_routes)
        .route_layer(from_fn_with_state(state.clone(), access_token_auth));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(handlers::login))
        .merge(oauth_routes)
        .merge(api_routes)
        .fallback(not_found)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        // Outside the trace layer so the span sees the request id
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_seconds,
        )));

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    // Explicit origins only, so the refresh cookie may be sent cross-origin
    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": state.config.environment.as_str(),
        "checks": {
            "store": "up"
        }
    })))
}

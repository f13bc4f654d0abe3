use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use http_body_util::{BodyExt, Limited};
use serde::Deserialize;
use service_core::error::AppError;

use crate::{
    config::RefreshTokenTransport,
    middleware::context::{attach_identity, Credential, Identity},
    models::AccountType,
    services::REFRESH_COOKIE_NAME,
    utils::hash_opaque_token,
    AppState,
};

/// Largest client-credentials body accepted.
const MAX_CREDENTIALS_BODY_BYTES: usize = 16 * 1024;

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Surrounding whitespace is
/// trimmed; anything else beyond a single token is rejected.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing Authorization header")))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Authorization header is not ASCII")))?
        .trim();

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Malformed Authorization header")))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Authorization scheme is not Bearer"
        )));
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Authorization header must carry a single token"
        )));
    }

    Ok(token)
}

// ==================== Strategies ====================

async fn authenticate_access_token(state: &AppState, req: &mut Request) -> Result<(), AppError> {
    let token = extract_bearer_token(req.headers())?;
    let claims = state.tokens.jwt().validate(token)?;

    let account_type = claims.account_type().map_err(|e| {
        tracing::error!(account_id = %claims.account_id, error = %e, "Unrecognised account type in claims");
        AppError::from(e)
    })?;

    attach_identity(
        req,
        Identity {
            account_id: claims.account_id,
            account_type: Some(account_type),
            credential: Credential::AccessToken(Box::new(claims)),
        },
    )
}

/// Raw refresh token for the configured transport, if the request carries one.
fn presented_refresh_token(state: &AppState, headers: &HeaderMap) -> Option<String> {
    match state.config.security.refresh_token_transport {
        RefreshTokenTransport::Cookie => CookieJar::from_headers(headers)
            .get(REFRESH_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty()),
        RefreshTokenTransport::Header => extract_bearer_token(headers).ok().map(str::to_string),
    }
}

async fn authenticate_refresh_token(state: &AppState, req: &mut Request) -> Result<(), AppError> {
    let token = presented_refresh_token(state, req.headers()).ok_or(AppError::RefreshTokenInvalid)?;
    let hashed_token = hash_opaque_token(&token);

    let record = state.tokens.find_refresh_token(&hashed_token).await.map_err(|e| {
        tracing::warn!("Refresh token rejected");
        AppError::from(e)
    })?;

    attach_identity(
        req,
        Identity {
            account_id: record.account_id,
            account_type: None,
            credential: Credential::RefreshToken { hashed_token },
        },
    )
}

#[derive(Debug, Deserialize)]
struct ClientCredentials {
    client_id: Option<String>,
    client_secret: Option<String>,
}

async fn authenticate_client_credentials(
    state: &AppState,
    req: Request,
) -> Result<Request, AppError> {
    let (parts, body) = req.into_parts();

    let bytes = Limited::new(body, MAX_CREDENTIALS_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| AppError::MalformedBody(format!("Could not read request body: {}", e)))?
        .to_bytes();

    let credentials: ClientCredentials = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::MalformedBody(format!("Could not parse JSON body: {}", e)))?;

    let (client_id, client_secret) = match (credentials.client_id, credentials.client_secret) {
        (Some(id), Some(secret)) if !id.trim().is_empty() && !secret.is_empty() => (id, secret),
        _ => {
            return Err(AppError::BadRequest(
                "client_id and client_secret are required".to_string(),
            ))
        }
    };

    let account = state
        .auth_service
        .authenticate_client(client_id.trim(), &client_secret)
        .await?;

    let mut req = Request::from_parts(parts, Body::from(bytes));
    attach_identity(
        &mut req,
        Identity {
            account_id: account.account_id,
            account_type: Some(AccountType::ServiceAccount),
            credential: Credential::ClientSecret {
                hashed_secret: hash_opaque_token(&client_secret),
            },
        },
    )?;

    Ok(req)
}

// ==================== Middleware ====================

/// Require a valid access token.
pub async fn access_token_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_access_token(&state, &mut req).await?;
    Ok(next.run(req).await)
}

/// Require a live refresh token.
pub async fn refresh_token_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_refresh_token(&state, &mut req).await?;
    Ok(next.run(req).await)
}

/// Require a valid client id and secret in the JSON body.
pub async fn client_credentials_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let req = authenticate_client_credentials(&state, req).await?;
    Ok(next.run(req).await)
}

/// Supported values of the `grant_type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    ClientCredentials,
    RefreshToken,
}

impl std::str::FromStr for GrantType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "refresh_token" => Ok(GrantType::RefreshToken),
            other => Err(AppError::UnsupportedGrantType(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GrantTypeParams {
    grant_type: Option<String>,
}

/// Parse the `grant_type` selector from the query string.
pub fn grant_type_from(req: &Request) -> Result<GrantType, AppError> {
    let Query(params) = Query::<GrantTypeParams>::try_from_uri(req.uri())
        .map_err(|e| AppError::BadRequest(format!("Invalid query string: {}", e.body_text())))?;

    params
        .grant_type
        .ok_or_else(|| AppError::BadRequest("grant_type is required".to_string()))?
        .parse()
}

/// Select the client-credentials or refresh-token strategy by `grant_type`.
pub async fn grant_type_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let req = match grant_type_from(&req)? {
        GrantType::ClientCredentials => authenticate_client_credentials(&state, req).await?,
        GrantType::RefreshToken => {
            authenticate_refresh_token(&state, &mut req).await?;
            req
        }
    };
    Ok(next.run(req).await)
}

/// Use the refresh-token strategy when a refresh credential is present,
/// otherwise the client-credentials strategy.
pub async fn credential_type_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let req = if presented_refresh_token(&state, req.headers()).is_some() {
        authenticate_refresh_token(&state, &mut req).await?;
        req
    } else {
        authenticate_client_credentials(&state, req).await?
    };
    Ok(next.run(req).await)
}

use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    config::RefreshTokenTransport,
    dtos::auth::{RevokeResponse, TokenResponse},
    middleware::{AuthIdentity, Credential},
    AppState,
};

/// Token endpoint. Runs behind the grant-type dispatcher, which has already
/// authenticated the caller by client secret or refresh token.
pub async fn token(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    match identity.credential {
        Credential::ClientSecret { .. } => {
            let issued = state.tokens.create_access_token(identity.account_id).await?;
            Ok((
                jar,
                Json(TokenResponse {
                    access_token: issued.access_token,
                    token_type: issued.token_type,
                    expires_in: issued.expires_in,
                    refresh_token: None,
                }),
            ))
        }
        Credential::RefreshToken { hashed_token } => {
            // The presented token may have been revoked since the auth layer
            // saw it, so nothing is issued until it is spent.
            let refresh_token = state
                .tokens
                .exchange_refresh_token(identity.account_id, &hashed_token)
                .await?;
            let issued = state.tokens.create_access_token(identity.account_id).await?;

            let (jar, refresh_token) = match state.config.security.refresh_token_transport {
                RefreshTokenTransport::Cookie => {
                    (jar.add(state.tokens.build_refresh_cookie(refresh_token)), None)
                }
                RefreshTokenTransport::Header => (jar, Some(refresh_token)),
            };

            Ok((
                jar,
                Json(TokenResponse {
                    access_token: issued.access_token,
                    token_type: issued.token_type,
                    expires_in: issued.expires_in,
                    refresh_token,
                }),
            ))
        }
        Credential::AccessToken(_) => {
            tracing::error!("Token endpoint reached with an access token identity");
            Err(AppError::InternalError(anyhow::anyhow!(
                "Token endpoint is missing its grant-type layer"
            )))
        }
    }
}

/// Revoke the credential the request was authenticated with: a refresh
/// token (logout) or a client secret.
pub async fn revoke(
    State(state): State<AppState>,
    AuthIdentity(identity): AuthIdentity,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RevokeResponse>), AppError> {
    match identity.credential {
        Credential::RefreshToken { hashed_token } => {
            let revoked = state.tokens.revoke_refresh_token(&hashed_token).await?;
            tracing::info!(account_id = %identity.account_id, "Refresh token revoked");
            Ok((
                jar.add(state.tokens.clear_refresh_cookie()),
                Json(RevokeResponse { revoked }),
            ))
        }
        Credential::ClientSecret { hashed_secret } => {
            let revoked = state.auth_service.revoke_client_secret(&hashed_secret).await?;
            tracing::info!(account_id = %identity.account_id, "Client secret revoked");
            Ok((jar, Json(RevokeResponse { revoked })))
        }
        Credential::AccessToken(_) => {
            tracing::error!("Revoke endpoint reached with an access token identity");
            Err(AppError::InternalError(anyhow::anyhow!(
                "Revoke endpoint is missing its credential-type layer"
            )))
        }
    }
}

use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    config::RefreshTokenTransport,
    dtos::auth::{LoginRequest, LoginResponse},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let account = state
        .auth_service
        .login(&req.email, &Password::new(req.password))
        .await?;

    let issued = state.tokens.create_access_token(account.account_id).await?;
    let refresh_token = state.tokens.rotate_refresh_token(account.account_id).await?;

    let (jar, refresh_token) = match state.config.security.refresh_token_transport {
        RefreshTokenTransport::Cookie => (jar.add(state.tokens.build_refresh_cookie(refresh_token)), None),
        RefreshTokenTransport::Header => (jar, Some(refresh_token)),
    };

    Ok((
        jar,
        Json(LoginResponse {
            access_token: issued.access_token,
            token_type: issued.token_type,
            expires_in: issued.expires_in,
            account_id: account.account_id,
            account_type: issued.claims.account_type,
            role: issued.claims.role,
            refresh_token,
        }),
    ))
}

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::admin::{ResetResponse, RevokeSessionsResponse},
    middleware::AccessClaims,
    AppState,
};

/// Revoke every refresh token of an account, forcing it to log in again
/// once its current access token lapses.
pub async fn revoke_sessions(
    State(state): State<AppState>,
    AccessClaims(claims): AccessClaims,
    Path(account_id): Path<String>,
) -> Result<Json<RevokeSessionsResponse>, AppError> {
    let account_id = Uuid::parse_str(&account_id)
        .map_err(|_| AppError::BadRequest("account_id must be a UUID".to_string()))?;

    state
        .store
        .find_account(account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;

    let revoked = state.tokens.revoke_all_refresh_tokens(account_id).await?;

    tracing::info!(
        admin_account_id = %claims.account_id,
        account_id = %account_id,
        revoked = revoked,
        "Sessions revoked by administrator"
    );

    Ok(Json(RevokeSessionsResponse { account_id, revoked }))
}

/// Delete every refresh token. Only mounted behind the environment gate.
pub async fn reset(
    State(state): State<AppState>,
    AccessClaims(claims): AccessClaims,
) -> Result<Json<ResetResponse>, AppError> {
    let deleted = state.tokens.delete_all_refresh_tokens().await?;
    tracing::warn!(account_id = %claims.account_id, deleted = deleted, "Refresh token store reset");
    Ok(Json(ResetResponse { deleted }))
}

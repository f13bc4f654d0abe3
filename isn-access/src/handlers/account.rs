use axum::{extract::Path, Json};
use service_core::error::AppError;

use crate::{dtos::account::MeResponse, middleware::AccessClaims, services::IsnPermission};

/// The caller's identity and ISN permissions as carried in its access token.
pub async fn get_me(AccessClaims(claims): AccessClaims) -> Json<MeResponse> {
    Json(MeResponse {
        account_id: claims.account_id,
        account_type: claims.account_type,
        role: claims.role,
        isn_perms: claims.isn_perms,
        expires_at: claims.exp,
    })
}

/// The caller's permission entry for one ISN.
pub async fn get_isn_permissions(
    Path(isn_slug): Path<String>,
    AccessClaims(mut claims): AccessClaims,
) -> Result<Json<IsnPermission>, AppError> {
    claims
        .isn_perms
        .remove(&isn_slug)
        .map(Json)
        .ok_or_else(|| AppError::Forbidden(format!("No access to ISN '{}'", isn_slug)))
}

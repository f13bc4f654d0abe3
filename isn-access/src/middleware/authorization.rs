//! Authorization gates.
//!
//! Gates read the identity attached by the authentication layer and never
//! touch the store. Wire them with `from_fn` (or `from_fn_with_state` for the
//! environment gate) inside the authentication layer.

use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{
    config::Environment,
    middleware::context::claims_from,
    models::{Permission, Role},
    AppState,
};

/// Route parameter that names the ISN for [`require_isn_permission`].
pub const ISN_SLUG_PARAM: &str = "isn_slug";

/// Pass when the caller's role is in `allowed`.
pub async fn require_roles(
    allowed: &'static [Role],
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = claims_from(req.extensions())?;
    let role = claims.role().map_err(|e| {
        tracing::error!(account_id = %claims.account_id, "Unrecognised role in claims");
        AppError::from(e)
    })?;

    if !allowed.contains(&role) {
        tracing::warn!(
            account_id = %claims.account_id,
            role = %role,
            "Role not permitted"
        );
        return Err(AppError::Forbidden(
            "Account role does not permit this operation".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Pass when `isn_perms[<isn_slug>]` holds one of `allowed`. An ISN missing
/// from the claims is no access.
pub async fn require_isn_permission(
    allowed: &'static [Permission],
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map_err(|e| {
            tracing::error!(error = %e.body_text(), "ISN permission gate without path parameters");
            AppError::InternalError(anyhow::anyhow!("Route has no path parameters"))
        })?;
    let isn_slug = params
        .iter()
        .find(|(key, _)| *key == ISN_SLUG_PARAM)
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| {
            tracing::error!(param = ISN_SLUG_PARAM, "ISN permission gate on route without ISN slug");
            AppError::InternalError(anyhow::anyhow!(
                "Route is missing the {} parameter",
                ISN_SLUG_PARAM
            ))
        })?;

    let claims = claims_from(&parts.extensions)?;
    let granted = claims.isn_perms.get(&isn_slug).map(|p| p.permission);

    match granted {
        Some(permission) if allowed.contains(&permission) => {}
        _ => {
            tracing::warn!(
                account_id = %claims.account_id,
                isn_slug = %isn_slug,
                granted = ?granted,
                "ISN permission denied"
            );
            return Err(AppError::Forbidden(format!(
                "No {} access to ISN '{}'",
                allowed
                    .iter()
                    .map(Permission::as_str)
                    .collect::<Vec<_>>()
                    .join(" or "),
                isn_slug
            )));
        }
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Environments where destructive administrative routes are available.
const NON_PRODUCTION: &[Environment] = &[Environment::Dev, Environment::Test];

/// Pass only in a non-production environment.
pub async fn require_non_production(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !NON_PRODUCTION.contains(&state.config.environment) {
        tracing::warn!(
            environment = state.config.environment.as_str(),
            path = %req.uri().path(),
            "Environment gate rejected request"
        );
        return Err(AppError::Forbidden(
            "Operation not available in this environment".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

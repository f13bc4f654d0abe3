//! Request-scoped identity.
//!
//! Authentication middleware attaches exactly one [`Identity`] per request.
//! Once set it is never replaced or mutated; handlers and authorization gates
//! only read it.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, Extensions},
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::AccountType;
use crate::services::AccessTokenClaims;

/// Credential the request was authenticated with.
#[derive(Debug, Clone)]
pub enum Credential {
    AccessToken(Box<AccessTokenClaims>),
    /// Digest of the presented refresh token, kept for revocation.
    RefreshToken { hashed_token: String },
    /// Digest of the presented client secret, kept for revocation.
    ClientSecret { hashed_secret: String },
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub account_id: Uuid,
    /// Unknown when authenticated by refresh token, which only records the account id.
    pub account_type: Option<AccountType>,
    pub credential: Credential,
}

impl Identity {
    pub fn claims(&self) -> Option<&AccessTokenClaims> {
        match &self.credential {
            Credential::AccessToken(claims) => Some(claims.as_ref()),
            _ => None,
        }
    }
}

/// Attach the identity to the request. Fails if one is already present.
pub fn attach_identity(req: &mut Request, identity: Identity) -> Result<(), AppError> {
    if req.extensions().get::<Identity>().is_some() {
        tracing::error!(
            account_id = %identity.account_id,
            "Identity already attached to request"
        );
        return Err(AppError::InternalError(anyhow::anyhow!(
            "Identity already attached to request"
        )));
    }
    req.extensions_mut().insert(identity);
    Ok(())
}

/// Identity from the extensions, or an internal error when a route is
/// missing its authentication layer.
pub fn identity_from(extensions: &Extensions) -> Result<&Identity, AppError> {
    extensions.get::<Identity>().ok_or_else(|| {
        tracing::error!("Identity missing from request extensions");
        AppError::InternalError(anyhow::anyhow!(
            "Identity missing from request extensions"
        ))
    })
}

/// Access token claims from the extensions.
pub fn claims_from(extensions: &Extensions) -> Result<&AccessTokenClaims, AppError> {
    identity_from(extensions)?.claims().ok_or_else(|| {
        tracing::error!("Route requires an access token identity");
        AppError::InternalError(anyhow::anyhow!(
            "Access token claims missing from request extensions"
        ))
    })
}

/// Extractor for the authenticated identity
pub struct AuthIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AuthIdentity(identity_from(&parts.extensions)?.clone()))
    }
}

/// Extractor for the claims of an access-token identity
pub struct AccessClaims(pub AccessTokenClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AccessClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AccessClaims(claims_from(&parts.extensions)?.clone()))
    }
}

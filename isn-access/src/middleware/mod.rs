pub mod auth;
pub mod authorization;
pub mod context;

pub use auth::{
    access_token_auth, client_credentials_auth, credential_type_auth, extract_bearer_token,
    grant_type_auth, refresh_token_auth, GrantType,
};
pub use authorization::{require_isn_permission, require_non_production, require_roles};
pub use context::{AccessClaims, AuthIdentity, Credential, Identity};

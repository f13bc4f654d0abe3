//! Services layer for isn-access.
//!
//! Credential checks, permission resolution, token issuance and the
//! storage seam they share.

mod auth;
mod database;
pub mod error;
pub mod jwt;
pub mod permissions;
mod store;
pub mod tokens;

pub use auth::AuthService;
pub use database::Database;
pub use error::ServiceError;
pub use jwt::{AccessTokenClaims, JwtService};
pub use permissions::{resolve_isn_perms, IsnCatalog, IsnPermission, IsnPerms, PermissionResolver};
pub use store::{AccessStore, MemoryStore};
pub use tokens::{IssuedAccessToken, TokenService, REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH};

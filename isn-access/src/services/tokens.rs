//! Access token issuance and refresh token lifecycle.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Environment;
use crate::models::RefreshToken;
use crate::services::jwt::{AccessTokenClaims, JwtService};
use crate::services::permissions::PermissionResolver;
use crate::services::{AccessStore, ServiceError};
use crate::utils::{generate_secure_token, hash_opaque_token, OPAQUE_TOKEN_BYTES};

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
/// Browsers only send the refresh cookie to the token and revoke endpoints.
pub const REFRESH_COOKIE_PATH: &str = "/oauth";

/// A freshly signed access token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedAccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip)]
    pub claims: AccessTokenClaims,
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn AccessStore>,
    resolver: PermissionResolver,
    jwt: JwtService,
    environment: Environment,
    refresh_token_expiry_days: i64,
}

impl TokenService {
    pub fn new(
        store: Arc<dyn AccessStore>,
        jwt: JwtService,
        environment: Environment,
        refresh_token_expiry_days: i64,
    ) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone()),
            store,
            jwt,
            environment,
            refresh_token_expiry_days,
        }
    }

    /// Build and sign an access token for the account.
    ///
    /// Permissions are resolved at issuance and are not refreshed until the
    /// next token, so they can lag grant changes by up to one token lifetime.
    pub async fn create_access_token(
        &self,
        account_id: Uuid,
    ) -> Result<IssuedAccessToken, ServiceError> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        if !account.is_active {
            tracing::warn!(account_id = %account_id, "Token requested for disabled account");
            return Err(ServiceError::AccountDisabled);
        }

        let role = account.role().map_err(|e| {
            tracing::error!(account_id = %account_id, error = %e, "Unrecognised account role");
            ServiceError::DataIntegrity(e)
        })?;
        let account_type = account.account_type().map_err(|e| {
            tracing::error!(account_id = %account_id, error = %e, "Unrecognised account type");
            ServiceError::DataIntegrity(e)
        })?;

        let isn_perms = self.resolver.resolve(&account).await?;
        let (access_token, claims) = self.jwt.issue(account_id, account_type, role, isn_perms)?;

        tracing::info!(
            account_id = %account_id,
            account_type = %account_type,
            isn_count = claims.isn_perms.len(),
            "Access token issued"
        );

        Ok(IssuedAccessToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
            claims,
        })
    }

    /// Revoke every live refresh token for the account and store a new one.
    /// The plaintext is returned once and never persisted.
    pub async fn rotate_refresh_token(&self, account_id: Uuid) -> Result<String, ServiceError> {
        let token = generate_secure_token(OPAQUE_TOKEN_BYTES)?;
        let record = RefreshToken::new(
            account_id,
            hash_opaque_token(&token),
            self.refresh_token_expiry_days,
        );

        let revoked = self.store.rotate_refresh_token(&record).await?;

        tracing::info!(
            account_id = %account_id,
            revoked = revoked,
            "Refresh token rotated"
        );

        Ok(token)
    }

    /// Spend the presented refresh token and issue its successor.
    ///
    /// Fails with `RefreshTokenInvalid` when the presented token was revoked,
    /// rotated or expired after it was authenticated.
    pub async fn exchange_refresh_token(
        &self,
        account_id: Uuid,
        presented_hash: &str,
    ) -> Result<String, ServiceError> {
        let token = generate_secure_token(OPAQUE_TOKEN_BYTES)?;
        let record = RefreshToken::new(
            account_id,
            hash_opaque_token(&token),
            self.refresh_token_expiry_days,
        );

        let revoked = self
            .store
            .exchange_refresh_token(presented_hash, &record)
            .await
            .map_err(|e| {
                tracing::warn!(account_id = %account_id, error = %e, "Refresh token exchange refused");
                e
            })?;

        tracing::info!(
            account_id = %account_id,
            revoked = revoked,
            "Refresh token exchanged"
        );

        Ok(token)
    }

    /// Live refresh token for a digest, or `RefreshTokenInvalid`.
    pub async fn find_refresh_token(&self, hashed_token: &str) -> Result<RefreshToken, ServiceError> {
        self.store
            .find_valid_refresh_token(hashed_token, Utc::now())
            .await?
            .ok_or(ServiceError::RefreshTokenInvalid)
    }

    pub async fn revoke_refresh_token(&self, hashed_token: &str) -> Result<bool, ServiceError> {
        self.store.revoke_refresh_token(hashed_token).await
    }

    pub async fn revoke_all_refresh_tokens(&self, account_id: Uuid) -> Result<u64, ServiceError> {
        let revoked = self.store.revoke_all_refresh_tokens(account_id).await?;
        tracing::info!(account_id = %account_id, revoked = revoked, "Refresh tokens revoked");
        Ok(revoked)
    }

    pub async fn delete_all_refresh_tokens(&self) -> Result<u64, ServiceError> {
        let deleted = self.store.delete_all_refresh_tokens().await?;
        tracing::warn!(deleted = deleted, "All refresh tokens deleted");
        Ok(deleted)
    }

    pub fn build_refresh_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE_NAME, token))
            .path(REFRESH_COOKIE_PATH)
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.environment.is_production())
            .max_age(time::Duration::days(self.refresh_token_expiry_days))
            .build()
    }

    /// Cookie that overwrites the refresh cookie and expires it immediately.
    pub fn clear_refresh_cookie(&self) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE_NAME, ""))
            .path(REFRESH_COOKIE_PATH)
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.environment.is_production())
            .max_age(time::Duration::ZERO)
            .build()
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::{Account, Isn, Permission, Role, Visibility};
    use crate::services::MemoryStore;

    fn jwt() -> JwtService {
        JwtService::new(&JwtConfig {
            secret_key: "test-secret-key-that-is-long-enough-for-hs256".to_string(),
            issuer: "isn-access".to_string(),
            access_token_expiry_minutes: 30,
            refresh_token_expiry_days: 60,
        })
        .unwrap()
    }

    fn service(store: Arc<MemoryStore>, environment: Environment) -> TokenService {
        TokenService::new(store, jwt(), environment, 60)
    }

    #[tokio::test]
    async fn test_create_access_token_embeds_permissions() {
        let store = Arc::new(MemoryStore::new());
        let owner = Account::new_user(Role::Owner);
        let owner_id = owner.account_id;
        store.insert_account(owner).unwrap();
        store
            .insert_isn(Isn::new("isn-a", Uuid::new_v4(), Visibility::Public))
            .unwrap();

        let tokens = service(store, Environment::Dev);
        let issued = tokens.create_access_token(owner_id).await.unwrap();

        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 1800);
        assert_eq!(issued.claims.account_id, owner_id);
        assert_eq!(issued.claims.isn_perms["isn-a"].permission, Permission::Write);

        let decoded = tokens.jwt().validate(&issued.access_token).unwrap();
        assert_eq!(decoded, issued.claims);
    }

    #[tokio::test]
    async fn test_create_access_token_rejects_unknown_and_disabled() {
        let store = Arc::new(MemoryStore::new());
        let tokens = service(store.clone(), Environment::Dev);

        assert!(matches!(
            tokens.create_access_token(Uuid::new_v4()).await,
            Err(ServiceError::AccountNotFound)
        ));

        let account = Account::new_service_account();
        let account_id = account.account_id;
        store.insert_account(account).unwrap();
        store.set_account_active(account_id, false).unwrap();

        assert!(matches!(
            tokens.create_access_token(account_id).await,
            Err(ServiceError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn test_create_access_token_rejects_unknown_role() {
        let store = Arc::new(MemoryStore::new());
        let mut account = Account::new_user(Role::Member);
        account.account_role_code = "root".to_string();
        let account_id = account.account_id;
        store.insert_account(account).unwrap();

        let tokens = service(store, Environment::Dev);
        assert!(matches!(
            tokens.create_access_token(account_id).await,
            Err(ServiceError::DataIntegrity(_))
        ));
    }

    #[tokio::test]
    async fn test_rotate_twice_invalidates_first() {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new_user(Role::Member);
        let account_id = account.account_id;
        store.insert_account(account).unwrap();
        let tokens = service(store.clone(), Environment::Dev);

        let first = tokens.rotate_refresh_token(account_id).await.unwrap();
        let second = tokens.rotate_refresh_token(account_id).await.unwrap();
        assert_ne!(first, second);

        assert!(matches!(
            tokens.find_refresh_token(&hash_opaque_token(&first)).await,
            Err(ServiceError::RefreshTokenInvalid)
        ));
        let live = tokens
            .find_refresh_token(&hash_opaque_token(&second))
            .await
            .unwrap();
        assert_eq!(live.account_id, account_id);
        assert_eq!(store.live_refresh_token_count(account_id, Utc::now()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_leaves_one_live_token() {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new_user(Role::Member);
        let account_id = account.account_id;
        store.insert_account(account).unwrap();
        let tokens = service(store.clone(), Environment::Dev);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokens = tokens.clone();
                tokio::spawn(async move { tokens.rotate_refresh_token(account_id).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.live_refresh_token_count(account_id, Utc::now()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exchange_replaces_presented_token() {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new_user(Role::Member);
        let account_id = account.account_id;
        store.insert_account(account).unwrap();
        let tokens = service(store.clone(), Environment::Dev);

        let first = tokens.rotate_refresh_token(account_id).await.unwrap();
        let second = tokens
            .exchange_refresh_token(account_id, &hash_opaque_token(&first))
            .await
            .unwrap();

        assert!(matches!(
            tokens.find_refresh_token(&hash_opaque_token(&first)).await,
            Err(ServiceError::RefreshTokenInvalid)
        ));
        assert!(tokens.find_refresh_token(&hash_opaque_token(&second)).await.is_ok());
        assert_eq!(store.live_refresh_token_count(account_id, Utc::now()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exchange_after_sessions_revoked_issues_nothing() {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new_user(Role::Member);
        let account_id = account.account_id;
        store.insert_account(account).unwrap();
        let tokens = service(store.clone(), Environment::Dev);

        let presented = tokens.rotate_refresh_token(account_id).await.unwrap();
        tokens.revoke_all_refresh_tokens(account_id).await.unwrap();

        assert!(matches!(
            tokens
                .exchange_refresh_token(account_id, &hash_opaque_token(&presented))
                .await,
            Err(ServiceError::RefreshTokenInvalid)
        ));
        assert_eq!(store.live_refresh_token_count(account_id, Utc::now()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stored_token_is_hashed() {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new_user(Role::Member);
        let account_id = account.account_id;
        store.insert_account(account).unwrap();
        let tokens = service(store.clone(), Environment::Dev);

        let plaintext = tokens.rotate_refresh_token(account_id).await.unwrap();
        assert!(store
            .find_valid_refresh_token(&plaintext, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_refresh_cookie_attributes() {
        let store = Arc::new(MemoryStore::new());

        let dev = service(store.clone(), Environment::Dev).build_refresh_cookie("tok".to_string());
        assert_eq!(dev.name(), "refresh_token");
        assert_eq!(dev.value(), "tok");
        assert_eq!(dev.path(), Some("/oauth"));
        assert_eq!(dev.http_only(), Some(true));
        assert_eq!(dev.same_site(), Some(SameSite::Lax));
        assert_eq!(dev.secure(), Some(false));
        assert_eq!(dev.max_age(), Some(time::Duration::days(60)));

        let prod = service(store, Environment::Prod).build_refresh_cookie("tok".to_string());
        assert_eq!(prod.secure(), Some(true));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let store = Arc::new(MemoryStore::new());
        let cookie = service(store, Environment::Dev).clear_refresh_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/oauth"));
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}

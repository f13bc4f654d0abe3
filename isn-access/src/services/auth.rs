use std::sync::Arc;

use chrono::Utc;

use crate::{
    models::{Account, AccountType},
    services::{AccessStore, ServiceError},
    utils::{
        digests_match, hash_opaque_token, verify_dummy_password, verify_password, Password,
        PasswordHashString,
    },
};

/// Verifies user passwords and service account client secrets.
///
/// Every failure inside one credential kind collapses into a single error
/// so callers cannot tell an unknown identifier from a wrong secret.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AccessStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Check an email and password, returning the active user account.
    pub async fn login(&self, email: &str, password: &Password) -> Result<Account, ServiceError> {
        let user = match self.store.find_user_by_email(email).await? {
            Some(user) => user,
            None => {
                verify_dummy_password(password);
                tracing::warn!("Login failed: unknown email");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let hash = PasswordHashString::new(user.hashed_password.clone());
        if verify_password(password, &hash).is_err() {
            tracing::warn!(account_id = %user.account_id, "Login failed: password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        let account = self
            .store
            .find_account(user.account_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(account_id = %user.account_id, "User has no account row");
                ServiceError::InvalidCredentials
            })?;

        if !account.is_active {
            tracing::warn!(account_id = %account.account_id, "Login failed: account disabled");
            return Err(ServiceError::InvalidCredentials);
        }

        if account.account_type() != Ok(AccountType::User) {
            tracing::error!(account_id = %account.account_id, "Password credential on non-user account");
            return Err(ServiceError::InvalidCredentials);
        }

        tracing::info!(account_id = %account.account_id, "User logged in");
        Ok(account)
    }

    /// Check a client id and secret, returning the active service account.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Account, ServiceError> {
        let service_account = self
            .store
            .find_service_account_by_client_id(client_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(client_id = %client_id, "Client authentication failed: unknown client_id");
                ServiceError::InvalidClientCredentials
            })?;

        let account = self
            .store
            .find_account(service_account.account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| {
                tracing::warn!(client_id = %client_id, "Client authentication failed: account missing or disabled");
                ServiceError::InvalidClientCredentials
            })?;

        let presented = hash_opaque_token(client_secret);
        let secrets = self
            .store
            .find_valid_client_secrets(service_account.account_id, Utc::now())
            .await?;

        // Compare against every live secret so timing does not depend on which one matches.
        let matched = secrets
            .iter()
            .fold(false, |found, s| digests_match(&s.hashed_secret, &presented) | found);

        if !matched {
            tracing::warn!(client_id = %client_id, "Client authentication failed: secret mismatch");
            return Err(ServiceError::InvalidClientCredentials);
        }

        tracing::debug!(client_id = %client_id, account_id = %account.account_id, "Client authenticated");
        Ok(account)
    }

    /// Revoke the live client secret with this digest. Returns whether one
    /// was revoked.
    pub async fn revoke_client_secret(&self, hashed_secret: &str) -> Result<bool, ServiceError> {
        let revoked = self.store.revoke_client_secret(hashed_secret).await?;
        tracing::info!(revoked = revoked, "Client secret revocation requested");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientSecret, Role, ServiceAccount, User};
    use crate::services::MemoryStore;
    use crate::utils::hash_password;

    async fn seed_user(store: &MemoryStore, email: &str, password: &str) -> Account {
        let account = Account::new_user(Role::Member);
        let hash = hash_password(&Password::new(password.to_string())).unwrap();
        store.insert_account(account.clone()).unwrap();
        store
            .insert_user(User::new(account.account_id, email.to_string(), hash.into_string()))
            .unwrap();
        account
    }

    fn seed_client(store: &MemoryStore, client_id: &str, secret: &str) -> Account {
        let account = Account::new_service_account();
        store.insert_account(account.clone()).unwrap();
        store
            .insert_service_account(ServiceAccount::new(
                account.account_id,
                client_id.to_string(),
                "Example Org".to_string(),
                "ops@example.org".to_string(),
            ))
            .unwrap();
        store
            .insert_client_secret(ClientSecret::new(
                account.account_id,
                hash_opaque_token(secret),
                365,
            ))
            .unwrap();
        account
    }

    #[tokio::test]
    async fn test_login_success_and_failures_collapse() {
        let store = Arc::new(MemoryStore::new());
        let account = seed_user(&store, "alice@example.com", "correct horse").await;
        let auth = AuthService::new(store.clone());

        let ok = auth
            .login("alice@example.com", &Password::new("correct horse".to_string()))
            .await
            .unwrap();
        assert_eq!(ok.account_id, account.account_id);

        let wrong = auth
            .login("alice@example.com", &Password::new("wrong".to_string()))
            .await;
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));

        let unknown = auth
            .login("bob@example.com", &Password::new("correct horse".to_string()))
            .await;
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));

        store.set_account_active(account.account_id, false).unwrap();
        let disabled = auth
            .login("alice@example.com", &Password::new("correct horse".to_string()))
            .await;
        assert!(matches!(disabled, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_email_rejected_even_with_dummy_password() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthService::new(store);

        let result = auth
            .login("nobody@example.com", &Password::new("isn-access-dummy".to_string()))
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_client_credentials() {
        let store = Arc::new(MemoryStore::new());
        let account = seed_client(&store, "sa_1", "s3cret");
        let auth = AuthService::new(store.clone());

        let ok = auth.authenticate_client("sa_1", "s3cret").await.unwrap();
        assert_eq!(ok.account_id, account.account_id);

        assert!(matches!(
            auth.authenticate_client("sa_1", "nope").await,
            Err(ServiceError::InvalidClientCredentials)
        ));
        assert!(matches!(
            auth.authenticate_client("sa_2", "s3cret").await,
            Err(ServiceError::InvalidClientCredentials)
        ));
    }

    #[tokio::test]
    async fn test_disabled_service_account_rejected() {
        let store = Arc::new(MemoryStore::new());
        let account = seed_client(&store, "sa_1", "s3cret");
        store.set_account_active(account.account_id, false).unwrap();
        let auth = AuthService::new(store);

        assert!(matches!(
            auth.authenticate_client("sa_1", "s3cret").await,
            Err(ServiceError::InvalidClientCredentials)
        ));
    }

    #[tokio::test]
    async fn test_revoked_secret_rejected() {
        let store = Arc::new(MemoryStore::new());
        seed_client(&store, "sa_1", "s3cret");
        let auth = AuthService::new(store);

        let digest = hash_opaque_token("s3cret");
        assert!(auth.revoke_client_secret(&digest).await.unwrap());
        assert!(!auth.revoke_client_secret(&digest).await.unwrap());
        assert!(matches!(
            auth.authenticate_client("sa_1", "s3cret").await,
            Err(ServiceError::InvalidClientCredentials)
        ));
    }
}

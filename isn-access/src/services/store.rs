//! Storage seam for the access-control core.
//!
//! [`AccessStore`] is the only way the core reaches durable state.
//! [`Database`](super::Database) implements it over PostgreSQL and
//! [`MemoryStore`] implements it in process for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{
    Account, ClientSecret, Isn, IsnGrant, IsnSignalType, OpenBatch, RefreshToken, ServiceAccount,
    User,
};
use crate::services::ServiceError;

#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_service_account_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<ServiceAccount>, ServiceError>;

    /// Client secrets for the service account that are neither expired nor revoked.
    async fn find_valid_client_secrets(
        &self,
        service_account_account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClientSecret>, ServiceError>;

    /// Returns whether a live secret with this digest was revoked.
    async fn revoke_client_secret(&self, hashed_secret: &str) -> Result<bool, ServiceError>;

    async fn list_isns(&self) -> Result<Vec<Isn>, ServiceError>;

    async fn list_grants_for_account(&self, account_id: Uuid)
        -> Result<Vec<IsnGrant>, ServiceError>;

    async fn list_in_use_signal_types(&self) -> Result<Vec<IsnSignalType>, ServiceError>;

    async fn list_open_batches(&self, account_id: Uuid) -> Result<Vec<OpenBatch>, ServiceError>;

    /// Refresh token with this digest that is unrevoked and unexpired at `now`.
    async fn find_valid_refresh_token(
        &self,
        hashed_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, ServiceError>;

    /// Revoke every live refresh token of `token.account_id` and insert `token`
    /// as one atomic step. Concurrent rotations for the same account are
    /// serialized so at most one token stays live. Returns the number revoked.
    async fn rotate_refresh_token(&self, token: &RefreshToken) -> Result<u64, ServiceError>;

    /// Spend the live token with digest `presented_hash` and rotate to `token`
    /// in the same atomic step. The presented token must belong to
    /// `token.account_id` and still be live when the step runs, otherwise
    /// nothing changes and `RefreshTokenInvalid` is returned.
    async fn exchange_refresh_token(
        &self,
        presented_hash: &str,
        token: &RefreshToken,
    ) -> Result<u64, ServiceError>;

    /// Returns whether a live token with this digest was revoked.
    async fn revoke_refresh_token(&self, hashed_token: &str) -> Result<bool, ServiceError>;

    async fn revoke_all_refresh_tokens(&self, account_id: Uuid) -> Result<u64, ServiceError>;

    async fn delete_all_refresh_tokens(&self) -> Result<u64, ServiceError>;
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    users: Vec<User>,
    service_accounts: Vec<ServiceAccount>,
    client_secrets: Vec<ClientSecret>,
    isns: Vec<Isn>,
    grants: Vec<IsnGrant>,
    signal_types: Vec<IsnSignalType>,
    open_batches: Vec<OpenBatch>,
    refresh_tokens: Vec<RefreshToken>,
}

impl MemoryState {
    fn revoke_live_refresh_tokens(&mut self, account_id: Uuid, now: DateTime<Utc>) -> u64 {
        let mut revoked = 0;
        for token in self
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.account_id == account_id && t.is_valid_at(now))
        {
            token.revoked_at = Some(now);
            revoked += 1;
        }
        revoked
    }
}

/// In-process store guarded by a single mutex.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Database(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }

    pub fn insert_account(&self, account: Account) -> Result<(), ServiceError> {
        self.lock()?.accounts.insert(account.account_id, account);
        Ok(())
    }

    pub fn set_account_active(&self, account_id: Uuid, is_active: bool) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or(ServiceError::AccountNotFound)?;
        account.is_active = is_active;
        Ok(())
    }

    pub fn insert_user(&self, user: User) -> Result<(), ServiceError> {
        self.lock()?.users.push(user);
        Ok(())
    }

    pub fn insert_service_account(&self, service_account: ServiceAccount) -> Result<(), ServiceError> {
        self.lock()?.service_accounts.push(service_account);
        Ok(())
    }

    pub fn insert_client_secret(&self, secret: ClientSecret) -> Result<(), ServiceError> {
        self.lock()?.client_secrets.push(secret);
        Ok(())
    }

    pub fn insert_isn(&self, isn: Isn) -> Result<(), ServiceError> {
        self.lock()?.isns.push(isn);
        Ok(())
    }

    pub fn insert_grant(&self, grant: IsnGrant) -> Result<(), ServiceError> {
        self.lock()?.grants.push(grant);
        Ok(())
    }

    pub fn insert_signal_type(&self, signal_type: IsnSignalType) -> Result<(), ServiceError> {
        self.lock()?.signal_types.push(signal_type);
        Ok(())
    }

    pub fn insert_open_batch(&self, batch: OpenBatch) -> Result<(), ServiceError> {
        self.lock()?.open_batches.push(batch);
        Ok(())
    }

    pub fn insert_refresh_token(&self, token: RefreshToken) -> Result<(), ServiceError> {
        self.lock()?.refresh_tokens.push(token);
        Ok(())
    }

    /// Count of tokens for the account that are live at `now`.
    pub fn live_refresh_token_count(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        Ok(self
            .lock()?
            .refresh_tokens
            .iter()
            .filter(|t| t.account_id == account_id && t.is_valid_at(now))
            .count())
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError> {
        Ok(self.lock()?.accounts.get(&account_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_service_account_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<ServiceAccount>, ServiceError> {
        Ok(self
            .lock()?
            .service_accounts
            .iter()
            .find(|s| s.client_id == client_id)
            .cloned())
    }

    async fn find_valid_client_secrets(
        &self,
        service_account_account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClientSecret>, ServiceError> {
        Ok(self
            .lock()?
            .client_secrets
            .iter()
            .filter(|s| {
                s.service_account_account_id == service_account_account_id && s.is_valid_at(now)
            })
            .cloned()
            .collect())
    }

    async fn revoke_client_secret(&self, hashed_secret: &str) -> Result<bool, ServiceError> {
        let now = Utc::now();
        let mut state = self.lock()?;
        let mut revoked = false;
        for secret in state
            .client_secrets
            .iter_mut()
            .filter(|s| s.hashed_secret == hashed_secret && s.is_valid_at(now))
        {
            secret.revoked_at = Some(now);
            revoked = true;
        }
        Ok(revoked)
    }

    async fn list_isns(&self) -> Result<Vec<Isn>, ServiceError> {
        Ok(self.lock()?.isns.clone())
    }

    async fn list_grants_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<IsnGrant>, ServiceError> {
        Ok(self
            .lock()?
            .grants
            .iter()
            .filter(|g| g.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn list_in_use_signal_types(&self) -> Result<Vec<IsnSignalType>, ServiceError> {
        Ok(self.lock()?.signal_types.clone())
    }

    async fn list_open_batches(&self, account_id: Uuid) -> Result<Vec<OpenBatch>, ServiceError> {
        Ok(self
            .lock()?
            .open_batches
            .iter()
            .filter(|b| b.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn find_valid_refresh_token(
        &self,
        hashed_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, ServiceError> {
        Ok(self
            .lock()?
            .refresh_tokens
            .iter()
            .find(|t| t.hashed_token == hashed_token && t.is_valid_at(now))
            .cloned())
    }

    async fn rotate_refresh_token(&self, token: &RefreshToken) -> Result<u64, ServiceError> {
        let now = Utc::now();
        let mut state = self.lock()?;
        if !state.accounts.contains_key(&token.account_id) {
            return Err(ServiceError::AccountNotFound);
        }
        let revoked = state.revoke_live_refresh_tokens(token.account_id, now);
        state.refresh_tokens.push(token.clone());
        Ok(revoked)
    }

    async fn exchange_refresh_token(
        &self,
        presented_hash: &str,
        token: &RefreshToken,
    ) -> Result<u64, ServiceError> {
        let now = Utc::now();
        let mut state = self.lock()?;
        if !state.accounts.contains_key(&token.account_id) {
            return Err(ServiceError::AccountNotFound);
        }

        let presented_is_live = state.refresh_tokens.iter().any(|t| {
            t.hashed_token == presented_hash && t.account_id == token.account_id && t.is_valid_at(now)
        });
        if !presented_is_live {
            return Err(ServiceError::RefreshTokenInvalid);
        }

        let revoked = state.revoke_live_refresh_tokens(token.account_id, now);
        state.refresh_tokens.push(token.clone());
        Ok(revoked)
    }

    async fn revoke_refresh_token(&self, hashed_token: &str) -> Result<bool, ServiceError> {
        let now = Utc::now();
        let mut state = self.lock()?;
        match state
            .refresh_tokens
            .iter_mut()
            .find(|t| t.hashed_token == hashed_token && t.is_valid_at(now))
        {
            Some(token) => {
                token.revoked_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_refresh_tokens(&self, account_id: Uuid) -> Result<u64, ServiceError> {
        let now = Utc::now();
        Ok(self.lock()?.revoke_live_refresh_tokens(account_id, now))
    }

    async fn delete_all_refresh_tokens(&self) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        let count = state.refresh_tokens.len() as u64;
        state.refresh_tokens.clear();
        Ok(count)
    }
}

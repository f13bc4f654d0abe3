//! PostgreSQL implementation of [`AccessStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    Account, ClientSecret, Isn, IsnGrant, IsnSignalType, OpenBatch, RefreshToken, ServiceAccount,
    User,
};
use crate::services::{AccessStore, ServiceError};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccessStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            ServiceError::from(e)
        })?;
        Ok(())
    }

    // ==================== Account Operations ====================

    async fn find_account(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, account_type_code, account_role_code, is_active, created_at
            FROM accounts WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT account_id, email, hashed_password, created_at FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // ==================== Service Account Operations ====================

    async fn find_service_account_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<ServiceAccount>, ServiceError> {
        let account = sqlx::query_as::<_, ServiceAccount>(
            r#"
            SELECT account_id, client_id, client_organization, client_contact_email, created_at
            FROM service_accounts WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_valid_client_secrets(
        &self,
        service_account_account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClientSecret>, ServiceError> {
        let secrets = sqlx::query_as::<_, ClientSecret>(
            r#"
            SELECT secret_id, service_account_account_id, hashed_secret, expires_at, revoked_at, created_at
            FROM client_secrets
            WHERE service_account_account_id = $1
              AND revoked_at IS NULL
              AND expires_at > $2
            "#,
        )
        .bind(service_account_account_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(secrets)
    }

    async fn revoke_client_secret(&self, hashed_secret: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE client_secrets SET revoked_at = NOW()
            WHERE hashed_secret = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(hashed_secret)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== ISN Catalog Operations ====================

    async fn list_isns(&self) -> Result<Vec<Isn>, ServiceError> {
        let isns = sqlx::query_as::<_, Isn>(
            "SELECT slug, owner_account_id, visibility_code, created_at FROM isns ORDER BY slug",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(isns)
    }

    async fn list_grants_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<IsnGrant>, ServiceError> {
        let grants = sqlx::query_as::<_, IsnGrant>(
            r#"
            SELECT account_id, isn_slug, permission_code, created_at
            FROM isn_grants WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(grants)
    }

    async fn list_in_use_signal_types(&self) -> Result<Vec<IsnSignalType>, ServiceError> {
        let signal_types = sqlx::query_as::<_, IsnSignalType>(
            r#"
            SELECT isn_slug, signal_type_slug, sem_ver
            FROM isn_signal_types
            WHERE is_in_use = true
            ORDER BY isn_slug, signal_type_slug, sem_ver
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(signal_types)
    }

    async fn list_open_batches(&self, account_id: Uuid) -> Result<Vec<OpenBatch>, ServiceError> {
        let batches = sqlx::query_as::<_, OpenBatch>(
            r#"
            SELECT account_id, isn_slug, signal_batch_id
            FROM signal_batches
            WHERE account_id = $1 AND is_latest = true
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    // ==================== Refresh Token Operations ====================

    async fn find_valid_refresh_token(
        &self,
        hashed_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, ServiceError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT refresh_token_id, account_id, hashed_token, expires_at, revoked_at, created_at
            FROM refresh_tokens
            WHERE hashed_token = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(hashed_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn rotate_refresh_token(&self, token: &RefreshToken) -> Result<u64, ServiceError> {
        // Dropping the transaction before commit rolls it back, so a cancelled
        // request leaves the previous token state untouched.
        let mut tx = self.pool.begin().await?;
        lock_account(&mut tx, token.account_id).await?;

        let revoked = revoke_live_tokens(&mut tx, token.account_id).await?;
        insert_refresh_token(&mut tx, token).await?;

        tx.commit().await?;
        Ok(revoked)
    }

    async fn exchange_refresh_token(
        &self,
        presented_hash: &str,
        token: &RefreshToken,
    ) -> Result<u64, ServiceError> {
        let mut tx = self.pool.begin().await?;
        lock_account(&mut tx, token.account_id).await?;

        // Spending the presented token is conditional on it still being live,
        // so a concurrent revoke-all or rotation that got the lock first wins.
        let spent = sqlx::query(
            r#"
            UPDATE refresh_tokens SET revoked_at = NOW()
            WHERE hashed_token = $1 AND account_id = $2
              AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(presented_hash)
        .bind(token.account_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if spent == 0 {
            return Err(ServiceError::RefreshTokenInvalid);
        }

        let revoked = spent + revoke_live_tokens(&mut tx, token.account_id).await?;
        insert_refresh_token(&mut tx, token).await?;

        tx.commit().await?;
        Ok(revoked)
    }

    async fn revoke_refresh_token(&self, hashed_token: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens SET revoked_at = NOW()
            WHERE hashed_token = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(hashed_token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_refresh_tokens(&self, account_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens SET revoked_at = NOW()
            WHERE account_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_refresh_tokens(&self) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM refresh_tokens")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

type Tx = sqlx::Transaction<'static, sqlx::Postgres>;

/// Serializes token changes for one account.
async fn lock_account(tx: &mut Tx, account_id: Uuid) -> Result<(), ServiceError> {
    sqlx::query("SELECT account_id FROM accounts WHERE account_id = $1 FOR UPDATE")
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(ServiceError::AccountNotFound)?;
    Ok(())
}

async fn revoke_live_tokens(tx: &mut Tx, account_id: Uuid) -> Result<u64, ServiceError> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens SET revoked_at = NOW()
        WHERE account_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
        "#,
    )
    .bind(account_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

async fn insert_refresh_token(tx: &mut Tx, token: &RefreshToken) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (refresh_token_id, account_id, hashed_token, expires_at, revoked_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(token.refresh_token_id)
    .bind(token.account_id)
    .bind(&token.hashed_token)
    .bind(token.expires_at)
    .bind(token.revoked_at)
    .bind(token.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

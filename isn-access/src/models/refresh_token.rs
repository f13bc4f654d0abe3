use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Outstanding renewal capability for one account.
///
/// Only the digest of the token is stored. A row is never updated after
/// insert except to stamp `revoked_at`.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub refresh_token_id: Uuid,
    pub account_id: Uuid,
    pub hashed_token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Create a new refresh token record from an already hashed token
    pub fn new(account_id: Uuid, hashed_token: String, expires_in_days: i64) -> Self {
        let now = Utc::now();
        Self {
            refresh_token_id: Uuid::new_v4(),
            account_id,
            hashed_token,
            expires_at: now + Duration::days(expires_in_days),
            revoked_at: None,
            created_at: now,
        }
    }

    /// Expiry is inclusive: a token whose `expires_at` equals `now` is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Check if this token can still be exchanged (not expired and not revoked)
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && !self.is_revoked()
    }
}

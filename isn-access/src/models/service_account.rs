//! Service account model - client-credential principals.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Service account entity. One-to-one with an [`Account`](super::Account) of type `service_account`.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceAccount {
    pub account_id: Uuid,
    pub client_id: String,
    pub client_organization: String,
    pub client_contact_email: String,
    pub created_at: DateTime<Utc>,
}

impl ServiceAccount {
    pub fn new(
        account_id: Uuid,
        client_id: String,
        client_organization: String,
        client_contact_email: String,
    ) -> Self {
        Self {
            account_id,
            client_id,
            client_organization,
            client_contact_email,
            created_at: Utc::now(),
        }
    }
}

/// Hashed client secret. The plaintext is shown once at provisioning time.
#[derive(Debug, Clone, FromRow)]
pub struct ClientSecret {
    pub secret_id: Uuid,
    pub service_account_account_id: Uuid,
    pub hashed_secret: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ClientSecret {
    pub fn new(service_account_account_id: Uuid, hashed_secret: String, expiry_days: i64) -> Self {
        let now = Utc::now();
        Self {
            secret_id: Uuid::new_v4(),
            service_account_account_id,
            hashed_secret,
            expires_at: now + Duration::days(expiry_days),
            revoked_at: None,
            created_at: now,
        }
    }

    /// Not revoked and strictly before expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

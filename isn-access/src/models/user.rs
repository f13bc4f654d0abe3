//! User model - password credential for human accounts.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity. One-to-one with an [`Account`](super::Account) of type `user`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub account_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(account_id: Uuid, email: String, hashed_password: String) -> Self {
        Self {
            account_id,
            email,
            hashed_password,
            created_at: Utc::now(),
        }
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeSessionsResponse {
    pub account_id: Uuid,
    pub revoked: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub deleted: u64,
}

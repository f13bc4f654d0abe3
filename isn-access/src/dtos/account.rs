use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::IsnPerms;

/// The caller's own identity as carried in its access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub account_id: Uuid,
    pub account_type: String,
    pub role: String,
    pub isn_perms: IsnPerms,
    /// Unix timestamp after which the token, and these permissions, lapse.
    pub expires_at: i64,
}

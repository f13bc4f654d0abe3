//! Information sharing network catalog models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// ISN visibility codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

/// Permission on a single ISN. `Write` implies `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            _ => Err(format!("Invalid permission: {}", s)),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISN entity. Read-only input to permission computation.
#[derive(Debug, Clone, FromRow)]
pub struct Isn {
    pub slug: String,
    pub owner_account_id: Uuid,
    pub visibility_code: String,
    pub created_at: DateTime<Utc>,
}

impl Isn {
    pub fn new(slug: impl Into<String>, owner_account_id: Uuid, visibility: Visibility) -> Self {
        Self {
            slug: slug.into(),
            owner_account_id,
            visibility_code: visibility.as_str().to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Explicit per-ISN permission record.
#[derive(Debug, Clone, FromRow)]
pub struct IsnGrant {
    pub account_id: Uuid,
    pub isn_slug: String,
    pub permission_code: String,
    pub created_at: DateTime<Utc>,
}

impl IsnGrant {
    pub fn new(account_id: Uuid, isn_slug: impl Into<String>, permission: Permission) -> Self {
        Self {
            account_id,
            isn_slug: isn_slug.into(),
            permission_code: permission.as_str().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn permission(&self) -> Result<Permission, String> {
        self.permission_code.parse()
    }
}

/// A signal type version currently marked in use on an ISN.
#[derive(Debug, Clone, FromRow)]
pub struct IsnSignalType {
    pub isn_slug: String,
    pub signal_type_slug: String,
    pub sem_ver: String,
}

impl IsnSignalType {
    pub fn new(
        isn_slug: impl Into<String>,
        signal_type_slug: impl Into<String>,
        sem_ver: impl Into<String>,
    ) -> Self {
        Self {
            isn_slug: isn_slug.into(),
            signal_type_slug: signal_type_slug.into(),
            sem_ver: sem_ver.into(),
        }
    }

    /// Path clients use to address this version, e.g. `sample-signal/v1.0.0`.
    pub fn path(&self) -> String {
        format!("{}/v{}", self.signal_type_slug, self.sem_ver)
    }
}

/// The account's currently open signal batch on an ISN.
#[derive(Debug, Clone, FromRow)]
pub struct OpenBatch {
    pub account_id: Uuid,
    pub isn_slug: String,
    pub signal_batch_id: Uuid,
}

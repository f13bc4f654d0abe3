//! Account model - the authentication principal (user or service account).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    User,
    ServiceAccount,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::User => "user",
            AccountType::ServiceAccount => "service_account",
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(AccountType::User),
            "service_account" => Ok(AccountType::ServiceAccount),
            _ => Err(format!("Invalid account type: {}", s)),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global privilege tier. Governs implicit ISN access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            _ => Err(format!("Invalid account role: {}", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account entity.
///
/// Type and role are kept as the stored codes; an unknown code is a data
/// integrity problem and surfaces when [`Account::account_type`] or
/// [`Account::role`] is called.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub account_type_code: String,
    pub account_role_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new user account.
    pub fn new_user(role: Role) -> Self {
        Self::new(AccountType::User, role)
    }

    /// Create a new service account. Service accounts always carry the member role.
    pub fn new_service_account() -> Self {
        Self::new(AccountType::ServiceAccount, Role::Member)
    }

    fn new(account_type: AccountType, role: Role) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            account_type_code: account_type.as_str().to_string(),
            account_role_code: role.as_str().to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn account_type(&self) -> Result<AccountType, String> {
        self.account_type_code.parse()
    }

    pub fn role(&self) -> Result<Role, String> {
        self.account_role_code.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes() {
        for role in [Role::Owner, Role::Admin, Role::Member] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("superuser".parse::<Role>().is_err());
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_service_account_is_member() {
        let account = Account::new_service_account();
        assert_eq!(account.account_type(), Ok(AccountType::ServiceAccount));
        assert_eq!(account.role(), Ok(Role::Member));
        assert!(account.is_active);
    }

    #[test]
    fn test_unknown_role_code_is_error() {
        let mut account = Account::new_user(Role::Admin);
        account.account_role_code = "root".to_string();
        assert!(account.role().is_err());
    }
}

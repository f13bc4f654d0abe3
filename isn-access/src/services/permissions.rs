//! Per-ISN permission computation.
//!
//! The set of ISNs an account may use is derived from its role plus any
//! explicit grants. [`resolve_isn_perms`] is pure over an [`IsnCatalog`]
//! snapshot; [`PermissionResolver`] loads the snapshot from the store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Account, AccountType, Isn, IsnGrant, IsnSignalType, OpenBatch, Permission, Role};
use crate::services::{AccessStore, ServiceError};

/// Access an account holds on one ISN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsnPermission {
    pub permission: Permission,
    /// Latest open batch the account holds on this ISN, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_batch_id: Option<Uuid>,
    /// In-use signal type paths (`<slug>/v<sem_ver>`), sorted.
    #[serde(default)]
    pub signal_types: Vec<String>,
}

/// ISN slug to permission. Ordered so serialized claims are stable.
pub type IsnPerms = BTreeMap<String, IsnPermission>;

/// Point-in-time view of everything permission computation reads.
#[derive(Debug, Clone, Default)]
pub struct IsnCatalog {
    pub isns: Vec<Isn>,
    pub grants: Vec<IsnGrant>,
    pub signal_types: Vec<IsnSignalType>,
    pub open_batches: Vec<OpenBatch>,
}

/// Compute the ISN permission map for an account.
///
/// - owner: write on every ISN
/// - admin: write on ISNs it owns, plus explicit grants
/// - member and service accounts: explicit grants only
///
/// An explicit grant never lowers access derived from the role. Grants that
/// belong to another account or name an ISN missing from the catalog are
/// ignored.
pub fn resolve_isn_perms(
    account_id: Uuid,
    account_type: AccountType,
    role: Role,
    catalog: &IsnCatalog,
) -> Result<IsnPerms, ServiceError> {
    let known: BTreeSet<&str> = catalog.isns.iter().map(|i| i.slug.as_str()).collect();
    let mut granted: BTreeMap<&str, Permission> = BTreeMap::new();

    let effective_role = match account_type {
        AccountType::ServiceAccount => Role::Member,
        AccountType::User => role,
    };

    match effective_role {
        Role::Owner => {
            for isn in &catalog.isns {
                granted.insert(isn.slug.as_str(), Permission::Write);
            }
        }
        Role::Admin => {
            for isn in catalog.isns.iter().filter(|i| i.owner_account_id == account_id) {
                granted.insert(isn.slug.as_str(), Permission::Write);
            }
        }
        Role::Member => {}
    }

    for grant in catalog.grants.iter().filter(|g| g.account_id == account_id) {
        let permission = grant.permission().map_err(ServiceError::DataIntegrity)?;

        if !known.contains(grant.isn_slug.as_str()) {
            tracing::debug!(
                account_id = %account_id,
                isn_slug = %grant.isn_slug,
                "Ignoring grant for unknown ISN"
            );
            continue;
        }

        granted
            .entry(grant.isn_slug.as_str())
            .and_modify(|p| *p = (*p).max(permission))
            .or_insert(permission);
    }

    let mut perms = IsnPerms::new();
    for (slug, permission) in granted {
        let mut signal_types: Vec<String> = catalog
            .signal_types
            .iter()
            .filter(|st| st.isn_slug == slug)
            .map(IsnSignalType::path)
            .collect();
        signal_types.sort();
        signal_types.dedup();

        let signal_batch_id = catalog
            .open_batches
            .iter()
            .find(|b| b.account_id == account_id && b.isn_slug == slug)
            .map(|b| b.signal_batch_id);

        perms.insert(
            slug.to_string(),
            IsnPermission {
                permission,
                signal_batch_id,
                signal_types,
            },
        );
    }

    Ok(perms)
}

/// Loads the catalog for an account and resolves its permissions.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn AccessStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, account: &Account) -> Result<IsnPerms, ServiceError> {
        let account_type = account
            .account_type()
            .map_err(ServiceError::DataIntegrity)?;
        let role = account.role().map_err(ServiceError::DataIntegrity)?;

        let catalog = IsnCatalog {
            isns: self.store.list_isns().await?,
            grants: self.store.list_grants_for_account(account.account_id).await?,
            signal_types: self.store.list_in_use_signal_types().await?,
            open_batches: self.store.list_open_batches(account.account_id).await?,
        };

        resolve_isn_perms(account.account_id, account_type, role, &catalog)
    }
}

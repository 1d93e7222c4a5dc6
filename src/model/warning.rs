use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::AuthzError;
use crate::names::{RoleName, UserName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    RoleNotFound,
    MalformedRoleDocument,
    MalformedRoleReference,
    MalformedPrivilege,
    MissingCredentials,
    RoleCycle,
    StorageError,
}

/// An inconsistency found while building a description. Warnings are part of the
/// result; they never abort the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// The principal or role the warning is about, as `name@db`.
    pub subject: String,
    pub detail: String,
}

impl Warning {
    pub fn role_not_found(role: &RoleName) -> Self {
        Self {
            kind: WarningKind::RoleNotFound,
            subject: role.full_name(),
            detail: format!("role {0} not found; granted privileges from {0} are omitted", role),
        }
    }

    pub fn malformed_role(role: &RoleName, err: &AuthzError) -> Self {
        Self {
            kind: WarningKind::MalformedRoleDocument,
            subject: role.full_name(),
            detail: format!("role {} has a malformed document ({}); granted privileges from it are omitted", role, err.message()),
        }
    }

    pub fn malformed_reference(holder: &str, err: &AuthzError) -> Self {
        Self {
            kind: WarningKind::MalformedRoleReference,
            subject: holder.to_string(),
            detail: format!("skipping malformed role reference held by {}: {}", holder, err.message()),
        }
    }

    pub fn malformed_privilege(holder: &str, err: &AuthzError) -> Self {
        Self {
            kind: WarningKind::MalformedPrivilege,
            subject: holder.to_string(),
            detail: format!("skipping malformed privilege granted by {}: {}", holder, err.message()),
        }
    }

    pub fn missing_credentials(user: &UserName) -> Self {
        Self {
            kind: WarningKind::MissingCredentials,
            subject: user.full_name(),
            detail: format!("user {} has no credentials", user),
        }
    }

    pub fn role_cycle(role: &RoleName) -> Self {
        Self {
            kind: WarningKind::RoleCycle,
            subject: role.full_name(),
            detail: format!("role graph cycle through {}; membership is not re-expanded", role),
        }
    }

    pub fn storage_error(role: &RoleName, err: &AuthzError) -> Self {
        Self {
            kind: WarningKind::StorageError,
            subject: role.full_name(),
            detail: format!("could not read role {} ({}); granted privileges from it are omitted", role, err),
        }
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.detail) }
}

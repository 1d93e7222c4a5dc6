//! Authorization data model: privileges, stored user/role documents, and the
//! descriptions produced by role-graph resolution.

mod privilege;
mod warning;
mod documents;
mod description;

pub use privilege::{ActionSet, Privilege, PrivilegeSet, ResourcePattern};
pub use warning::{Warning, WarningKind};
pub use documents::{PrivilegeDocument, RoleDocument};
pub use description::{Description, Principal};

/// Documents are plain JSON objects.
pub type Document = serde_json::Value;

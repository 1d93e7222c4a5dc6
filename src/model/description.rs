use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::names::{RoleName, UserName};

use super::privilege::{ActionSet, PrivilegeSet, ResourcePattern};
use super::warning::Warning;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    User(UserName),
    Role(RoleName),
}

impl Principal {
    pub fn full_name(&self) -> String {
        match self {
            Principal::User(u) => u.full_name(),
            Principal::Role(r) => r.full_name(),
        }
    }
}

/// Fully expanded view of one principal. Built per query and owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub principal: Principal,
    /// Opaque credential material for users; always `None` for roles.
    pub credentials: Option<Value>,
    /// Roles listed in the principal's own document, in document order.
    pub direct_roles: Vec<RoleName>,
    /// Every role held, direct and inherited.
    pub roles: BTreeSet<RoleName>,
    pub privileges: PrivilegeSet,
    pub warnings: Vec<Warning>,
}

impl Description {
    pub fn has_credentials(&self) -> bool { self.credentials.is_some() }

    pub fn holds_role(&self, role: &RoleName) -> bool { self.roles.contains(role) }

    /// Roles reachable only through other roles.
    pub fn indirect_roles(&self) -> impl Iterator<Item = &RoleName> {
        self.roles.iter().filter(move |r| !self.direct_roles.contains(r))
    }

    pub fn actions_for(&self, resource: &ResourcePattern) -> Option<&ActionSet> { self.privileges.actions_for(resource) }

    /// Render in the stored-document style the authorization manager consumes:
    /// `roles`, `inheritedRoles`, `inheritedPrivileges` and, when non-empty, `warnings`.
    pub fn to_document(&self) -> Value {
        let mut m = Map::new();
        match &self.principal {
            Principal::User(u) => {
                m.insert("_id".into(), json!(u.doc_id()));
                m.insert("user".into(), json!(u.user()));
                m.insert("db".into(), json!(u.db()));
                if let Some(c) = &self.credentials {
                    m.insert("credentials".into(), c.clone());
                }
            }
            Principal::Role(r) => {
                m.insert("_id".into(), json!(r.doc_id()));
                m.insert("role".into(), json!(r.role()));
                m.insert("db".into(), json!(r.db()));
            }
        }
        m.insert("roles".into(), Value::Array(self.direct_roles.iter().map(|r| r.to_reference()).collect()));
        m.insert("inheritedRoles".into(), Value::Array(self.roles.iter().map(|r| r.to_reference()).collect()));
        m.insert("inheritedPrivileges".into(), self.privileges.to_document());
        if !self.warnings.is_empty() {
            m.insert("warnings".into(), Value::Array(self.warnings.iter().map(|w| json!(w.to_string())).collect()));
        }
        Value::Object(m)
    }
}

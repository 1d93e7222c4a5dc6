//! Principal and collection identities.
//!
//! `UserName` and `RoleName` are immutable `(name, db)` pairs used as lookup keys
//! and, for roles, as node identities during role-graph expansion.
//! `NamespaceString` names one collection as `db.coll`.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AuthzError, AuthzResult};

pub const ADMIN_DB: &str = "admin";
/// Database whose users authenticate externally and carry no stored credentials.
pub const EXTERNAL_DB: &str = "$external";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserName {
    user: String,
    db: String,
}

impl UserName {
    pub fn new(user: impl Into<String>, db: impl Into<String>) -> Self {
        Self { user: user.into(), db: db.into() }
    }

    pub fn user(&self) -> &str { &self.user }
    pub fn db(&self) -> &str { &self.db }

    /// `user@db`
    pub fn full_name(&self) -> String { format!("{}@{}", self.user, self.db) }

    /// The `_id` a unified (v2) user document is stored under.
    pub fn doc_id(&self) -> String { format!("{}.{}", self.db, self.user) }
}

impl Display for UserName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}@{}", self.user, self.db) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleName {
    role: String,
    db: String,
}

impl RoleName {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self { role: role.into(), db: db.into() }
    }

    pub fn role(&self) -> &str { &self.role }
    pub fn db(&self) -> &str { &self.db }

    pub fn full_name(&self) -> String { format!("{}@{}", self.role, self.db) }

    pub fn doc_id(&self) -> String { format!("{}.{}", self.db, self.role) }

    /// Parse a `{ role, db }` reference. A bare string is a role in `default_db`.
    pub fn from_reference(v: &Value, default_db: &str) -> AuthzResult<Self> {
        match v {
            Value::String(s) if !s.is_empty() => Ok(RoleName::new(s.as_str(), default_db)),
            Value::Object(m) => {
                let role = m.get("role").and_then(|x| x.as_str()).unwrap_or_default();
                if role.is_empty() {
                    return Err(AuthzError::parse(format!("role reference missing \"role\": {}", v)));
                }
                let db = m.get("db").and_then(|x| x.as_str()).unwrap_or(default_db);
                if db.is_empty() {
                    return Err(AuthzError::parse(format!("role reference has empty \"db\": {}", v)));
                }
                Ok(RoleName::new(role, db))
            }
            _ => Err(AuthzError::parse(format!("malformed role reference: {}", v))),
        }
    }

    pub fn to_reference(&self) -> Value { json!({ "role": self.role, "db": self.db }) }
}

impl Display for RoleName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}@{}", self.role, self.db) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceString {
    db: String,
    coll: String,
}

impl NamespaceString {
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self { db: db.into(), coll: coll.into() }
    }

    /// Split on the first '.'; both halves must be non-empty.
    pub fn parse(ns: &str) -> AuthzResult<Self> {
        match ns.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(AuthzError::bad_value(format!("invalid namespace '{}'", ns))),
        }
    }

    pub fn db(&self) -> &str { &self.db }
    pub fn coll(&self) -> &str { &self.coll }
    pub fn ns(&self) -> String { format!("{}.{}", self.db, self.coll) }

    /// `admin.system.users`
    pub fn admin_users() -> Self { Self::new(ADMIN_DB, "system.users") }
    /// `admin.system.roles`
    pub fn admin_roles() -> Self { Self::new(ADMIN_DB, "system.roles") }
    /// `admin.system.version`
    pub fn admin_version() -> Self { Self::new(ADMIN_DB, "system.version") }
    /// Per-database legacy users collection, `<db>.system.users`.
    pub fn legacy_users(db: &str) -> Self { Self::new(db, "system.users") }

    /// One of the collections guarded by the authorization update lock.
    pub fn is_authz_collection(&self) -> bool {
        *self == Self::admin_users() || *self == Self::admin_roles() || *self == Self::admin_version()
    }

    pub fn is_system_users(&self) -> bool { self.coll == "system.users" }
}

impl Display for NamespaceString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}.{}", self.db, self.coll) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_names_and_ids() {
        let u = UserName::new("alice", "app");
        assert_eq!(u.full_name(), "alice@app");
        assert_eq!(u.doc_id(), "app.alice");
        let r = RoleName::new("readWrite", "app");
        assert_eq!(r.to_string(), "readWrite@app");
        assert_eq!(r.doc_id(), "app.readWrite");
    }

    #[test]
    fn role_reference_forms() {
        let r = RoleName::from_reference(&json!({"role": "read", "db": "x"}), "app").unwrap();
        assert_eq!(r, RoleName::new("read", "x"));
        let r = RoleName::from_reference(&json!("read"), "app").unwrap();
        assert_eq!(r, RoleName::new("read", "app"));
        assert!(RoleName::from_reference(&json!({"db": "x"}), "app").is_err());
        assert!(RoleName::from_reference(&json!(42), "app").is_err());
        assert!(RoleName::from_reference(&json!(""), "app").is_err());
    }

    #[test]
    fn namespace_parse_splits_on_first_dot() {
        let ns = NamespaceString::parse("admin.system.users").unwrap();
        assert_eq!(ns.db(), "admin");
        assert_eq!(ns.coll(), "system.users");
        assert_eq!(ns, NamespaceString::admin_users());
        assert!(ns.is_authz_collection());
        assert!(NamespaceString::parse("nodot").is_err());
        assert!(NamespaceString::parse(".x").is_err());
        assert!(!NamespaceString::legacy_users("app").is_authz_collection());
    }
}

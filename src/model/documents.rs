//! Typed views over stored user and role documents.
//!
//! Parsing is split in two tiers: a document whose identity cannot be read is a
//! hard `FailedToParse` error, while a bad entry inside an otherwise valid document
//! (one role reference, one privilege) is skipped and reported as a `Warning`.

use serde_json::{json, Value};

use crate::error::{AuthzError, AuthzResult};
use crate::names::{RoleName, UserName, ADMIN_DB, EXTERNAL_DB};
use crate::versioning::SCHEMA_VERSION_LEGACY;

use super::privilege::Privilege;
use super::warning::Warning;

fn required_str<'a>(doc: &'a Value, field: &str, what: &str) -> AuthzResult<&'a str> {
    match doc.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
        _ => Err(AuthzError::parse(format!("{} document missing string field \"{}\"", what, field))),
    }
}

fn parse_role_refs(arr: Option<&Value>, default_db: &str, holder: &str, out: &mut Vec<RoleName>, warnings: &mut Vec<Warning>) {
    let Some(items) = arr.and_then(|v| v.as_array()) else { return; };
    for item in items {
        match RoleName::from_reference(item, default_db) {
            Ok(r) => {
                if !out.contains(&r) { out.push(r); }
            }
            Err(e) => warnings.push(Warning::malformed_reference(holder, &e)),
        }
    }
}

fn parse_privileges(arr: Option<&Value>, holder: &str, out: &mut Vec<Privilege>, warnings: &mut Vec<Warning>) {
    let Some(items) = arr.and_then(|v| v.as_array()) else { return; };
    for item in items {
        match Privilege::from_document(item) {
            Ok(p) => out.push(p),
            Err(e) => warnings.push(Warning::malformed_privilege(holder, &e)),
        }
    }
}

/// The stored record for one user, in whichever layout was live when it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivilegeDocument {
    pub name: UserName,
    /// Opaque credential material; `None` for users that authenticate externally.
    pub credentials: Option<Value>,
    pub roles: Vec<RoleName>,
    /// Inline grants; only the legacy layout carries these.
    pub privileges: Vec<Privilege>,
    pub schema_version: u32,
}

impl PrivilegeDocument {
    /// Parse a user document. `source_db` is the database whose users collection the
    /// document came from; legacy documents take their identity database from it.
    pub fn parse(doc: &Value, schema_version: u32, source_db: &str) -> AuthzResult<(Self, Vec<Warning>)> {
        if !doc.is_object() {
            return Err(AuthzError::parse("user document must be an object"));
        }
        let user = required_str(doc, "user", "user")?;
        let mut warnings = Vec::new();
        if schema_version == SCHEMA_VERSION_LEGACY {
            let name = UserName::new(user, source_db);
            let holder = name.full_name();
            let credentials = match doc.get("pwd") {
                Some(Value::String(h)) => Some(json!({ "MONGODB-CR": h })),
                _ => None,
            };
            let mut roles = Vec::new();
            parse_role_refs(doc.get("roles"), source_db, &holder, &mut roles, &mut warnings);
            // otherDBRoles is only honoured for users defined in admin
            if source_db == ADMIN_DB {
                if let Some(other) = doc.get("otherDBRoles").and_then(|v| v.as_object()) {
                    for (db, refs) in other.iter() {
                        parse_role_refs(Some(refs), db, &holder, &mut roles, &mut warnings);
                    }
                }
            }
            let mut privileges = Vec::new();
            parse_privileges(doc.get("privileges"), &holder, &mut privileges, &mut warnings);
            return Ok((Self { name, credentials, roles, privileges, schema_version }, warnings));
        }

        let db = required_str(doc, "db", "user")?;
        let name = UserName::new(user, db);
        let holder = name.full_name();
        let credentials = match doc.get("credentials") {
            Some(c @ Value::Object(m)) if !m.is_empty() => Some(c.clone()),
            _ => None,
        };
        let mut roles = Vec::new();
        parse_role_refs(doc.get("roles"), db, &holder, &mut roles, &mut warnings);
        Ok((Self { name, credentials, roles, privileges: Vec::new(), schema_version }, warnings))
    }

    /// Externally-authenticated users legitimately have no stored credentials.
    pub fn expects_credentials(&self) -> bool { self.name.db() != EXTERNAL_DB }
}

/// The stored record for one role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDocument {
    pub name: RoleName,
    pub roles: Vec<RoleName>,
    pub privileges: Vec<Privilege>,
}

impl RoleDocument {
    pub fn parse(doc: &Value) -> AuthzResult<(Self, Vec<Warning>)> {
        if !doc.is_object() {
            return Err(AuthzError::parse("role document must be an object"));
        }
        let role = required_str(doc, "role", "role")?;
        let db = required_str(doc, "db", "role")?;
        let name = RoleName::new(role, db);
        let holder = name.full_name();
        let mut warnings = Vec::new();
        let mut roles = Vec::new();
        parse_role_refs(doc.get("roles"), db, &holder, &mut roles, &mut warnings);
        let mut privileges = Vec::new();
        parse_privileges(doc.get("privileges"), &holder, &mut privileges, &mut warnings);
        Ok((Self { name, roles, privileges }, warnings))
    }

    pub fn to_document(&self) -> Value {
        json!({
            "_id": self.name.doc_id(),
            "role": self.name.role(),
            "db": self.name.db(),
            "roles": self.roles.iter().map(|r| r.to_reference()).collect::<Vec<_>>(),
            "privileges": self.privileges.iter().map(|p| p.to_document()).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
#[path = "documents_tests.rs"]
mod documents_tests;

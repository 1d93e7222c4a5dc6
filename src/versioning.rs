//! Privilege document versioning bridge.
//!
//! Schema version 1 keeps one combined document per user in `<db>.system.users`,
//! with inline privileges. Version 2 keeps every user in `admin.system.users` and
//! every role in `admin.system.roles`. The active version is recorded in
//! `admin.system.version` under `_id: "authSchema"`; callers read it and pass it in,
//! nothing here guesses.

use serde_json::{json, Value};

use crate::error::{AuthzError, AuthzResult};
use crate::model::PrivilegeDocument;
use crate::names::{NamespaceString, UserName};

pub const SCHEMA_VERSION_LEGACY: u32 = 1;
pub const SCHEMA_VERSION_UNIFIED: u32 = 2;
/// Highest version this crate can read.
pub const SCHEMA_VERSION_CURRENT: u32 = SCHEMA_VERSION_UNIFIED;

pub const AUTH_SCHEMA_DOC_ID: &str = "authSchema";
pub const AUTH_SCHEMA_VERSION_FIELD: &str = "currentVersion";

pub fn is_known_version(version: u32) -> bool {
    (SCHEMA_VERSION_LEGACY..=SCHEMA_VERSION_CURRENT).contains(&version)
}

fn check_version(version: u32) -> AuthzResult<()> {
    if is_known_version(version) {
        Ok(())
    } else {
        Err(AuthzError::bad_value(format!("unsupported authorization schema version {}", version)))
    }
}

/// Collection holding user documents under `version`, for users of `db`.
pub fn users_namespace(db: &str, version: u32) -> AuthzResult<NamespaceString> {
    check_version(version)?;
    if version == SCHEMA_VERSION_LEGACY {
        Ok(NamespaceString::legacy_users(db))
    } else {
        Ok(NamespaceString::admin_users())
    }
}

/// Where and how to find the privilege document of `user` under `version`.
pub fn privilege_document_lookup(user: &UserName, version: u32) -> AuthzResult<(NamespaceString, Value)> {
    let ns = users_namespace(user.db(), version)?;
    let query = if version == SCHEMA_VERSION_LEGACY {
        // userSource marks delegated credentials in the legacy layout; those are not this user's document
        json!({ "user": user.user(), "userSource": Value::Null })
    } else {
        json!({ "user": user.user(), "db": user.db() })
    };
    Ok((ns, query))
}

/// Prepare a new user document for `db` under `version`: returns the document to
/// store and the query that finds any existing document for the same user.
/// Unified documents without an `_id` get `db.user`.
pub fn prepare_privilege_document(doc: &Value, db: &str, version: u32) -> AuthzResult<(Value, Value, UserName)> {
    check_version(version)?;
    let Some(user) = doc.get("user").and_then(|v| v.as_str()).filter(|u| !u.is_empty()) else {
        return Err(AuthzError::parse(format!("user document has no \"user\" field: {}", doc)));
    };
    if version == SCHEMA_VERSION_LEGACY {
        let name = UserName::new(user, db);
        let source = doc.get("userSource").cloned().unwrap_or(Value::Null);
        return Ok((doc.clone(), json!({ "user": user, "userSource": source }), name));
    }
    let user_db = doc.get("db").and_then(|v| v.as_str()).unwrap_or(db);
    let name = UserName::new(user, user_db);
    let mut out = doc.clone();
    if let Some(m) = out.as_object_mut() {
        m.entry("db").or_insert_with(|| json!(user_db));
        m.entry("_id").or_insert_with(|| json!(name.doc_id()));
    }
    let query = json!({ "user": user, "db": user_db });
    Ok((out, query, name))
}

pub fn schema_version_query() -> Value { json!({ "_id": AUTH_SCHEMA_DOC_ID }) }

/// Read the version out of an `authSchema` document.
pub fn schema_version_from_document(doc: &Value) -> AuthzResult<u32> {
    let Some(raw) = doc.get(AUTH_SCHEMA_VERSION_FIELD) else {
        return Err(AuthzError::parse(format!("{} document has no {} field", AUTH_SCHEMA_DOC_ID, AUTH_SCHEMA_VERSION_FIELD)));
    };
    let version = raw
        .as_u64()
        .or_else(|| raw.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| AuthzError::parse(format!("{} must be a whole number, found {}", AUTH_SCHEMA_VERSION_FIELD, raw)))?;
    let version = u32::try_from(version).map_err(|_| AuthzError::unsupported(format!("authorization schema version {} is out of range", version)))?;
    if !is_known_version(version) {
        return Err(AuthzError::unsupported(format!(
            "authorization schema version {} is not supported; expected {}..={}",
            version, SCHEMA_VERSION_LEGACY, SCHEMA_VERSION_CURRENT
        )));
    }
    Ok(version)
}

pub fn schema_version_document(version: u32) -> Value {
    json!({ "_id": AUTH_SCHEMA_DOC_ID, AUTH_SCHEMA_VERSION_FIELD: version })
}

/// Render a parsed user in the unified layout. Inline legacy privileges have no
/// place there and are dropped; credentials and role grants carry over.
pub fn to_unified_document(doc: &PrivilegeDocument) -> Value {
    json!({
        "_id": doc.name.doc_id(),
        "user": doc.name.user(),
        "db": doc.name.db(),
        "credentials": doc.credentials.clone().unwrap_or_else(|| json!({})),
        "roles": doc.roles.iter().map(|r| r.to_reference()).collect::<Vec<_>>(),
    })
}

/// Convert a legacy document read from `<source_db>.system.users`.
pub fn upgrade_legacy_document(doc: &Value, source_db: &str) -> AuthzResult<Value> {
    let (parsed, _warnings) = PrivilegeDocument::parse(doc, SCHEMA_VERSION_LEGACY, source_db)?;
    Ok(to_unified_document(&parsed))
}

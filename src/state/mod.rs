//!
//! authz external state
//! --------------------
//! `AuthzManagerExternalState` is everything the authorization manager needs from
//! the outside world: collection access for the authorization collections, the
//! update lock, the versioned privilege-document lookup and description resolution.
//!
//! Implementors provide the storage primitives and the lock; the versioning bridge,
//! the resolver and the privilege-document administration are provided on top of
//! them. `log_op` is an optional replication hook and does nothing by default.

use serde_json::{json, Value};
use tracing::info;

use crate::error::{AuthzError, AuthzResult};
use crate::model::{Description, Document};
use crate::names::{NamespaceString, RoleName, UserName};
use crate::oplog::OpType;
use crate::resolver;
use crate::versioning::{
    is_known_version, prepare_privilege_document, privilege_document_lookup, schema_version_document, schema_version_from_document, schema_version_query,
    users_namespace, SCHEMA_VERSION_LEGACY,
};
use crate::write_concern::WriteConcern;

mod local;

pub use local::LocalExternalState;

pub trait AuthzManagerExternalState: Send + Sync {
    // --- document store ---

    /// First document in `ns` matching `query`, or `NoMatchingDocument`.
    fn find_one(&self, ns: &NamespaceString, query: &Document) -> AuthzResult<Document>;

    /// Calls `visitor` once per matching document. Order is storage-defined.
    fn query(&self, ns: &NamespaceString, query: &Document, projection: &Document, visitor: &mut dyn FnMut(&Document)) -> AuthzResult<()>;

    fn insert(&self, ns: &NamespaceString, doc: &Document, wc: &WriteConcern) -> AuthzResult<()>;

    /// Returns the number of documents updated, counting an upserted one.
    fn update(&self, ns: &NamespaceString, query: &Document, update: &Document, upsert: bool, multi: bool, wc: &WriteConcern) -> AuthzResult<usize>;

    /// Update a single document; `NoMatchingDocument` if nothing matched and `upsert` is off.
    fn update_one(&self, ns: &NamespaceString, query: &Document, update: &Document, upsert: bool, wc: &WriteConcern) -> AuthzResult<()> {
        let n = self.update(ns, query, update, upsert, false, wc)?;
        if n == 0 {
            return Err(AuthzError::no_match(format!("no document in {} matches {}", ns, query)));
        }
        Ok(())
    }

    fn remove(&self, ns: &NamespaceString, query: &Document, wc: &WriteConcern) -> AuthzResult<usize>;

    fn create_index(&self, ns: &NamespaceString, pattern: &Document, unique: bool, wc: &WriteConcern) -> AuthzResult<()>;

    fn drop_collection(&self, ns: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()>;

    /// Replaces `to` if it already exists.
    fn rename_collection(&self, from: &NamespaceString, to: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()>;

    /// Fails with `NamespaceExists` if `to` already exists.
    fn copy_collection(&self, from: &NamespaceString, to: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()>;

    fn get_all_database_names(&self) -> AuthzResult<Vec<String>>;

    // --- update lock ---

    /// Non-blocking; false if another writer holds the lock.
    fn try_acquire_authz_update_lock(&self, reason: &str) -> bool;

    /// Must only be called by the current holder.
    fn release_authz_update_lock(&self);

    // --- schema version ---

    /// Version assumed when no `authSchema` document exists.
    fn default_schema_version(&self) -> u32 { SCHEMA_VERSION_LEGACY }

    /// Read the `authSchema` document from `admin.system.version`.
    fn get_schema_version(&self) -> AuthzResult<u32> {
        match self.find_one(&NamespaceString::admin_version(), &schema_version_query()) {
            Ok(doc) => schema_version_from_document(&doc),
            Err(AuthzError::NoMatchingDocument { .. }) => Ok(self.default_schema_version()),
            Err(e) => Err(e),
        }
    }

    /// The version descriptions and privilege documents are read with.
    fn active_schema_version(&self) -> AuthzResult<u32> { self.get_schema_version() }

    /// Record `version` in `admin.system.version`. The caller holds the update lock.
    fn set_schema_version(&self, version: u32, wc: &WriteConcern) -> AuthzResult<()> { write_schema_version(self, version, wc) }

    /// One-time startup work. Fails if the stored schema version is unreadable.
    fn initialize(&self) -> AuthzResult<()> { self.get_schema_version().map(|_| ()) }

    // --- versioning bridge ---

    /// The stored document for `user` under `schema_version`, or `UserNotFound`.
    fn get_privilege_document(&self, user: &UserName, schema_version: u32) -> AuthzResult<Document> {
        let (ns, query) = privilege_document_lookup(user, schema_version)?;
        match self.find_one(&ns, &query) {
            Ok(doc) => Ok(doc),
            Err(e) if e.is_not_found() => Err(AuthzError::user_not_found(format!("Could not find user {} (schema version {})", user, schema_version))),
            Err(e) => Err(e),
        }
    }

    /// Every legacy-layout user document stored in `<db>.system.users`.
    fn get_all_v1_privilege_docs_for_db(&self, db: &str) -> AuthzResult<Vec<Document>> {
        let mut out = Vec::new();
        self.query(&NamespaceString::legacy_users(db), &json!({}), &Value::Null, &mut |d| out.push(d.clone()))?;
        Ok(out)
    }

    /// True if any user document exists in either layout.
    fn has_any_privilege_documents(&self) -> AuthzResult<bool> {
        let present = |ns: &NamespaceString| match self.find_one(ns, &json!({})) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        };
        if present(&NamespaceString::admin_users())? {
            return Ok(true);
        }
        for db in self.get_all_database_names()? {
            if present(&NamespaceString::legacy_users(&db))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // --- privilege document administration (caller holds the update lock) ---

    /// Store a new user document for a user of `db`, in the layout of the active version.
    fn insert_privilege_document(&self, db: &str, user_obj: &Document, wc: &WriteConcern) -> AuthzResult<()> {
        let version = self.active_schema_version()?;
        let ns = users_namespace(db, version)?;
        let (doc, existing, name) = prepare_privilege_document(user_obj, db, version)?;
        let already_exists = || AuthzError::duplicate_key(format!("User \"{}\" already exists", name));
        match self.find_one(&ns, &existing) {
            Ok(_) => return Err(already_exists()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match self.insert(&ns, &doc, wc) {
            Ok(()) => {}
            Err(AuthzError::DuplicateKey { .. }) => return Err(already_exists()),
            Err(e) => return Err(e),
        }
        info!(target: "authz::admin", "inserted privilege document for {} into {}", name, ns);
        self.log_op(OpType::Insert, &ns, &doc, None);
        Ok(())
    }

    /// Apply `update` to the document of `user`; `UserNotFound` if it does not exist.
    fn update_privilege_document(&self, user: &UserName, update: &Document, wc: &WriteConcern) -> AuthzResult<()> {
        let version = self.active_schema_version()?;
        let (ns, query) = privilege_document_lookup(user, version)?;
        match self.update_one(&ns, &query, update, false, wc) {
            Ok(()) => {}
            Err(AuthzError::NoMatchingDocument { .. }) => return Err(AuthzError::user_not_found(format!("User {} not found", user))),
            Err(e) => return Err(e),
        }
        info!(target: "authz::admin", "updated privilege document of {} in {}", user, ns);
        self.log_op(OpType::Update, &ns, update, Some(&query));
        Ok(())
    }

    /// Remove every user document of `db` matching `query`; returns how many went.
    fn remove_privilege_documents(&self, db: &str, query: &Document, wc: &WriteConcern) -> AuthzResult<usize> {
        let version = self.active_schema_version()?;
        let ns = users_namespace(db, version)?;
        let n = self.remove(&ns, query, wc)?;
        info!(target: "authz::admin", "removed {} privilege document(s) from {}", n, ns);
        if n > 0 {
            self.log_op(OpType::Delete, &ns, query, None);
        }
        Ok(n)
    }

    // --- descriptions ---

    fn get_user_description(&self, user: &UserName) -> AuthzResult<Description> { resolver::describe_user(self, user) }

    fn get_role_description(&self, role: &RoleName) -> AuthzResult<Description> { resolver::describe_role(self, role) }

    // --- replication hook ---

    /// Called after each successful authorization mutation. No-op unless overridden.
    fn log_op(&self, _op: OpType, _ns: &NamespaceString, _o: &Document, _o2: Option<&Document>) {}
}

/// Shared body of `set_schema_version` for implementors that override it.
pub fn write_schema_version<S>(state: &S, version: u32, wc: &WriteConcern) -> AuthzResult<()>
where
    S: AuthzManagerExternalState + ?Sized,
{
    if !is_known_version(version) {
        return Err(AuthzError::bad_value(format!("cannot set unsupported authorization schema version {}", version)));
    }
    let ns = NamespaceString::admin_version();
    let doc = schema_version_document(version);
    state.update_one(&ns, &schema_version_query(), &doc, true, wc)?;
    info!(target: "authz::admin", "authorization schema version set to {}", version);
    state.log_op(OpType::Update, &ns, &doc, Some(&schema_version_query()));
    Ok(())
}

//!
//! authz storage module
//! --------------------
//! An in-memory, collection-oriented document store that implements the storage
//! side of the external-state contract: find/query/insert/update/remove,
//! unique indexes, drop/rename/copy of whole collections, and optional JSON
//! snapshot persistence.
//!
//! Documents are JSON objects. Every write carries a `WriteConcern`; a journaled
//! write on a store with a snapshot path is flushed to disk before it returns.
//! Readers take the shared side of the collections lock and copy results out, so
//! visitors and callers never hold references into the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AuthzError, AuthzResult};
use crate::names::NamespaceString;
use crate::write_concern::WriteConcern;

mod docpath;
mod matcher;
mod update;
mod projection;
mod collection;
mod snapshot;

pub use collection::{Collection, IndexSpec};
pub use matcher::matches;

/// A forced failure for reads of one namespace, used to exercise error paths.
#[derive(Debug, Clone)]
struct FailPoint {
    ns: NamespaceString,
    message: String,
}

pub struct MemoryStore {
    collections: RwLock<HashMap<NamespaceString, Collection>>,
    snapshot_path: Option<PathBuf>,
    last_write_concern: Mutex<Option<WriteConcern>>,
    read_fail_point: RwLock<Option<FailPoint>>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            snapshot_path: None,
            last_write_concern: Mutex::new(None),
            read_fail_point: RwLock::new(None),
        }
    }

    /// Open a store backed by `path`, loading the snapshot if the file exists.
    pub fn with_snapshot(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let loaded = snapshot::load(&path)?;
        info!(target: "authz::store", "opened snapshot '{}' collections={}", path.display(), loaded.len());
        Ok(Self { collections: RwLock::new(loaded), snapshot_path: Some(path), ..Self::new() })
    }

    pub fn snapshot_path(&self) -> Option<&Path> { self.snapshot_path.as_deref() }

    /// Write the current contents to the snapshot path, if one is configured.
    pub fn save_snapshot(&self) -> anyhow::Result<()> {
        let Some(path) = &self.snapshot_path else { return Ok(()); };
        let guard = self.collections.read();
        snapshot::save(path, &guard)
    }

    /// Write the current contents to an arbitrary file.
    pub fn save_snapshot_to(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let guard = self.collections.read();
        snapshot::save(path.as_ref(), &guard)
    }

    /// The write concern of the most recent write, as received.
    pub fn last_write_concern(&self) -> Option<WriteConcern> { self.last_write_concern.lock().clone() }

    /// Make every read of `ns` fail with a storage error until cleared.
    pub fn set_read_fail_point(&self, ns: NamespaceString, message: impl Into<String>) {
        *self.read_fail_point.write() = Some(FailPoint { ns, message: message.into() });
    }

    pub fn clear_read_fail_point(&self) { *self.read_fail_point.write() = None; }

    fn check_read(&self, ns: &NamespaceString) -> AuthzResult<()> {
        match &*self.read_fail_point.read() {
            Some(fp) if fp.ns == *ns => Err(AuthzError::storage(fp.message.clone())),
            _ => Ok(()),
        }
    }

    fn after_write(&self, wc: &WriteConcern) -> AuthzResult<()> {
        *self.last_write_concern.lock() = Some(wc.clone());
        if wc.journal && self.snapshot_path.is_some() {
            self.save_snapshot()?;
        }
        Ok(())
    }

    pub fn find_one(&self, ns: &NamespaceString, query: &Value) -> AuthzResult<Value> {
        self.check_read(ns)?;
        let guard = self.collections.read();
        let found = match guard.get(ns) {
            Some(c) => c.find(query)?.into_iter().next().cloned(),
            None => None,
        };
        debug!(target: "authz::store", "find_one ns='{}' query={} found={}", ns, query, found.is_some());
        found.ok_or_else(|| AuthzError::no_match(format!("no document in {} matches {}", ns, query)))
    }

    /// Invoke `visitor` once per matching document, after projection.
    pub fn query(&self, ns: &NamespaceString, query: &Value, projection: &Value, visitor: &mut dyn FnMut(&Value)) -> AuthzResult<()> {
        self.check_read(ns)?;
        let results: Vec<Value> = {
            let guard = self.collections.read();
            match guard.get(ns) {
                Some(c) => c.find(query)?.into_iter().map(|d| projection::project(d, projection)).collect::<AuthzResult<_>>()?,
                None => Vec::new(),
            }
        };
        debug!(target: "authz::store", "query ns='{}' query={} results={}", ns, query, results.len());
        for doc in results.iter() { visitor(doc); }
        Ok(())
    }

    pub fn count(&self, ns: &NamespaceString, query: &Value) -> AuthzResult<usize> {
        self.check_read(ns)?;
        let guard = self.collections.read();
        match guard.get(ns) {
            Some(c) => Ok(c.find(query)?.len()),
            None => Ok(0),
        }
    }

    pub fn insert(&self, ns: &NamespaceString, doc: &Value, wc: &WriteConcern) -> AuthzResult<()> {
        {
            let mut guard = self.collections.write();
            guard.entry(ns.clone()).or_default().insert(doc.clone())?;
        }
        debug!(target: "authz::store", "insert ns='{}'", ns);
        self.after_write(wc)
    }

    pub fn update(&self, ns: &NamespaceString, query: &Value, update: &Value, upsert: bool, multi: bool, wc: &WriteConcern) -> AuthzResult<usize> {
        let n = {
            let mut guard = self.collections.write();
            match guard.get_mut(ns) {
                Some(c) => c.update(query, update, upsert, multi)?,
                None if upsert => guard.entry(ns.clone()).or_default().update(query, update, upsert, multi)?,
                None => 0,
            }
        };
        debug!(target: "authz::store", "update ns='{}' query={} upsert={} multi={} n={}", ns, query, upsert, multi, n);
        self.after_write(wc)?;
        Ok(n)
    }

    pub fn remove(&self, ns: &NamespaceString, query: &Value, wc: &WriteConcern) -> AuthzResult<usize> {
        let n = {
            let mut guard = self.collections.write();
            match guard.get_mut(ns) {
                Some(c) => c.remove(query)?,
                None => 0,
            }
        };
        debug!(target: "authz::store", "remove ns='{}' query={} n={}", ns, query, n);
        self.after_write(wc)?;
        Ok(n)
    }

    pub fn create_index(&self, ns: &NamespaceString, pattern: &Value, unique: bool, wc: &WriteConcern) -> AuthzResult<()> {
        let spec = IndexSpec::from_pattern(pattern, unique)?;
        let name = spec.name.clone();
        {
            let mut guard = self.collections.write();
            guard.entry(ns.clone()).or_default().create_index(spec)?;
        }
        info!(target: "authz::store", "create_index ns='{}' index='{}' unique={}", ns, name, unique);
        self.after_write(wc)
    }

    pub fn drop_collection(&self, ns: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()> {
        let removed = self.collections.write().remove(ns);
        if removed.is_none() {
            return Err(AuthzError::ns_not_found(format!("ns not found: {}", ns)));
        }
        info!(target: "authz::store", "drop_collection ns='{}'", ns);
        self.after_write(wc)
    }

    /// Move `from` to `to`, replacing any existing `to`.
    pub fn rename_collection(&self, from: &NamespaceString, to: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()> {
        {
            let mut guard = self.collections.write();
            let Some(c) = guard.remove(from) else {
                return Err(AuthzError::ns_not_found(format!("source namespace does not exist: {}", from)));
            };
            guard.insert(to.clone(), c);
        }
        info!(target: "authz::store", "rename_collection from='{}' to='{}'", from, to);
        self.after_write(wc)
    }

    /// Copy documents and indexes of `from` into a new collection `to`.
    pub fn copy_collection(&self, from: &NamespaceString, to: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()> {
        {
            let mut guard = self.collections.write();
            if guard.contains_key(to) {
                return Err(AuthzError::ns_exists(format!("copy target already exists: {}", to)));
            }
            let Some(c) = guard.get(from).cloned() else {
                return Err(AuthzError::ns_not_found(format!("source namespace does not exist: {}", from)));
            };
            guard.insert(to.clone(), c);
        }
        info!(target: "authz::store", "copy_collection from='{}' to='{}'", from, to);
        self.after_write(wc)
    }

    pub fn collection_exists(&self, ns: &NamespaceString) -> bool { self.collections.read().contains_key(ns) }

    /// Every database with at least one collection, sorted.
    pub fn database_names(&self) -> Vec<String> {
        let mut dbs: Vec<String> = self.collections.read().keys().map(|ns| ns.db().to_string()).collect();
        dbs.sort();
        dbs.dedup();
        dbs
    }

    pub fn collection_names(&self, db: &str) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().filter(|ns| ns.db() == db).map(|ns| ns.coll().to_string()).collect();
        names.sort();
        names
    }
}

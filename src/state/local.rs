//! External state over the in-process `MemoryStore`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::AuthzConfig;
use crate::error::AuthzResult;
use crate::lock::UpdateLock;
use crate::model::Document;
use crate::names::NamespaceString;
use crate::oplog::{OpObserver, OpType};
use crate::storage::MemoryStore;
use crate::write_concern::WriteConcern;

use super::{write_schema_version, AuthzManagerExternalState};

/// Owned by the authorization manager; share it by reference or `Arc`.
pub struct LocalExternalState {
    store: Arc<MemoryStore>,
    lock: Arc<UpdateLock>,
    config: AuthzConfig,
    /// Set by `initialize` and kept current by `set_schema_version`.
    schema_version: RwLock<Option<u32>>,
    observer: RwLock<Option<Arc<dyn OpObserver>>>,
    unlocked_writes: AtomicUsize,
}

impl LocalExternalState {
    /// Build from `config`, opening the snapshot file when one is configured.
    pub fn new(config: AuthzConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let store = match &config.snapshot_path {
            Some(p) => MemoryStore::with_snapshot(p)?,
            None => MemoryStore::new(),
        };
        Ok(Self::with_store(Arc::new(store), config))
    }

    pub fn with_store(store: Arc<MemoryStore>, config: AuthzConfig) -> Self {
        let lock = Arc::new(UpdateLock::new(config.lock_name.clone()));
        Self { store, lock, config, schema_version: RwLock::new(None), observer: RwLock::new(None), unlocked_writes: AtomicUsize::new(0) }
    }

    /// Use an existing lock, e.g. `global_update_lock()`, instead of a private one.
    pub fn with_lock(mut self, lock: Arc<UpdateLock>) -> Self {
        self.lock = lock;
        self
    }

    pub fn set_observer(&self, observer: Arc<dyn OpObserver>) { *self.observer.write() = Some(observer); }

    pub fn store(&self) -> &Arc<MemoryStore> { &self.store }

    pub fn update_lock(&self) -> &Arc<UpdateLock> { &self.lock }

    pub fn config(&self) -> &AuthzConfig { &self.config }

    /// The configured default write concern for administrative writes.
    pub fn write_concern(&self) -> &WriteConcern { &self.config.write_concern }

    /// Writes to authorization collections made without the update lock held.
    pub fn unlocked_write_count(&self) -> usize { self.unlocked_writes.load(Ordering::Relaxed) }

    fn note_unlocked_write(&self, ns: &NamespaceString, what: &str) {
        if (ns.is_authz_collection() || ns.is_system_users()) && !self.lock.is_held() {
            self.unlocked_writes.fetch_add(1, Ordering::Relaxed);
            warn!(target: "authz::admin", "{} on {} without holding the authorization update lock", what, ns);
        }
    }
}

impl AuthzManagerExternalState for LocalExternalState {
    fn find_one(&self, ns: &NamespaceString, query: &Document) -> AuthzResult<Document> { self.store.find_one(ns, query) }

    fn query(&self, ns: &NamespaceString, query: &Document, projection: &Document, visitor: &mut dyn FnMut(&Document)) -> AuthzResult<()> {
        self.store.query(ns, query, projection, visitor)
    }

    fn insert(&self, ns: &NamespaceString, doc: &Document, wc: &WriteConcern) -> AuthzResult<()> {
        self.note_unlocked_write(ns, "insert");
        self.store.insert(ns, doc, wc)
    }

    fn update(&self, ns: &NamespaceString, query: &Document, update: &Document, upsert: bool, multi: bool, wc: &WriteConcern) -> AuthzResult<usize> {
        self.note_unlocked_write(ns, "update");
        self.store.update(ns, query, update, upsert, multi, wc)
    }

    fn remove(&self, ns: &NamespaceString, query: &Document, wc: &WriteConcern) -> AuthzResult<usize> {
        self.note_unlocked_write(ns, "remove");
        self.store.remove(ns, query, wc)
    }

    fn create_index(&self, ns: &NamespaceString, pattern: &Document, unique: bool, wc: &WriteConcern) -> AuthzResult<()> {
        self.note_unlocked_write(ns, "createIndex");
        self.store.create_index(ns, pattern, unique, wc)
    }

    fn drop_collection(&self, ns: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()> {
        self.note_unlocked_write(ns, "drop");
        self.store.drop_collection(ns, wc)
    }

    fn rename_collection(&self, from: &NamespaceString, to: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()> {
        self.note_unlocked_write(from, "renameCollection");
        self.note_unlocked_write(to, "renameCollection");
        self.store.rename_collection(from, to, wc)
    }

    fn copy_collection(&self, from: &NamespaceString, to: &NamespaceString, wc: &WriteConcern) -> AuthzResult<()> {
        self.note_unlocked_write(to, "copyCollection");
        self.store.copy_collection(from, to, wc)
    }

    fn get_all_database_names(&self) -> AuthzResult<Vec<String>> { Ok(self.store.database_names()) }

    fn try_acquire_authz_update_lock(&self, reason: &str) -> bool { self.lock.try_acquire(reason) }

    fn release_authz_update_lock(&self) { self.lock.release() }

    fn default_schema_version(&self) -> u32 { self.config.default_schema_version }

    fn active_schema_version(&self) -> AuthzResult<u32> {
        if let Some(v) = *self.schema_version.read() {
            return Ok(v);
        }
        self.get_schema_version()
    }

    fn set_schema_version(&self, version: u32, wc: &WriteConcern) -> AuthzResult<()> {
        write_schema_version(self, version, wc)?;
        *self.schema_version.write() = Some(version);
        Ok(())
    }

    fn initialize(&self) -> AuthzResult<()> {
        let version = self.get_schema_version()?;
        *self.schema_version.write() = Some(version);
        info!(target: "authz::admin", "authorization external state initialized: schema version {}, lock '{}'", version, self.lock.name());
        Ok(())
    }

    fn log_op(&self, op: OpType, ns: &NamespaceString, o: &Document, o2: Option<&Document>) {
        debug!(target: "authz::admin", "log_op op={} ns='{}'", op, ns);
        let observer = self.observer.read().clone();
        if let Some(obs) = observer {
            obs.on_op(op, ns, o, o2);
        }
    }
}

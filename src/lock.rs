//! Update serialization lock for the authorization collections.
//!
//! Writers acquire it with a reason string before touching `admin.system.users`,
//! `admin.system.roles` or `admin.system.version` (or a legacy `<db>.system.users`),
//! and release it when done. Acquisition never blocks. Readers never touch it.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AuthzError, AuthzResult};

pub struct UpdateLock {
    name: String,
    holder: Mutex<Option<String>>,
}

impl UpdateLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), holder: Mutex::new(None) }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Returns false immediately if someone else holds the lock.
    pub fn try_acquire(&self, reason: &str) -> bool {
        let mut holder = self.holder.lock();
        if let Some(current) = holder.as_ref() {
            debug!(target: "authz::lock", "lock '{}' busy: held for '{}', wanted for '{}'", self.name, current, reason);
            return false;
        }
        *holder = Some(reason.to_string());
        info!(target: "authz::lock", "lock '{}' acquired: {}", self.name, reason);
        true
    }

    /// Panics if the lock is not held; releasing someone else's lock is a programming error.
    pub fn release(&self) {
        let mut holder = self.holder.lock();
        match holder.take() {
            Some(reason) => info!(target: "authz::lock", "lock '{}' released: {}", self.name, reason),
            None => panic!("release of authorization update lock '{}' which is not held", self.name),
        }
    }

    pub fn is_held(&self) -> bool { self.holder.lock().is_some() }

    pub fn holder_reason(&self) -> Option<String> { self.holder.lock().clone() }

    /// Scoped acquisition; the lock is released when the guard drops.
    pub fn try_guard(&self, reason: &str) -> Option<UpdateLockGuard<'_>> {
        if self.try_acquire(reason) { Some(UpdateLockGuard { lock: self }) } else { None }
    }

    /// Run `f` while holding the lock, or fail with `LockBusy` without running it.
    pub fn run_exclusive<T>(&self, reason: &str, f: impl FnOnce() -> AuthzResult<T>) -> AuthzResult<T> {
        let Some(_guard) = self.try_guard(reason) else {
            let held_for = self.holder_reason().unwrap_or_default();
            return Err(AuthzError::lock_busy(format!(
                "could not acquire authorization update lock '{}' for '{}': held for '{}'",
                self.name, reason, held_for
            )));
        };
        f()
    }
}

impl std::fmt::Debug for UpdateLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateLock").field("name", &self.name).field("holder", &self.holder_reason()).finish()
    }
}

pub struct UpdateLockGuard<'a> {
    lock: &'a UpdateLock,
}

impl Drop for UpdateLockGuard<'_> {
    fn drop(&mut self) { self.lock.release(); }
}

pub const DEFAULT_LOCK_NAME: &str = "authz";

static GLOBAL_UPDATE_LOCK: OnceCell<Arc<UpdateLock>> = OnceCell::new();

fn init_in(cell: &OnceCell<Arc<UpdateLock>>, name: &str) -> Arc<UpdateLock> {
    let lock = cell.get_or_init(|| Arc::new(UpdateLock::new(name)));
    if lock.name() != name {
        warn!(target: "authz::lock", "update lock already created as '{}'; ignoring name '{}'", lock.name(), name);
    }
    lock.clone()
}

/// Create the process-wide lock under `name`. Only the first call (or the first
/// `global_update_lock()`) decides the name.
pub fn init_global_update_lock(name: &str) -> Arc<UpdateLock> { init_in(&GLOBAL_UPDATE_LOCK, name) }

/// The process-wide lock instance, named `authz` unless initialized otherwise.
pub fn global_update_lock() -> Arc<UpdateLock> {
    GLOBAL_UPDATE_LOCK.get_or_init(|| Arc::new(UpdateLock::new(DEFAULT_LOCK_NAME))).clone()
}

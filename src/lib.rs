pub mod error;
pub mod names;
pub mod model;
pub mod write_concern;
pub mod storage;
pub mod lock;
pub mod versioning;
pub mod resolver;
pub mod oplog;
pub mod config;
pub mod state;

pub use error::{AuthzError, AuthzResult};
pub use names::{NamespaceString, RoleName, UserName};
pub use model::{Description, Document, Privilege, PrivilegeSet, ResourcePattern, Warning, WarningKind};
pub use lock::{global_update_lock, init_global_update_lock, UpdateLock};
pub use state::{AuthzManagerExternalState, LocalExternalState};
pub use write_concern::WriteConcern;

// Test-only printing helper: expands to tprintln! during tests and is absent otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}

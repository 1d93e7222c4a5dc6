//! Runtime configuration for the local external state.
//!
//! Values come from an optional JSON file and are then overridden by environment
//! variables: `AUTHZ_SCHEMA_VERSION`, `AUTHZ_LOCK_NAME`, `AUTHZ_SNAPSHOT` and
//! `AUTHZ_WRITE_W` (a node count or `majority`).

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::versioning::{is_known_version, SCHEMA_VERSION_LEGACY};
use crate::write_concern::WriteConcern;

fn default_schema_version() -> u32 { SCHEMA_VERSION_LEGACY }
fn default_lock_name() -> String { "authz".to_string() }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Used when `admin.system.version` has no `authSchema` document.
    #[serde(default = "default_schema_version")]
    pub default_schema_version: u32,
    #[serde(default = "default_lock_name")]
    pub lock_name: String,
    #[serde(default)]
    pub write_concern: WriteConcern,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            default_schema_version: default_schema_version(),
            lock_name: default_lock_name(),
            write_concern: WriteConcern::default(),
            snapshot_path: None,
        }
    }
}

impl AuthzConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let cfg: AuthzConfig = serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("AUTHZ_SCHEMA_VERSION") {
            self.default_schema_version = v.trim().parse().with_context(|| format!("AUTHZ_SCHEMA_VERSION='{}'", v))?;
        }
        if let Some(v) = lookup("AUTHZ_LOCK_NAME").filter(|v| !v.is_empty()) {
            self.lock_name = v;
        }
        if let Some(v) = lookup("AUTHZ_SNAPSHOT").filter(|v| !v.is_empty()) {
            self.snapshot_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("AUTHZ_WRITE_W") {
            let w = match v.trim().parse::<u64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(v.trim().to_string()),
            };
            let mut doc = self.write_concern.to_document();
            doc["w"] = w;
            self.write_concern = WriteConcern::from_document(&doc).map_err(|e| anyhow::anyhow!("AUTHZ_WRITE_W='{}': {}", v, e))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_known_version(self.default_schema_version) {
            anyhow::bail!("default_schema_version {} is not a supported schema version", self.default_schema_version);
        }
        if self.lock_name.is_empty() {
            anyhow::bail!("lock_name must not be empty");
        }
        Ok(())
    }
}

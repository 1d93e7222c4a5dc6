//! JSON snapshot persistence for `MemoryStore`.
//! Written to a temp file and renamed into place so readers never see a torn file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::names::NamespaceString;

use super::collection::Collection;

pub(crate) const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapCollection {
    ns: String,
    #[serde(flatten)]
    collection: Collection,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    created_ms: i64,
    collections: Vec<SnapCollection>,
}

pub(crate) fn save(path: &Path, collections: &HashMap<NamespaceString, Collection>) -> Result<()> {
    let mut entries: Vec<SnapCollection> = collections
        .iter()
        .map(|(ns, c)| SnapCollection { ns: ns.ns(), collection: c.clone() })
        .collect();
    entries.sort_by(|a, b| a.ns.cmp(&b.ns));
    let snap = Snapshot { version: SNAPSHOT_FORMAT_VERSION, created_ms: chrono::Utc::now().timestamp_millis(), collections: entries };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating snapshot dir {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(&snap)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming snapshot into {}", path.display()))?;
    Ok(())
}

/// Missing file → empty store.
pub(crate) fn load(path: &Path) -> Result<HashMap<NamespaceString, Collection>> {
    let mut out = HashMap::new();
    if !path.exists() { return Ok(out); }
    let bytes = std::fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    let snap: Snapshot = serde_json::from_slice(&bytes).with_context(|| format!("parsing snapshot {}", path.display()))?;
    if snap.version != SNAPSHOT_FORMAT_VERSION {
        bail!("unsupported snapshot version {} in {}", snap.version, path.display());
    }
    for entry in snap.collections {
        let ns = NamespaceString::parse(&entry.ns).map_err(|e| anyhow::anyhow!(e))?;
        out.insert(ns, entry.collection);
    }
    Ok(out)
}

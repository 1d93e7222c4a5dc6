//! Durability / acknowledgement policy carried by every write.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AuthzError, AuthzResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgement {
    /// Number of nodes that must acknowledge; 0 is fire-and-forget.
    Nodes(u32),
    Majority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConcern {
    pub w: Acknowledgement,
    /// Wait for the write to reach durable storage before returning.
    #[serde(default)]
    pub journal: bool,
    /// 0 means no timeout.
    #[serde(default)]
    pub wtimeout_ms: u64,
}

impl Default for WriteConcern {
    fn default() -> Self { Self { w: Acknowledgement::Nodes(1), journal: false, wtimeout_ms: 0 } }
}

impl WriteConcern {
    pub fn acknowledged() -> Self { Self::default() }
    pub fn unacknowledged() -> Self { Self { w: Acknowledgement::Nodes(0), ..Self::default() } }
    pub fn majority() -> Self { Self { w: Acknowledgement::Majority, ..Self::default() } }
    pub fn journaled() -> Self { Self { journal: true, ..Self::default() } }

    pub fn is_acknowledged(&self) -> bool { self.w != Acknowledgement::Nodes(0) || self.journal }

    /// `{ w: <n>|"majority", j: <bool>, wtimeout: <ms> }`
    pub fn from_document(doc: &Value) -> AuthzResult<Self> {
        let mut wc = Self::default();
        let Some(m) = doc.as_object() else {
            return Err(AuthzError::bad_value(format!("write concern must be a document: {}", doc)));
        };
        match m.get("w") {
            None => {}
            Some(Value::String(s)) if s == "majority" => wc.w = Acknowledgement::Majority,
            Some(v) => {
                let n = v.as_u64().ok_or_else(|| AuthzError::bad_value(format!("invalid w: {}", v)))?;
                wc.w = Acknowledgement::Nodes(u32::try_from(n).map_err(|_| AuthzError::bad_value(format!("w out of range: {}", n)))?);
            }
        }
        if let Some(j) = m.get("j") {
            wc.journal = j.as_bool().ok_or_else(|| AuthzError::bad_value(format!("invalid j: {}", j)))?;
        }
        if let Some(t) = m.get("wtimeout") {
            wc.wtimeout_ms = t.as_u64().ok_or_else(|| AuthzError::bad_value(format!("invalid wtimeout: {}", t)))?;
        }
        Ok(wc)
    }

    pub fn to_document(&self) -> Value {
        let w = match self.w {
            Acknowledgement::Nodes(n) => json!(n),
            Acknowledgement::Majority => json!("majority"),
        };
        json!({ "w": w, "j": self.journal, "wtimeout": self.wtimeout_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_forms() {
        assert_eq!(WriteConcern::from_document(&json!({})).unwrap(), WriteConcern::default());
        assert_eq!(WriteConcern::from_document(&json!({"w": "majority"})).unwrap(), WriteConcern::majority());
        let wc = WriteConcern::from_document(&json!({"w": 0, "j": true, "wtimeout": 500})).unwrap();
        assert_eq!(wc.w, Acknowledgement::Nodes(0));
        assert!(wc.journal);
        assert_eq!(wc.wtimeout_ms, 500);
        assert!(wc.is_acknowledged());
        assert!(!WriteConcern::unacknowledged().is_acknowledged());
        assert!(WriteConcern::from_document(&json!({"w": "two"})).is_err());
        assert!(WriteConcern::from_document(&json!("w")).is_err());
    }
}

//! Replication notification surface for authorization writes.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::names::NamespaceString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpType {
    Insert,
    Update,
    Delete,
    Command,
}

impl OpType {
    /// Single-letter form used in oplog entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Insert => "i",
            OpType::Update => "u",
            OpType::Delete => "d",
            OpType::Command => "c",
        }
    }
}

impl Display for OpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Receives every successful mutation of the authorization collections.
/// `o` is the document delta; `o2` is the selector for updates.
pub trait OpObserver: Send + Sync {
    fn on_op(&self, _op: OpType, _ns: &NamespaceString, _o: &Value, _o2: Option<&Value>) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpLogEntry {
    pub ts: DateTime<Utc>,
    pub op: OpType,
    pub ns: String,
    pub o: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o2: Option<Value>,
}

/// Keeps every observed op in memory, oldest first.
#[derive(Debug, Default)]
pub struct OpLogRecorder {
    entries: Mutex<Vec<OpLogEntry>>,
}

impl OpLogRecorder {
    pub fn new() -> Self { Self::default() }

    pub fn entries(&self) -> Vec<OpLogEntry> { self.entries.lock().clone() }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }

    pub fn clear(&self) { self.entries.lock().clear(); }
}

impl OpObserver for OpLogRecorder {
    fn on_op(&self, op: OpType, ns: &NamespaceString, o: &Value, o2: Option<&Value>) {
        self.entries.lock().push(OpLogEntry { ts: Utc::now(), op, ns: ns.ns(), o: o.clone(), o2: o2.cloned() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Silent;
    impl OpObserver for Silent {}

    #[test]
    fn recorder_keeps_order_and_selector() {
        let rec = OpLogRecorder::new();
        rec.on_op(OpType::Insert, &NamespaceString::admin_users(), &json!({"user": "a"}), None);
        rec.on_op(OpType::Update, &NamespaceString::admin_users(), &json!({"$set": {"x": 1}}), Some(&json!({"user": "a"})));
        let e = rec.entries();
        assert_eq!(e.len(), 2);
        assert_eq!(e[0].op.as_str(), "i");
        assert_eq!(e[1].o2, Some(json!({"user": "a"})));
        assert!(e[0].ts <= e[1].ts);
        let line = serde_json::to_value(&e[0]).unwrap();
        assert!(line.get("o2").is_none());
        rec.clear();
        assert!(rec.is_empty());
    }

    #[test]
    fn default_observer_is_a_no_op() {
        Silent.on_op(OpType::Command, &NamespaceString::admin_version(), &json!({}), None);
    }
}

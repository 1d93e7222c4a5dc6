use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AuthzError, AuthzResult};

use super::docpath;
use super::matcher::{matches, values_equal};
use super::update;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// `{ user: 1, db: 1 }` → keys `[user, db]`, name `user_1_db_1`.
    pub fn from_pattern(pattern: &Value, unique: bool) -> AuthzResult<Self> {
        let Some(m) = pattern.as_object().filter(|m| !m.is_empty()) else {
            return Err(AuthzError::bad_value(format!("index pattern must be a non-empty document: {}", pattern)));
        };
        let keys: Vec<String> = m.keys().cloned().collect();
        let name = m.iter().map(|(k, v)| format!("{}_{}", k, v)).collect::<Vec<_>>().join("_");
        Ok(Self { name, keys, unique })
    }

    fn key_of(&self, doc: &Value) -> Vec<Value> {
        self.keys.iter().map(|k| docpath::get(doc, k).cloned().unwrap_or(Value::Null)).collect()
    }
}

fn same_key(a: &[Value], b: &[Value]) -> bool { a.iter().zip(b).all(|(x, y)| values_equal(x, y)) }

/// One collection's documents plus its index definitions. `_id` is always unique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub(crate) docs: Vec<Value>,
    #[serde(default)]
    pub(crate) indexes: Vec<IndexSpec>,
}

impl Collection {
    fn unique_specs(&self) -> impl Iterator<Item = IndexSpec> + '_ {
        let id = IndexSpec { name: "_id_".into(), keys: vec!["_id".into()], unique: true };
        std::iter::once(id).chain(self.indexes.iter().filter(|i| i.unique).cloned())
    }

    /// Fails with `DuplicateKey` if `doc` collides with any document other than `skip`.
    fn check_unique(&self, doc: &Value, skip: Option<usize>) -> AuthzResult<()> {
        for spec in self.unique_specs() {
            let key = spec.key_of(doc);
            for (i, other) in self.docs.iter().enumerate() {
                if Some(i) == skip { continue; }
                if same_key(&key, &spec.key_of(other)) {
                    return Err(AuthzError::duplicate_key(format!(
                        "E11000 duplicate key error index: {} dup key: {}",
                        spec.name,
                        Value::Array(key)
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize { self.docs.len() }
    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn find(&self, query: &Value) -> AuthzResult<Vec<&Value>> {
        let mut out = Vec::new();
        for d in self.docs.iter() {
            if matches(d, query)? { out.push(d); }
        }
        Ok(out)
    }

    pub fn insert(&mut self, mut doc: Value) -> AuthzResult<()> {
        let Some(m) = doc.as_object_mut() else {
            return Err(AuthzError::bad_value("can only insert documents"));
        };
        if !m.contains_key("_id") {
            m.insert("_id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        self.check_unique(&doc, None)?;
        self.docs.push(doc);
        Ok(())
    }

    /// Returns the number of documents updated (or inserted, for an upsert).
    pub fn update(&mut self, query: &Value, upd: &Value, upsert: bool, multi: bool) -> AuthzResult<usize> {
        let mut hits = Vec::new();
        for (i, d) in self.docs.iter().enumerate() {
            if matches(d, query)? {
                hits.push(i);
                if !multi { break; }
            }
        }
        if hits.is_empty() {
            if !upsert { return Ok(0); }
            let mut doc = update::upsert_seed(query)?;
            let seed_id = doc.get("_id").cloned();
            update::apply(&mut doc, upd)?;
            if let (Some(id), Some(m)) = (seed_id, doc.as_object_mut()) {
                m.entry("_id").or_insert(id);
            }
            self.insert(doc)?;
            return Ok(1);
        }
        // Stage every change first so a failing document leaves the collection untouched
        let mut staged = Collection { docs: self.docs.clone(), indexes: self.indexes.clone() };
        for &i in hits.iter() { update::apply(&mut staged.docs[i], upd)?; }
        for &i in hits.iter() { staged.check_unique(&staged.docs[i], Some(i))?; }
        self.docs = staged.docs;
        Ok(hits.len())
    }

    pub fn remove(&mut self, query: &Value) -> AuthzResult<usize> {
        let mut flags = Vec::with_capacity(self.docs.len());
        for d in self.docs.iter() { flags.push(matches(d, query)?); }
        let before = self.docs.len();
        let mut it = flags.into_iter();
        self.docs.retain(|_| !it.next().unwrap_or(false));
        Ok(before - self.docs.len())
    }

    pub fn create_index(&mut self, spec: IndexSpec) -> AuthzResult<()> {
        if let Some(existing) = self.indexes.iter().find(|i| i.keys == spec.keys) {
            if existing.unique == spec.unique { return Ok(()); }
            return Err(AuthzError::bad_value(format!("index {} already exists with different options", existing.name)));
        }
        if spec.unique {
            for (i, a) in self.docs.iter().enumerate() {
                let ka = spec.key_of(a);
                if self.docs[i + 1..].iter().any(|b| same_key(&ka, &spec.key_of(b))) {
                    return Err(AuthzError::duplicate_key(format!(
                        "E11000 duplicate key error building index {} dup key: {}",
                        spec.name,
                        Value::Array(ka)
                    )));
                }
            }
        }
        self.indexes.push(spec);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_generates_id_and_enforces_uniqueness() {
        let mut c = Collection::default();
        c.insert(json!({"user": "alice", "db": "app"})).unwrap();
        assert!(c.docs[0]["_id"].is_string());
        c.insert(json!({"_id": 1, "user": "bob"})).unwrap();
        let err = c.insert(json!({"_id": 1.0, "user": "carol"})).unwrap_err();
        assert_eq!(err.code(), 11000);

        c.create_index(IndexSpec::from_pattern(&json!({"user": 1, "db": 1}), true).unwrap()).unwrap();
        assert!(c.insert(json!({"user": "alice", "db": "app"})).is_err());
        c.insert(json!({"user": "alice", "db": "other"})).unwrap();
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn unique_index_rejects_existing_duplicates() {
        let mut c = Collection::default();
        c.insert(json!({"user": "a"})).unwrap();
        c.insert(json!({"user": "a"})).unwrap();
        let spec = IndexSpec::from_pattern(&json!({"user": 1}), true).unwrap();
        assert_eq!(spec.name, "user_1");
        assert!(c.create_index(spec).is_err());
        assert!(c.indexes.is_empty());
    }

    #[test]
    fn update_single_multi_and_upsert() {
        let mut c = Collection::default();
        for i in 0..3 { c.insert(json!({"_id": i, "db": "app", "n": 0})).unwrap(); }
        assert_eq!(c.update(&json!({"db": "app"}), &json!({"$inc": {"n": 1}}), false, false).unwrap(), 1);
        assert_eq!(c.update(&json!({"db": "app"}), &json!({"$inc": {"n": 1}}), false, true).unwrap(), 3);
        assert_eq!(c.docs[0]["n"], 2);
        assert_eq!(c.update(&json!({"db": "none"}), &json!({"$set": {"n": 9}}), false, false).unwrap(), 0);
        assert_eq!(c.update(&json!({"_id": "authSchema"}), &json!({"$set": {"currentVersion": 2}}), true, false).unwrap(), 1);
        let v = c.find(&json!({"_id": "authSchema"})).unwrap();
        assert_eq!(v[0]["currentVersion"], 2);
    }

    #[test]
    fn failed_multi_update_is_all_or_nothing() {
        let mut c = Collection::default();
        c.create_index(IndexSpec::from_pattern(&json!({"k": 1}), true).unwrap()).unwrap();
        c.insert(json!({"_id": 1, "k": 1, "g": "x"})).unwrap();
        c.insert(json!({"_id": 2, "k": 2, "g": "x"})).unwrap();
        assert!(c.update(&json!({"g": "x"}), &json!({"$set": {"k": 5}}), false, true).is_err());
        assert_eq!(c.docs[0]["k"], 1);
        assert_eq!(c.docs[1]["k"], 2);
    }

    #[test]
    fn remove_counts_matches() {
        let mut c = Collection::default();
        for i in 0..4 { c.insert(json!({"_id": i, "even": i % 2 == 0})).unwrap(); }
        assert_eq!(c.remove(&json!({"even": true})).unwrap(), 2);
        assert_eq!(c.len(), 2);
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AuthzError, AuthzResult};

pub type ActionSet = BTreeSet<String>;

/// What a privilege applies to. Empty `db`/`collection` strings mean "any".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourcePattern {
    Cluster,
    AnyResource,
    Namespace { db: String, collection: String },
}

impl ResourcePattern {
    pub fn database(db: impl Into<String>) -> Self {
        ResourcePattern::Namespace { db: db.into(), collection: String::new() }
    }

    pub fn collection(db: impl Into<String>, collection: impl Into<String>) -> Self {
        ResourcePattern::Namespace { db: db.into(), collection: collection.into() }
    }

    pub fn from_document(v: &Value) -> AuthzResult<Self> {
        let Some(m) = v.as_object() else {
            return Err(AuthzError::parse(format!("resource must be a document: {}", v)));
        };
        if m.get("cluster").and_then(|x| x.as_bool()) == Some(true) {
            return Ok(ResourcePattern::Cluster);
        }
        if m.get("anyResource").and_then(|x| x.as_bool()) == Some(true) {
            return Ok(ResourcePattern::AnyResource);
        }
        let db = match m.get("db") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(AuthzError::parse(format!("resource missing string \"db\": {}", v))),
        };
        let collection = match m.get("collection") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(AuthzError::parse(format!("resource \"collection\" must be a string: {}", v))),
        };
        Ok(ResourcePattern::Namespace { db, collection })
    }

    pub fn to_document(&self) -> Value {
        match self {
            ResourcePattern::Cluster => json!({ "cluster": true }),
            ResourcePattern::AnyResource => json!({ "anyResource": true }),
            ResourcePattern::Namespace { db, collection } => json!({ "db": db, "collection": collection }),
        }
    }
}

impl Display for ResourcePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourcePattern::Cluster => write!(f, "<cluster>"),
            ResourcePattern::AnyResource => write!(f, "<any resource>"),
            ResourcePattern::Namespace { db, collection } if collection.is_empty() => write!(f, "{}.*", if db.is_empty() { "*" } else { db }),
            ResourcePattern::Namespace { db, collection } => write!(f, "{}.{}", if db.is_empty() { "*" } else { db }, collection),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub resource: ResourcePattern,
    pub actions: ActionSet,
}

impl Privilege {
    pub fn new<I, S>(resource: ResourcePattern, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { resource, actions: actions.into_iter().map(Into::into).collect() }
    }

    /// `{ resource: {...}, actions: [..] }`; at least one action is required.
    pub fn from_document(v: &Value) -> AuthzResult<Self> {
        let resource = match v.get("resource") {
            Some(r) => ResourcePattern::from_document(r)?,
            None => return Err(AuthzError::parse(format!("privilege missing \"resource\": {}", v))),
        };
        let Some(arr) = v.get("actions").and_then(|a| a.as_array()) else {
            return Err(AuthzError::parse(format!("privilege missing \"actions\" array: {}", v)));
        };
        let mut actions = ActionSet::new();
        for a in arr {
            match a.as_str() {
                Some(s) if !s.is_empty() => { actions.insert(s.to_string()); }
                _ => return Err(AuthzError::parse(format!("privilege action must be a non-empty string: {}", a))),
            }
        }
        if actions.is_empty() {
            return Err(AuthzError::parse(format!("privilege grants no actions on {}", resource)));
        }
        Ok(Self { resource, actions })
    }

    pub fn to_document(&self) -> Value {
        json!({ "resource": self.resource.to_document(), "actions": self.actions.iter().collect::<Vec<_>>() })
    }
}

/// Privileges keyed by resource; adding a privilege for a known resource unions
/// the action sets, so whichever path grants more wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeSet {
    by_resource: BTreeMap<ResourcePattern, ActionSet>,
}

impl PrivilegeSet {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, p: &Privilege) {
        self.by_resource.entry(p.resource.clone()).or_default().extend(p.actions.iter().cloned());
    }

    pub fn add_all<'a, I: IntoIterator<Item = &'a Privilege>>(&mut self, ps: I) {
        for p in ps { self.add(p); }
    }

    pub fn actions_for(&self, resource: &ResourcePattern) -> Option<&ActionSet> { self.by_resource.get(resource) }

    pub fn len(&self) -> usize { self.by_resource.len() }
    pub fn is_empty(&self) -> bool { self.by_resource.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourcePattern, &ActionSet)> { self.by_resource.iter() }

    pub fn to_privileges(&self) -> Vec<Privilege> {
        self.by_resource
            .iter()
            .map(|(r, a)| Privilege { resource: r.clone(), actions: a.clone() })
            .collect()
    }

    pub fn to_document(&self) -> Value {
        Value::Array(self.to_privileges().iter().map(|p| p.to_document()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_forms() {
        assert_eq!(ResourcePattern::from_document(&json!({"cluster": true})).unwrap(), ResourcePattern::Cluster);
        assert_eq!(ResourcePattern::from_document(&json!({"anyResource": true})).unwrap(), ResourcePattern::AnyResource);
        assert_eq!(ResourcePattern::from_document(&json!({"db": "app"})).unwrap(), ResourcePattern::database("app"));
        assert_eq!(
            ResourcePattern::from_document(&json!({"db": "app", "collection": "orders"})).unwrap(),
            ResourcePattern::collection("app", "orders")
        );
        assert!(ResourcePattern::from_document(&json!({"collection": "orders"})).is_err());
        assert!(ResourcePattern::from_document(&json!("app")).is_err());
    }

    #[test]
    fn privilege_requires_actions() {
        assert!(Privilege::from_document(&json!({"resource": {"db": "app"}, "actions": []})).is_err());
        assert!(Privilege::from_document(&json!({"resource": {"db": "app"}})).is_err());
        assert!(Privilege::from_document(&json!({"resource": {"db": "app"}, "actions": [1]})).is_err());
        let p = Privilege::from_document(&json!({"resource": {"db": "app"}, "actions": ["read", "read"]})).unwrap();
        assert_eq!(p.actions.len(), 1);
    }

    #[test]
    fn set_unions_actions_per_resource() {
        let mut set = PrivilegeSet::new();
        set.add(&Privilege::new(ResourcePattern::database("app"), ["read", "write"]));
        set.add(&Privilege::new(ResourcePattern::database("app"), ["dropCollection", "read"]));
        set.add(&Privilege::new(ResourcePattern::Cluster, ["shutdown"]));
        assert_eq!(set.len(), 2);
        let acts: Vec<&str> = set.actions_for(&ResourcePattern::database("app")).unwrap().iter().map(|s| s.as_str()).collect();
        assert_eq!(acts, vec!["dropCollection", "read", "write"]);
    }
}

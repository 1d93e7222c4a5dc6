//! Field projection for `query` results: inclusion (`{a: 1}`) or exclusion
//! (`{a: 0}`) lists; `_id` is included unless explicitly excluded.

use serde_json::{Map, Value};

use crate::error::{AuthzError, AuthzResult};

use super::docpath;

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => true,
    }
}

pub(crate) fn project(doc: &Value, projection: &Value) -> AuthzResult<Value> {
    let spec = match projection {
        Value::Null => return Ok(doc.clone()),
        Value::Object(m) if m.is_empty() => return Ok(doc.clone()),
        Value::Object(m) => m,
        _ => return Err(AuthzError::bad_value(format!("projection must be a document: {}", projection))),
    };
    let include_id = spec.get("_id").map(truthy).unwrap_or(true);
    let fields: Vec<(&String, bool)> = spec.iter().filter(|(k, _)| k.as_str() != "_id").map(|(k, v)| (k, truthy(v))).collect();
    let inclusive = fields.iter().filter(|(_, inc)| *inc).count();
    if inclusive != 0 && inclusive != fields.len() {
        return Err(AuthzError::bad_value("projection cannot mix inclusion and exclusion"));
    }

    if inclusive > 0 {
        let mut out = Value::Object(Map::new());
        if include_id {
            if let Some(id) = doc.get("_id") { docpath::set(&mut out, "_id", id.clone())?; }
        }
        for (path, _) in fields {
            if let Some(v) = docpath::get(doc, path) { docpath::set(&mut out, path, v.clone())?; }
        }
        return Ok(out);
    }

    let mut out = doc.clone();
    if !include_id { docpath::remove(&mut out, "_id"); }
    for (path, _) in fields { docpath::remove(&mut out, path); }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inclusion_and_exclusion() {
        let d = json!({"_id": "app.alice", "user": "alice", "db": "app", "credentials": {"x": 1}});
        assert_eq!(project(&d, &json!({"user": 1, "db": 1})).unwrap(), json!({"_id": "app.alice", "user": "alice", "db": "app"}));
        assert_eq!(project(&d, &json!({"user": 1, "_id": 0})).unwrap(), json!({"user": "alice"}));
        assert_eq!(project(&d, &json!({"credentials": 0})).unwrap(), json!({"_id": "app.alice", "user": "alice", "db": "app"}));
        assert_eq!(project(&d, &json!({})).unwrap(), d);
        assert!(project(&d, &json!({"user": 1, "db": 0})).is_err());
    }
}

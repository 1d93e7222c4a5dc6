//! Update application: whole-document replacement or `$set $unset $inc $push
//! $addToSet $pull` modifiers. `_id` can never change.

use serde_json::{Map, Value};

use crate::error::{AuthzError, AuthzResult};

use super::docpath;
use super::matcher::{matches, values_equal};

pub(crate) fn is_modifier_update(update: &Value) -> AuthzResult<bool> {
    let Some(m) = update.as_object() else {
        return Err(AuthzError::bad_value(format!("update must be a document: {}", update)));
    };
    let ops = m.keys().filter(|k| k.starts_with('$')).count();
    if ops > 0 && ops != m.len() {
        return Err(AuthzError::bad_value("update mixes modifiers and plain fields"));
    }
    Ok(ops > 0 && ops == m.len())
}

fn as_fields<'a>(op: &str, arg: &'a Value) -> AuthzResult<&'a Map<String, Value>> {
    arg.as_object().ok_or_else(|| AuthzError::bad_value(format!("{} needs a document argument", op)))
}

fn array_at<'a>(doc: &'a mut Value, path: &str, op: &str) -> AuthzResult<&'a mut Vec<Value>> {
    if docpath::get(doc, path).is_none() {
        docpath::set(doc, path, Value::Array(Vec::new()))?;
    }
    match docpath::get_mut(doc, path) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(AuthzError::bad_value(format!("{} on non-array field '{}'", op, path))),
    }
}

fn inc(current: Option<&Value>, by: &Value, path: &str) -> AuthzResult<Value> {
    let Value::Number(by_n) = by else {
        return Err(AuthzError::bad_value(format!("$inc on '{}' needs a number", path)));
    };
    let cur = match current {
        None | Some(Value::Null) => return Ok(Value::Number(by_n.clone())),
        Some(Value::Number(n)) => n,
        Some(_) => return Err(AuthzError::bad_value(format!("$inc on non-numeric field '{}'", path))),
    };
    if let (Some(a), Some(b)) = (cur.as_i64(), by_n.as_i64()) {
        if let Some(sum) = a.checked_add(b) { return Ok(Value::from(sum)); }
    }
    let sum = cur.as_f64().unwrap_or(0.0) + by_n.as_f64().unwrap_or(0.0);
    serde_json::Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| AuthzError::bad_value(format!("$inc on '{}' produced a non-finite number", path)))
}

fn apply_modifiers(doc: &mut Value, update: &Map<String, Value>) -> AuthzResult<()> {
    for (op, arg) in update.iter() {
        let fields = as_fields(op, arg)?;
        for (path, v) in fields.iter() {
            if path == "_id" && op != "$set" {
                return Err(AuthzError::bad_value(format!("{} cannot modify _id", op)));
            }
            match op.as_str() {
                "$set" => {
                    if path == "_id" && !docpath::get(doc, "_id").map(|cur| values_equal(cur, v)).unwrap_or(false) {
                        return Err(AuthzError::bad_value("_id is immutable"));
                    }
                    docpath::set(doc, path, v.clone())?;
                }
                "$unset" => { docpath::remove(doc, path); }
                "$inc" => {
                    let next = inc(docpath::get(doc, path), v, path)?;
                    docpath::set(doc, path, next)?;
                }
                "$push" => array_at(doc, path, op)?.push(v.clone()),
                "$addToSet" => {
                    let items = array_at(doc, path, op)?;
                    if !items.iter().any(|i| values_equal(i, v)) { items.push(v.clone()); }
                }
                "$pull" => {
                    if let Some(Value::Array(items)) = docpath::get_mut(doc, path) {
                        let mut kept = Vec::with_capacity(items.len());
                        for item in items.drain(..) {
                            let hit = if v.is_object() && item.is_object() { matches(&item, v)? } else { values_equal(&item, v) };
                            if !hit { kept.push(item); }
                        }
                        *items = kept;
                    }
                }
                other => return Err(AuthzError::bad_value(format!("unknown update modifier {}", other))),
            }
        }
    }
    Ok(())
}

/// Apply `update` to `doc` in place.
pub(crate) fn apply(doc: &mut Value, update: &Value) -> AuthzResult<()> {
    if is_modifier_update(update)? {
        let m = as_fields("update", update)?;
        return apply_modifiers(doc, m);
    }
    let id = docpath::get(doc, "_id").cloned();
    if let (Some(cur), Some(new_id)) = (&id, update.get("_id")) {
        if !values_equal(cur, new_id) {
            return Err(AuthzError::bad_value("_id is immutable"));
        }
    }
    let mut replacement = update.clone();
    if let (Some(id), Some(m)) = (id, replacement.as_object_mut()) {
        m.insert("_id".into(), id);
    }
    *doc = replacement;
    Ok(())
}

/// The document an upsert starts from: the plain equality fields of `query`.
pub(crate) fn upsert_seed(query: &Value) -> AuthzResult<Value> {
    let mut seed = Value::Object(Map::new());
    if let Some(q) = query.as_object() {
        for (k, v) in q.iter() {
            if k.starts_with('$') { continue; }
            match v.as_object() {
                Some(ops) if ops.keys().any(|o| o.starts_with('$')) => {
                    if let Some(eq) = ops.get("$eq") { docpath::set(&mut seed, k, eq.clone())?; }
                }
                _ => docpath::set(&mut seed, k, v.clone())?,
            }
        }
    }
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn modifiers_apply_in_place() {
        let mut d = json!({"_id": 1, "user": "alice", "roles": [{"role": "read", "db": "app"}], "n": 1});
        apply(&mut d, &json!({
            "$set": {"customData.team": "ops"},
            "$inc": {"n": 2},
            "$addToSet": {"roles": {"role": "read", "db": "app"}},
            "$push": {"history": "granted"}
        })).unwrap();
        assert_eq!(d["customData"]["team"], "ops");
        assert_eq!(d["n"], 3);
        assert_eq!(d["roles"].as_array().unwrap().len(), 1);
        assert_eq!(d["history"], json!(["granted"]));

        apply(&mut d, &json!({"$pull": {"roles": {"role": "read"}}, "$unset": {"n": ""}})).unwrap();
        assert_eq!(d["roles"], json!([]));
        assert!(d.get("n").is_none());
    }

    #[test]
    fn replacement_keeps_id() {
        let mut d = json!({"_id": "app.alice", "user": "alice", "pwd": "x"});
        apply(&mut d, &json!({"user": "alice", "db": "app"})).unwrap();
        assert_eq!(d, json!({"_id": "app.alice", "user": "alice", "db": "app"}));
        assert!(apply(&mut d, &json!({"_id": "other"})).is_err());
        assert!(apply(&mut d, &json!({"$set": {"_id": "other"}})).is_err());
    }

    #[test]
    fn rejects_mixed_and_unknown_modifiers() {
        let mut d = json!({"_id": 1});
        assert!(apply(&mut d, &json!({"$set": {"a": 1}, "b": 2})).is_err());
        assert!(apply(&mut d, &json!({"$rename": {"a": "b"}})).is_err());
        assert!(apply(&mut d, &json!({"$inc": {"a": "x"}})).is_err());
    }

    #[test]
    fn seed_takes_equality_fields_only() {
        let seed = upsert_seed(&json!({"_id": "authSchema", "n": {"$gt": 1}, "v": {"$eq": 3}, "$or": []})).unwrap();
        assert_eq!(seed, json!({"_id": "authSchema", "v": 3}));
    }
}

//! Dotted-path access into JSON documents (`a.b.c`).

use serde_json::{Map, Value};

use crate::error::{AuthzError, AuthzResult};

/// Collect every value reachable by `path`, descending into array elements the
/// way the query matcher expects (`roles.role` reaches each element's `role`).
pub(crate) fn collect<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    collect_parts(doc, &parts, &mut out);
    out
}

fn collect_parts<'a>(v: &'a Value, parts: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = parts.split_first() else {
        out.push(v);
        return;
    };
    match v {
        Value::Object(m) => {
            if let Some(child) = m.get(*head) { collect_parts(child, rest, out); }
        }
        Value::Array(items) => {
            if let Ok(i) = head.parse::<usize>() {
                if let Some(child) = items.get(i) { collect_parts(child, rest, out); }
            }
            for it in items.iter().filter(|it| it.is_object()) {
                collect_parts(it, parts, out);
            }
        }
        _ => {}
    }
}

/// Plain lookup without array fan-out.
pub(crate) fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = doc;
    for part in path.split('.') {
        cur = match cur {
            Value::Object(m) => m.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Set `path`, creating intermediate objects. Fails when a non-object is in the way.
pub(crate) fn set(doc: &mut Value, path: &str, value: Value) -> AuthzResult<()> {
    let parts: Vec<&str> = path.split('.').collect();
    let (last, parents) = parts.split_last().ok_or_else(|| AuthzError::bad_value("empty field path"))?;
    let mut cur = doc;
    for part in parents {
        let m = cur
            .as_object_mut()
            .ok_or_else(|| AuthzError::bad_value(format!("cannot create field '{}' in a non-object at '{}'", part, path)))?;
        cur = m.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
    let m = cur
        .as_object_mut()
        .ok_or_else(|| AuthzError::bad_value(format!("cannot set '{}': parent is not an object", path)))?;
    m.insert(last.to_string(), value);
    Ok(())
}

/// Remove `path`; returns the removed value if it existed.
pub(crate) fn remove(doc: &mut Value, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        None => doc.as_object_mut()?.remove(path),
        Some((parent, last)) => get_mut(doc, parent)?.as_object_mut()?.remove(last),
    }
}

pub(crate) fn get_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut cur = doc;
    for part in path.split('.') {
        cur = match cur {
            Value::Object(m) => m.get_mut(part)?,
            Value::Array(items) => items.get_mut(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collect_fans_out_over_arrays() {
        let doc = json!({"roles": [{"role": "a", "db": "x"}, {"role": "b", "db": "y"}]});
        let vals: Vec<&Value> = collect(&doc, "roles.role");
        assert_eq!(vals, vec![&json!("a"), &json!("b")]);
        assert_eq!(collect(&doc, "roles.1.db"), vec![&json!("y")]);
        assert!(collect(&doc, "missing.path").is_empty());
    }

    #[test]
    fn set_creates_parents_and_remove_deletes() {
        let mut doc = json!({"a": 1});
        set(&mut doc, "b.c", json!(2)).unwrap();
        assert_eq!(doc, json!({"a": 1, "b": {"c": 2}}));
        assert!(set(&mut doc, "a.z", json!(0)).is_err());
        assert_eq!(remove(&mut doc, "b.c"), Some(json!(2)));
        assert_eq!(get(&doc, "b"), Some(&json!({})));
        assert_eq!(remove(&mut doc, "nope"), None);
    }
}

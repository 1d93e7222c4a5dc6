//! Query predicate evaluation over JSON documents.
//!
//! Supports field equality on dotted paths (an array field matches when any element
//! matches), `$eq $ne $in $nin $exists $regex $gt $gte $lt $lte` and top-level
//! `$and`/`$or`. A `null` equality also matches a missing field.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::Value;

use crate::error::{AuthzError, AuthzResult};

use super::docpath;

/// Equality with numeric normalization (`1 == 1.0`).
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r)),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn is_operator_doc(v: &Value) -> bool {
    match v.as_object() {
        Some(m) => !m.is_empty() && m.keys().all(|k| k.starts_with('$')),
        None => false,
    }
}

fn eq_any(candidates: &[&Value], target: &Value) -> bool {
    if target.is_null() && candidates.is_empty() { return true; }
    candidates.iter().any(|c| {
        values_equal(c, target) || matches!(c, Value::Array(items) if items.iter().any(|i| values_equal(i, target)))
    })
}

fn flatten<'a>(candidates: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for c in candidates {
        match c {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(*other),
        }
    }
    out
}

fn eval_operator(op: &str, arg: &Value, ops: &serde_json::Map<String, Value>, candidates: &[&Value]) -> AuthzResult<bool> {
    match op {
        "$eq" => Ok(eq_any(candidates, arg)),
        "$ne" => Ok(!eq_any(candidates, arg)),
        "$in" | "$nin" => {
            let Some(list) = arg.as_array() else {
                return Err(AuthzError::bad_value(format!("{} needs an array", op)));
            };
            let hit = list.iter().any(|t| eq_any(candidates, t));
            Ok(if op == "$in" { hit } else { !hit })
        }
        "$exists" => {
            let want = arg.as_bool().unwrap_or_else(|| arg.as_i64().map(|n| n != 0).unwrap_or(true));
            Ok(candidates.is_empty() != want)
        }
        "$regex" => {
            let Some(pat) = arg.as_str() else {
                return Err(AuthzError::bad_value("$regex needs a string pattern"));
            };
            let opts = ops.get("$options").and_then(|o| o.as_str()).unwrap_or("");
            let rx = RegexBuilder::new(pat)
                .case_insensitive(opts.contains('i'))
                .multi_line(opts.contains('m'))
                .build()
                .map_err(|e| AuthzError::bad_value(format!("invalid $regex: {}", e)))?;
            Ok(flatten(candidates).iter().any(|c| c.as_str().map(|s| rx.is_match(s)).unwrap_or(false)))
        }
        "$options" => Ok(true),
        "$gt" | "$gte" | "$lt" | "$lte" => {
            let ok = |o: Ordering| match op {
                "$gt" => o == Ordering::Greater,
                "$gte" => o != Ordering::Less,
                "$lt" => o == Ordering::Less,
                _ => o != Ordering::Greater,
            };
            Ok(flatten(candidates).iter().any(|c| compare(c, arg).map(ok).unwrap_or(false)))
        }
        other => Err(AuthzError::bad_value(format!("unknown query operator {}", other))),
    }
}

/// True when `doc` satisfies `query`. An empty or null query matches everything.
pub fn matches(doc: &Value, query: &Value) -> AuthzResult<bool> {
    let q = match query {
        Value::Null => return Ok(true),
        Value::Object(m) => m,
        _ => return Err(AuthzError::bad_value(format!("query must be a document: {}", query))),
    };
    for (key, cond) in q.iter() {
        let ok = match key.as_str() {
            "$and" | "$or" => {
                let Some(clauses) = cond.as_array() else {
                    return Err(AuthzError::bad_value(format!("{} needs an array", key)));
                };
                let mut results = Vec::with_capacity(clauses.len());
                for c in clauses { results.push(matches(doc, c)?); }
                if key == "$and" { results.iter().all(|r| *r) } else { results.iter().any(|r| *r) }
            }
            k if k.starts_with('$') => return Err(AuthzError::bad_value(format!("unknown top-level operator {}", k))),
            path => {
                let candidates = docpath::collect(doc, path);
                if let Some(ops) = cond.as_object().filter(|_| is_operator_doc(cond)) {
                    let mut all = true;
                    for (op, arg) in ops.iter() {
                        if !eval_operator(op, arg, ops, &candidates)? { all = false; break; }
                    }
                    all
                } else {
                    eq_any(&candidates, cond)
                }
            }
        };
        if !ok { return Ok(false); }
    }
    Ok(true)
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod matcher_tests;

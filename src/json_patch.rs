//! RFC 6902 JSON Patch: diff between two `serde_json::Value`s and apply of
//! a patch op list to a `Value`.
//!
//! The per-operation apply logic below follows the shape of the
//! `json-patch` crate's own implementation (pointer splitting, one
//! function per op); `diff` is this crate's own algorithm, since it has
//! to match a specific recursive contract (see module docs on `diff`)
//! rather than any particular minimality heuristic.

use crate::error::PatchApplicationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::mem;

/// JSON Patch 'add' operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOperation {
    pub path: String,
    pub value: Value,
}

/// JSON Patch 'remove' operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveOperation {
    pub path: String,
}

/// JSON Patch 'replace' operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceOperation {
    pub path: String,
    pub value: Value,
}

/// JSON Patch 'move' operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub from: String,
    pub path: String,
}

/// JSON Patch 'copy' operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyOperation {
    pub from: String,
    pub path: String,
}

/// JSON Patch 'test' operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOperation {
    pub path: String,
    pub value: Value,
}

/// A single RFC 6902 patch operation.
///
/// There is deliberately no "get" variant: that op exists in some
/// mutable-buffer-based JSON-Patch libraries purely to extract the
/// patched root out of the buffer. This module operates directly on an
/// owned `Value`, so `apply` simply returns it, no terminator op needed,
/// and one must never appear on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add(AddOperation),
    Remove(RemoveOperation),
    Replace(ReplaceOperation),
    Move(MoveOperation),
    Copy(CopyOperation),
    Test(TestOperation),
}

impl Op {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Op::Add(AddOperation {
            path: path.into(),
            value,
        })
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Op::Remove(RemoveOperation { path: path.into() })
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Op::Replace(ReplaceOperation {
            path: path.into(),
            value,
        })
    }
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn child_path(parent: &str, token: &str) -> String {
    format!("{}/{}", parent, escape_token(token))
}

fn split_pointer(pointer: &str) -> Result<(&str, String), PatchApplicationError> {
    pointer
        .rfind('/')
        .map(|idx| (&pointer[..idx], unescape_token(&pointer[idx + 1..])))
        .ok_or_else(|| PatchApplicationError::InvalidPointer(pointer.to_string()))
}

fn parse_index(token: &str, len: usize) -> Result<usize, PatchApplicationError> {
    if token.starts_with('0') && token.len() != 1 {
        return Err(PatchApplicationError::InvalidPointer(token.to_string()));
    }
    match token.parse::<usize>() {
        Ok(idx) if idx <= len => Ok(idx),
        _ => Err(PatchApplicationError::InvalidPointer(token.to_string())),
    }
}

fn add_at(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchApplicationError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }

    let (parent, last) = split_pointer(path)?;
    let parent = doc
        .pointer_mut(parent)
        .ok_or_else(|| PatchApplicationError::InvalidPointer(path.to_string()))?;

    match parent {
        Value::Object(obj) => {
            obj.insert(last, value);
            Ok(())
        }
        Value::Array(arr) if last == "-" => {
            arr.push(value);
            Ok(())
        }
        Value::Array(arr) => {
            let idx = parse_index(&last, arr.len())?;
            arr.insert(idx, value);
            Ok(())
        }
        _ => Err(PatchApplicationError::InvalidPointer(path.to_string())),
    }
}

fn remove_at(doc: &mut Value, path: &str) -> Result<Value, PatchApplicationError> {
    let (parent, last) = split_pointer(path)?;
    let parent = doc
        .pointer_mut(parent)
        .ok_or_else(|| PatchApplicationError::InvalidPointer(path.to_string()))?;

    match parent {
        Value::Object(obj) => obj
            .remove(last.as_str())
            .ok_or_else(|| PatchApplicationError::InvalidPointer(path.to_string())),
        Value::Array(arr) => {
            if last == "-" || arr.is_empty() {
                return Err(PatchApplicationError::InvalidPointer(path.to_string()));
            }
            let idx = parse_index(&last, arr.len() - 1)?;
            Ok(arr.remove(idx))
        }
        _ => Err(PatchApplicationError::InvalidPointer(path.to_string())),
    }
}

fn replace_at(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchApplicationError> {
    let target = doc
        .pointer_mut(path)
        .ok_or_else(|| PatchApplicationError::InvalidPointer(path.to_string()))?;
    let _ = mem::replace(target, value);
    Ok(())
}

fn move_to(doc: &mut Value, from: &str, path: &str) -> Result<(), PatchApplicationError> {
    if path == from || (path.starts_with(from) && path[from.len()..].starts_with('/')) {
        return Err(PatchApplicationError::InvalidPointer(path.to_string()));
    }
    let value = remove_at(doc, from)?;
    add_at(doc, path, value)
}

fn copy_to(doc: &mut Value, from: &str, path: &str) -> Result<(), PatchApplicationError> {
    let value = doc
        .pointer(from)
        .ok_or_else(|| PatchApplicationError::InvalidPointer(from.to_string()))?
        .clone();
    add_at(doc, path, value)
}

fn test_at(doc: &Value, path: &str, expected: &Value) -> Result<(), PatchApplicationError> {
    let actual = doc
        .pointer(path)
        .ok_or_else(|| PatchApplicationError::InvalidPointer(path.to_string()))?;
    if actual == expected {
        Ok(())
    } else {
        Err(PatchApplicationError::TestFailed {
            path: path.to_string(),
        })
    }
}

/// Apply `ops` to `doc` in order, mutating it in place.
///
/// Each op's effect follows RFC 6902: `add` to an existing object key acts
/// as `replace`; `remove` on an absent key is an error; `move`/`copy`
/// dereference `from`. No partial-application rollback is attempted: if
/// an op fails partway through a multi-op list, the document is left with
/// whichever earlier ops already succeeded (matches spec's "the engine
/// does not attempt partial recovery within an edit": recovery, if any,
/// happens at the edit level in the sync engine, not inside `apply`).
pub fn apply(doc: &mut Value, ops: &[Op]) -> Result<(), PatchApplicationError> {
    for op in ops {
        match op {
            Op::Add(o) => add_at(doc, &o.path, o.value.clone())?,
            Op::Remove(o) => {
                remove_at(doc, &o.path)?;
            }
            Op::Replace(o) => replace_at(doc, &o.path, o.value.clone())?,
            Op::Move(o) => move_to(doc, &o.from, &o.path)?,
            Op::Copy(o) => copy_to(doc, &o.from, &o.path)?,
            Op::Test(o) => test_at(doc, &o.path, &o.value)?,
        }
    }
    Ok(())
}

fn same_container_shape(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    )
}

/// Computes the ops needed to turn `old` into `new`.
///
/// Recursively walks both trees: emits `add` for object keys present only
/// in `new`, `remove` for keys present only in `old`, and recurses into
/// keys present in both when both sides are the same container kind
/// (object/object or array/array); otherwise a differing value at a
/// shared path becomes a single `replace`. Arrays are compared
/// positionally: a longer `new` array gets trailing `add`s (emitted in
/// increasing index order, which appends correctly); a shorter one gets
/// trailing `remove`s (emitted in decreasing index order, so earlier
/// removes don't shift the indices of later ones).
///
/// Per parent, `add` operations are always emitted before `remove`
/// operations: new-only keys are collected before old-only keys in the
/// object case, and trailing array removals are emitted after trailing
/// array additions.
pub fn diff(old: &Value, new: &Value) -> Vec<Op> {
    diff_at("", old, new)
}

fn diff_at(path: &str, old: &Value, new: &Value) -> Vec<Op> {
    if old == new {
        return Vec::new();
    }

    match (old, new) {
        (Value::Object(o), Value::Object(n)) => diff_objects(path, o, n),
        (Value::Array(o), Value::Array(n)) => diff_arrays(path, o, n),
        _ => vec![Op::Replace(ReplaceOperation {
            path: path.to_string(),
            value: new.clone(),
        })],
    }
}

fn diff_objects(path: &str, old: &Map<String, Value>, new: &Map<String, Value>) -> Vec<Op> {
    let mut ops = Vec::new();

    for (key, value) in new.iter() {
        if !old.contains_key(key) {
            ops.push(Op::Add(AddOperation {
                path: child_path(path, key),
                value: value.clone(),
            }));
        }
    }

    for (key, new_value) in new.iter() {
        if let Some(old_value) = old.get(key) {
            if old_value == new_value {
                continue;
            }
            let key_path = child_path(path, key);
            if same_container_shape(old_value, new_value) {
                ops.extend(diff_at(&key_path, old_value, new_value));
            } else {
                ops.push(Op::Replace(ReplaceOperation {
                    path: key_path,
                    value: new_value.clone(),
                }));
            }
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            ops.push(Op::Remove(RemoveOperation {
                path: child_path(path, key),
            }));
        }
    }

    ops
}

fn diff_arrays(path: &str, old: &[Value], new: &[Value]) -> Vec<Op> {
    let mut ops = Vec::new();
    let common = old.len().min(new.len());

    for i in 0..common {
        let (old_value, new_value) = (&old[i], &new[i]);
        if old_value == new_value {
            continue;
        }
        let idx_path = child_path(path, &i.to_string());
        if same_container_shape(old_value, new_value) {
            ops.extend(diff_at(&idx_path, old_value, new_value));
        } else {
            ops.push(Op::Replace(ReplaceOperation {
                path: idx_path,
                value: new_value.clone(),
            }));
        }
    }

    if new.len() > old.len() {
        for (i, value) in new.iter().enumerate().skip(common) {
            ops.push(Op::Add(AddOperation {
                path: child_path(path, &i.to_string()),
                value: value.clone(),
            }));
        }
    } else if old.len() > new.len() {
        for i in (common..old.len()).rev() {
            ops.push(Op::Remove(RemoveOperation {
                path: child_path(path, &i.to_string()),
            }));
        }
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply_to(value: &Value, ops: &[Op]) -> Value {
        let mut doc = value.clone();
        apply(&mut doc, ops).unwrap();
        doc
    }

    #[test]
    fn round_trip_diff_apply_object() {
        let a = json!({"a": "x", "b": {"c": "y"}, "d": "z"});
        let b = json!({"a": "x", "b": "z", "d": {"c": "y"}});
        let ops = diff(&a, &b);
        assert_eq!(apply_to(&a, &ops), b);
    }

    #[test]
    fn round_trip_diff_apply_arrays() {
        let a = json!({"xs": [1, 2, 3]});
        let b = json!({"xs": [1, 9, 3, 4]});
        let ops = diff(&a, &b);
        assert_eq!(apply_to(&a, &ops), b);
    }

    #[test]
    fn scenario_add_a_key() {
        let working = json!({"key1": "value1"});
        let shadow = json!({"key1": "value1", "key2": "value2"});
        let ops = diff(&working, &shadow);
        assert_eq!(
            ops,
            vec![Op::Add(AddOperation {
                path: "/key2".to_string(),
                value: json!("value2"),
            })]
        );
    }

    #[test]
    fn scenario_remove_a_key() {
        let working = json!({"k1": "v1", "k2": "v2"});
        let shadow = json!({"k1": "v1"});
        let ops = diff(&working, &shadow);
        assert_eq!(
            ops,
            vec![Op::Remove(RemoveOperation {
                path: "/k2".to_string(),
            })]
        );
    }

    #[test]
    fn scenario_replace_across_type_boundary() {
        let working = json!({"a": "x", "b": {"c": "y"}, "d": "z"});
        let shadow = json!({"a": "x", "b": "z", "d": {"c": "y"}});
        let ops = diff(&working, &shadow);
        assert_eq!(
            ops,
            vec![
                Op::Replace(ReplaceOperation {
                    path: "/b".to_string(),
                    value: json!("z"),
                }),
                Op::Replace(ReplaceOperation {
                    path: "/d".to_string(),
                    value: json!({"c": "y"}),
                }),
            ]
        );
    }

    #[test]
    fn scenario_combined_nested_add_and_top_level_remove() {
        let working = json!({"a": "x", "b": {"c": "y"}, "d": "z"});
        let shadow = json!({"a": "x", "b": {"c": "y", "d": "z"}});
        let ops = diff(&working, &shadow);
        assert_eq!(
            ops,
            vec![
                Op::Add(AddOperation {
                    path: "/b/d".to_string(),
                    value: json!("z"),
                }),
                Op::Remove(RemoveOperation {
                    path: "/d".to_string(),
                }),
            ]
        );
    }

    #[test]
    fn remove_of_missing_path_is_an_error() {
        let mut doc = json!({"a": 1});
        let ops = vec![Op::Remove(RemoveOperation {
            path: "/missing".to_string(),
        })];
        assert!(apply(&mut doc, &ops).is_err());
    }

    #[test]
    fn escapes_tilde_and_slash_in_path_tokens() {
        let working = json!({});
        let shadow = json!({"a/b": "x", "c~d": "y"});
        let ops = diff(&working, &shadow);
        let paths: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                Op::Add(o) => o.path.as_str(),
                _ => panic!("expected add"),
            })
            .collect();
        assert!(paths.contains(&"/a~1b"));
        assert!(paths.contains(&"/c~0d"));
        assert_eq!(apply_to(&working, &ops), shadow);
    }

    #[test]
    fn whole_document_replace_at_root() {
        let old = json!({"a": 1});
        let new = json!([1, 2, 3]);
        let ops = diff(&old, &new);
        assert_eq!(
            ops,
            vec![Op::Replace(ReplaceOperation {
                path: String::new(),
                value: new.clone(),
            })]
        );
        assert_eq!(apply_to(&old, &ops), new);
    }
}

//! Structural diff: generate the patches that transform one state into another.
//!
//! Objects are diffed member by member, scalars are replaced, arrays are
//! diffed positionally unless an identity extractor is configured for them,
//! in which case items are matched by identity and nested patches carry the
//! item's id.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::item_id::{ItemIdConfig, ItemIdFn, ItemIdRule};
use crate::types::{Key, Patch, PathSegment, State};

// ── Public API ────────────────────────────────────────────────────────────

/// Generate the patches that transform `src` into `dst`.
///
/// Every patch path starts with a top-level field name; the root itself is
/// never replaced.
pub fn diff_state(src: &State, dst: &State, item_ids: Option<&ItemIdConfig>) -> Vec<Patch> {
    let mut ops = Vec::new();
    diff_obj(&mut ops, &[], src, dst, item_ids, None);
    ops
}

/// Generate the patches that transform the value `src` into `dst` at `path`.
pub fn diff_value(path: &[PathSegment], src: &Value, dst: &Value, rule: Option<&ItemIdRule>) -> Vec<Patch> {
    let mut ops = Vec::new();
    diff_at_path(&mut ops, path, src, dst, rule, None);
    ops
}

// ── Core recursive differ ─────────────────────────────────────────────────

fn child(path: &[PathSegment], step: PathSegment) -> Vec<PathSegment> {
    let mut p = path.to_vec();
    p.push(step);
    p
}

/// Record a patch, tagging it with the identity of the enclosing item.
fn push(ops: &mut Vec<Patch>, patch: Patch, item: Option<&Key>) {
    match item {
        Some(id) => ops.push(patch.with_id(id.clone())),
        None => ops.push(patch),
    }
}

fn diff_at_path(
    ops: &mut Vec<Patch>,
    path: &[PathSegment],
    src: &Value,
    dst: &Value,
    rule: Option<&ItemIdRule>,
    item: Option<&Key>,
) {
    if src == dst {
        return;
    }
    match (src, dst) {
        (Value::Object(s), Value::Object(d)) => {
            let nested = match rule {
                Some(ItemIdRule::Nested(cfg)) => Some(cfg),
                _ => None,
            };
            diff_obj(ops, path, s, d, nested, item);
        }
        (Value::Array(s), Value::Array(d)) => match rule {
            Some(ItemIdRule::Extract(extract)) => diff_arr_by_id(ops, path, s, d, extract, item),
            _ => diff_arr(ops, path, s, d, item),
        },
        _ => diff_val(ops, path, src, dst, item),
    }
}

fn diff_val(ops: &mut Vec<Patch>, path: &[PathSegment], src: &Value, dst: &Value, item: Option<&Key>) {
    push(ops, Patch::replace(path.to_vec(), dst.clone(), Some(src.clone())), item);
}

fn diff_obj(
    ops: &mut Vec<Patch>,
    path: &[PathSegment],
    src: &Map<String, Value>,
    dst: &Map<String, Value>,
    config: Option<&ItemIdConfig>,
    item: Option<&Key>,
) {
    // Remove keys in src that are not in dst
    for (key, src_val) in src {
        if !dst.contains_key(key) {
            let p = child(path, PathSegment::Key(key.clone()));
            push(ops, Patch::remove(p, Some(src_val.clone())), item);
        }
    }
    // Add/replace keys in dst
    for (key, dst_val) in dst {
        let p = child(path, PathSegment::Key(key.clone()));
        match src.get(key) {
            None => push(ops, Patch::add(p, dst_val.clone()), item),
            Some(src_val) => {
                let rule = config.and_then(|c| c.get(key));
                diff_at_path(ops, &p, src_val, dst_val, rule, item);
            }
        }
    }
}

/// Positional array diff. A shrinking array is reported as a single
/// `length` replacement carrying the old and new lengths.
fn diff_arr(ops: &mut Vec<Patch>, path: &[PathSegment], src: &[Value], dst: &[Value], item: Option<&Key>) {
    let common = src.len().min(dst.len());
    for i in 0..common {
        diff_at_path(ops, &child(path, PathSegment::Index(i)), &src[i], &dst[i], None, item);
    }
    for (i, v) in dst.iter().enumerate().skip(common) {
        push(ops, Patch::add(child(path, PathSegment::Index(i)), v.clone()), item);
    }
    if dst.len() < src.len() {
        let p = child(path, PathSegment::Key("length".to_string()));
        push(ops, Patch::replace(p, Value::from(dst.len()), Some(Value::from(src.len()))), item);
    }
}

/// Identity-aware array diff.
///
/// Vanished items are removed (highest index first), new items are added in
/// ascending index order, and items present on both sides are diffed in
/// place with their identity attached. Items without identity never match.
/// Reordered or duplicated identities fall back to replacing the array.
fn diff_arr_by_id(
    ops: &mut Vec<Patch>,
    path: &[PathSegment],
    src: &[Value],
    dst: &[Value],
    extract: &ItemIdFn,
    item: Option<&Key>,
) {
    let src_ids: Vec<Option<Key>> = src.iter().map(|v| extract(v)).collect();
    let dst_ids: Vec<Option<Key>> = dst.iter().map(|v| extract(v)).collect();

    let (Some(src_index), Some(dst_index)) = (index_ids(&src_ids), index_ids(&dst_ids)) else {
        return replace_whole(ops, path, src, dst, item);
    };

    let kept_in_src: Vec<&Key> = src_ids.iter().flatten().filter(|id| dst_index.contains_key(id)).collect();
    let kept_in_dst: Vec<&Key> = dst_ids.iter().flatten().filter(|id| src_index.contains_key(id)).collect();
    if kept_in_src != kept_in_dst {
        return replace_whole(ops, path, src, dst, item);
    }

    for (i, id) in src_ids.iter().enumerate().rev() {
        let kept = id.as_ref().is_some_and(|id| dst_index.contains_key(id));
        if !kept {
            let p = child(path, PathSegment::Index(i));
            push(ops, Patch::remove(p, Some(src[i].clone())), item);
        }
    }
    for (j, (v, id)) in dst.iter().zip(&dst_ids).enumerate() {
        let p = child(path, PathSegment::Index(j));
        match id.as_ref().and_then(|id| src_index.get(id).map(|&i| (id, i))) {
            Some((id, i)) => diff_at_path(ops, &p, &src[i], v, None, Some(id)),
            None => push(ops, Patch::add(p, v.clone()), item),
        }
    }
}

/// Index identities by position; `None` when an identity repeats.
fn index_ids(ids: &[Option<Key>]) -> Option<HashMap<&Key, usize>> {
    let mut seen = HashSet::new();
    let mut out = HashMap::new();
    for (i, id) in ids.iter().enumerate() {
        if let Some(id) = id {
            if !seen.insert(id) {
                return None;
            }
            out.insert(id, i);
        }
    }
    Some(out)
}

fn replace_whole(ops: &mut Vec<Patch>, path: &[PathSegment], src: &[Value], dst: &[Value], item: Option<&Key>) {
    let patch = Patch::replace(path.to_vec(), Value::Array(dst.to_vec()), Some(Value::Array(src.to_vec())));
    push(ops, patch, item);
}

// ── Tests ─────────────────────────────────────────────────────────────────

//! Recorded mutations.
//!
//! A [`Draft`] is a working copy of the state whose mutation methods record
//! the patch describing each change at the granularity it was made:
//! assigning a field records one `replace` at `[field]`, assigning an item
//! records one `replace` at `[field, index]`, assigning a property records a
//! `replace` at the property. Patches strictly inside an item of an
//! identified ordered collection carry that item's id.
//!
//! Paths are given either as [`PathSegment`] slices or as JSON Pointers
//! (`*_ptr` methods). A numeric segment addresses an array element when the
//! value it is applied to is an array, and `-` addresses the end of an array.
//!
//! [`Draft::edit`] and [`Draft::edit_state`] hand out plain `&mut` access and
//! fall back to a structural diff of the touched subtree.

use serde_json::Value;
use thiserror::Error;

use crate::diff::{diff_state, diff_value};
use crate::item_id::{ItemIdConfig, ItemIdRule};
use crate::types::{format_pointer, parse_pointer, Key, Patch, PathSegment, State};

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("the state root cannot be assigned or removed")]
    RootPath,
    #[error("invalid JSON pointer: {0:?}")]
    InvalidPointer(String),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("not an array: {0}")]
    NotAnArray(String),
    #[error("index {index} out of bounds for length {len} at {path}")]
    IndexOutOfBounds { path: String, index: usize, len: usize },
    #[error("invalid length {length} at {path}: arrays can only be shortened")]
    InvalidLength { path: String, length: String },
}

// ── Path resolution ───────────────────────────────────────────────────────

fn child<'v>(value: &'v Value, step: &PathSegment) -> Option<&'v Value> {
    match (value, step) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Array(arr), PathSegment::Index(idx)) => arr.get(*idx),
        _ => None,
    }
}

fn child_mut<'v>(value: &'v mut Value, step: &PathSegment) -> Option<&'v mut Value> {
    match (value, step) {
        (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
        (Value::Array(arr), PathSegment::Index(idx)) => arr.get_mut(*idx),
        _ => None,
    }
}

fn lookup<'v>(state: &'v State, path: &[PathSegment]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let mut cur = state.get(first.as_key()?)?;
    for step in rest {
        cur = child(cur, step)?;
    }
    Some(cur)
}

fn lookup_mut<'v>(state: &'v mut State, path: &[PathSegment]) -> Option<&'v mut Value> {
    let (first, rest) = path.split_first()?;
    let mut cur = state.get_mut(first.as_key()?)?;
    for step in rest {
        cur = child_mut(cur, step)?;
    }
    Some(cur)
}

/// The identity rule for the value at `path`, if one is configured for it.
fn rule_at<'c>(config: Option<&'c ItemIdConfig>, path: &[PathSegment]) -> Option<&'c ItemIdRule> {
    let mut config = config?;
    for (depth, step) in path.iter().enumerate() {
        let rule = config.get(step.as_key()?)?;
        if depth + 1 == path.len() {
            return Some(rule);
        }
        match rule {
            ItemIdRule::Nested(nested) => config = nested,
            ItemIdRule::Extract(_) => return None,
        }
    }
    None
}

// ── Draft ─────────────────────────────────────────────────────────────────

/// A mutable copy of a state that records every change as a [`Patch`].
pub struct Draft<'a> {
    state: State,
    patches: Vec<Patch>,
    item_ids: Option<&'a ItemIdConfig>,
}

impl<'a> Draft<'a> {
    pub fn new(state: State, item_ids: Option<&'a ItemIdConfig>) -> Self {
        Self { state, patches: Vec::new(), item_ids }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The patches recorded so far, in order.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn into_parts(self) -> (State, Vec<Patch>) {
        (self.state, self.patches)
    }

    // ── Reading ───────────────────────────────────────────────────────────

    pub fn get(&self, path: &[PathSegment]) -> Option<&Value> {
        lookup(&self.state, &self.normalize(path))
    }

    pub fn get_ptr(&self, ptr: &str) -> Option<&Value> {
        let path = parse_pointer(ptr)?;
        self.get(&path)
    }

    // ── Path handling ─────────────────────────────────────────────────────

    fn parse(ptr: &str) -> Result<Vec<PathSegment>, DraftError> {
        parse_pointer(ptr).ok_or_else(|| DraftError::InvalidPointer(ptr.to_string()))
    }

    /// Rewrite `path` against the current state: object members become keys,
    /// numeric steps into arrays become indices, `-` becomes the array length.
    fn normalize(&self, path: &[PathSegment]) -> Vec<PathSegment> {
        let mut out = Vec::with_capacity(path.len());
        let mut cur: Option<&Value> = None;
        for (depth, step) in path.iter().enumerate() {
            let seg = match (depth, cur) {
                (0, _) | (_, Some(Value::Object(_))) => PathSegment::Key(step.to_string()),
                (_, Some(Value::Array(arr))) => match step {
                    PathSegment::Key(key) if key == "-" => PathSegment::Index(arr.len()),
                    PathSegment::Key(key) => key.parse().map_or_else(|_| step.clone(), PathSegment::Index),
                    PathSegment::Index(_) => step.clone(),
                },
                _ => step.clone(),
            };
            cur = match cur {
                None if depth == 0 => self.state.get(&seg.to_string()),
                Some(value) => child(value, &seg),
                None => None,
            };
            out.push(seg);
        }
        out
    }

    /// The item of an identified ordered collection that `path` addresses or
    /// lies inside of: the item's path length and its identity.
    fn item_at(&self, path: &[PathSegment]) -> Option<(usize, Key)> {
        let mut config = self.item_ids?;
        let mut cur: Option<&Value> = None;
        for (depth, step) in path.iter().enumerate() {
            let name = step.as_key()?;
            let value = match cur {
                None => self.state.get(name)?,
                Some(parent) => parent.get(name)?,
            };
            match config.get(name)? {
                ItemIdRule::Extract(extract) => {
                    let index = path.get(depth + 1)?.as_index()?;
                    let item = value.as_array()?.get(index)?;
                    return extract(item).map(|id| (depth + 2, id));
                }
                ItemIdRule::Nested(nested) => {
                    config = nested;
                    cur = Some(value);
                }
            }
        }
        None
    }

    /// The id for a patch at `path`: set only when `path` is strictly inside
    /// an identified item.
    fn id_for(&self, path: &[PathSegment]) -> Option<Key> {
        self.item_at(path).filter(|(depth, _)| path.len() > *depth).map(|(_, id)| id)
    }

    fn record(&mut self, patch: Patch, id: Option<Key>) {
        match id {
            Some(id) => self.patches.push(patch.with_id(id)),
            None => self.patches.push(patch),
        }
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    /// Assign `value` at `path`.
    ///
    /// Records `replace` (with the previous value) when something was there
    /// and `add` otherwise. Assigning one past the end of an array appends.
    /// Assigning a smaller `length` to an array truncates it and records a
    /// `replace` at `[.., "length"]` carrying both lengths.
    pub fn set(&mut self, path: &[PathSegment], value: Value) -> Result<(), DraftError> {
        let path = self.normalize(path);
        let Some((leaf, parent_path)) = path.split_last() else {
            return Err(DraftError::RootPath);
        };
        let id = self.id_for(&path);

        if parent_path.is_empty() {
            let patch = match self.state.insert(leaf.to_string(), value.clone()) {
                Some(old) => Patch::replace(path.clone(), value, Some(old)),
                None => Patch::add(path.clone(), value),
            };
            self.record(patch, id);
            return Ok(());
        }

        let not_found = || DraftError::PathNotFound(format_pointer(&path));
        let parent = lookup_mut(&mut self.state, parent_path).ok_or_else(not_found)?;
        let patch = match (parent, leaf) {
            (Value::Object(map), PathSegment::Key(key)) => match map.insert(key.clone(), value.clone()) {
                Some(old) => Patch::replace(path.clone(), value, Some(old)),
                None => Patch::add(path.clone(), value),
            },
            (Value::Array(arr), PathSegment::Index(index)) => {
                let len = arr.len();
                if *index < len {
                    let old = std::mem::replace(&mut arr[*index], value.clone());
                    Patch::replace(path.clone(), value, Some(old))
                } else if *index == len {
                    arr.push(value.clone());
                    Patch::add(path.clone(), value)
                } else {
                    return Err(DraftError::IndexOutOfBounds { path: format_pointer(&path), index: *index, len });
                }
            }
            (Value::Array(arr), PathSegment::Key(key)) if key == "length" => {
                let old_length = arr.len();
                let length = value
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|n| *n <= old_length)
                    .ok_or_else(|| DraftError::InvalidLength {
                        path: format_pointer(parent_path),
                        length: value.to_string(),
                    })?;
                if length == old_length {
                    return Ok(());
                }
                arr.truncate(length);
                Patch::replace(path.clone(), Value::from(length), Some(Value::from(old_length)))
            }
            _ => return Err(not_found()),
        };
        self.record(patch, id);
        Ok(())
    }

    pub fn set_ptr(&mut self, ptr: &str, value: Value) -> Result<(), DraftError> {
        let path = Self::parse(ptr)?;
        self.set(&path, value)
    }

    /// Remove the member or element at `path` and return it. Later array
    /// elements shift down.
    pub fn remove(&mut self, path: &[PathSegment]) -> Result<Value, DraftError> {
        let path = self.normalize(path);
        let Some((leaf, parent_path)) = path.split_last() else {
            return Err(DraftError::RootPath);
        };
        let id = self.id_for(&path);
        let not_found = || DraftError::PathNotFound(format_pointer(&path));

        let old = if parent_path.is_empty() {
            self.state.shift_remove(&leaf.to_string()).ok_or_else(not_found)?
        } else {
            match (lookup_mut(&mut self.state, parent_path), leaf) {
                (Some(Value::Object(map)), PathSegment::Key(key)) => map.shift_remove(key).ok_or_else(not_found)?,
                (Some(Value::Array(arr)), PathSegment::Index(index)) if *index < arr.len() => arr.remove(*index),
                _ => return Err(not_found()),
            }
        };
        self.record(Patch::remove(path.clone(), Some(old.clone())), id);
        Ok(old)
    }

    pub fn remove_ptr(&mut self, ptr: &str) -> Result<Value, DraftError> {
        let path = Self::parse(ptr)?;
        self.remove(&path)
    }

    /// Insert `value` into an array at the index `path` ends with, shifting
    /// later elements up.
    pub fn insert(&mut self, path: &[PathSegment], value: Value) -> Result<(), DraftError> {
        let path = self.normalize(path);
        let Some((leaf, parent_path)) = path.split_last() else {
            return Err(DraftError::RootPath);
        };
        let id = self.id_for(&path);
        let parent_ptr = format_pointer(parent_path);
        let Some(Value::Array(arr)) = lookup_mut(&mut self.state, parent_path) else {
            return Err(DraftError::NotAnArray(parent_ptr));
        };
        let Some(index) = leaf.as_index() else {
            return Err(DraftError::PathNotFound(format_pointer(&path)));
        };
        if index > arr.len() {
            return Err(DraftError::IndexOutOfBounds { path: format_pointer(&path), index, len: arr.len() });
        }
        arr.insert(index, value.clone());
        self.record(Patch::add(path.clone(), value), id);
        Ok(())
    }

    pub fn insert_ptr(&mut self, ptr: &str, value: Value) -> Result<(), DraftError> {
        let path = Self::parse(ptr)?;
        self.insert(&path, value)
    }

    /// Append `value` to the array at `path`.
    pub fn push(&mut self, path: &[PathSegment], value: Value) -> Result<(), DraftError> {
        let mut path = self.normalize(path);
        let len = match lookup(&self.state, &path) {
            Some(Value::Array(arr)) => arr.len(),
            Some(_) => return Err(DraftError::NotAnArray(format_pointer(&path))),
            None if path.is_empty() => return Err(DraftError::RootPath),
            None => return Err(DraftError::PathNotFound(format_pointer(&path))),
        };
        path.push(PathSegment::Index(len));
        self.insert(&path, value)
    }

    pub fn push_ptr(&mut self, ptr: &str, value: Value) -> Result<(), DraftError> {
        let path = Self::parse(ptr)?;
        self.push(&path, value)
    }

    /// Shorten the array at `path` to `len` elements.
    pub fn truncate(&mut self, path: &[PathSegment], len: usize) -> Result<(), DraftError> {
        let mut path = self.normalize(path);
        if !matches!(lookup(&self.state, &path), Some(Value::Array(_))) {
            return Err(DraftError::NotAnArray(format_pointer(&path)));
        }
        path.push(PathSegment::from("length"));
        self.set(&path, Value::from(len))
    }

    pub fn truncate_ptr(&mut self, ptr: &str, len: usize) -> Result<(), DraftError> {
        let path = Self::parse(ptr)?;
        self.truncate(&path, len)
    }

    // ── Untracked edits ───────────────────────────────────────────────────

    /// Mutate the value at `path` in place and record the structural diff
    /// of that subtree.
    ///
    /// Changes below an identified item carry its id, and an identified
    /// collection at `path` is diffed by identity. Use [`Draft::set`] to
    /// express a wholesale assignment.
    pub fn edit<F>(&mut self, path: &[PathSegment], f: F) -> Result<(), DraftError>
    where
        F: FnOnce(&mut Value),
    {
        let path = self.normalize(path);
        if path.is_empty() {
            return Err(DraftError::RootPath);
        }
        let rule = rule_at(self.item_ids, &path);
        let item = self.item_at(&path);

        let target = lookup_mut(&mut self.state, &path).ok_or_else(|| DraftError::PathNotFound(format_pointer(&path)))?;
        let before = target.clone();
        f(target);
        let patches = diff_value(&path, &before, target, rule);

        for patch in patches {
            let id = match &item {
                Some((depth, id)) if patch.id.is_none() && patch.path.len() > *depth => Some(id.clone()),
                _ => None,
            };
            self.record(patch, id);
        }
        Ok(())
    }

    pub fn edit_ptr<F>(&mut self, ptr: &str, f: F) -> Result<(), DraftError>
    where
        F: FnOnce(&mut Value),
    {
        let path = Self::parse(ptr)?;
        self.edit(&path, f)
    }

    /// Mutate the whole state in place and record the structural diff.
    pub fn edit_state<F>(&mut self, f: F)
    where
        F: FnOnce(&mut State),
    {
        let before = self.state.clone();
        f(&mut self.state);
        let patches = diff_state(&before, &self.state, self.item_ids);
        self.patches.extend(patches);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatchOp;
    use serde_json::json;

    fn state(v: Value) -> State {
        match v {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn p(steps: &[&str]) -> Vec<PathSegment> {
        steps
            .iter()
            .map(|s| match s.parse::<usize>() {
                Ok(i) => PathSegment::Index(i),
                Err(_) => PathSegment::from(*s),
            })
            .collect()
    }

    fn todos() -> ItemIdConfig {
        ItemIdConfig::new().by_property("items", "id")
    }

    #[test]
    fn set_field_records_single_replace() {
        let mut draft = Draft::new(state(json!({"users": {"u1": {"n": 1}}})), None);
        draft.set_ptr("/users", json!({"u1": {"n": 1}, "u2": {"n": 2}})).expect("set");
        assert_eq!(
            draft.patches(),
            &[Patch::replace(p(&["users"]), json!({"u1": {"n": 1}, "u2": {"n": 2}}), Some(json!({"u1": {"n": 1}})))]
        );
    }

    #[test]
    fn set_new_field_records_add() {
        let mut draft = Draft::new(State::new(), None);
        draft.set_ptr("/count", json!(1)).expect("set");
        assert_eq!(draft.patches(), &[Patch::add(p(&["count"]), json!(1))]);
        assert_eq!(draft.state().get("count"), Some(&json!(1)));
    }

    #[test]
    fn item_property_update_carries_id() {
        let ids = todos();
        let mut draft = Draft::new(state(json!({"items": [{"id": 1, "done": false}]})), Some(&ids));
        draft.set_ptr("/items/0/done", json!(true)).expect("set");
        assert_eq!(draft.patches()[0].path, p(&["items", "0", "done"]));
        assert_eq!(draft.patches()[0].id, Some(Key::Int(1)));
    }

    #[test]
    fn whole_item_and_field_assignment_carry_no_id() {
        let ids = todos();
        let mut draft = Draft::new(state(json!({"items": [{"id": 1, "done": false}]})), Some(&ids));
        draft.set_ptr("/items/0", json!({"id": 1, "done": true})).expect("set item");
        draft.set_ptr("/items", json!([{"id": 1, "done": false}])).expect("set field");
        let paths: Vec<_> = draft.patches().iter().map(|p| (p.pointer(), p.id.clone())).collect();
        assert_eq!(paths, vec![("/items/0".to_string(), None), ("/items".to_string(), None)]);
    }

    #[test]
    fn remove_item_has_no_id_but_removing_a_property_does() {
        let ids = todos();
        let mut draft = Draft::new(state(json!({"items": [{"id": "a", "note": "x"}, {"id": "b"}]})), Some(&ids));
        draft.remove_ptr("/items/0/note").expect("remove property");
        let removed = draft.remove_ptr("/items/0").expect("remove item");
        assert_eq!(removed, json!({"id": "a"}));
        assert_eq!(draft.patches()[0].id, Some(Key::from("a")));
        assert_eq!(draft.patches()[1].op, PatchOp::Remove);
        assert_eq!(draft.patches()[1].id, None);
        assert_eq!(draft.state()["items"], json!([{"id": "b"}]));
    }

    #[test]
    fn nested_config_identifies_inner_items() {
        let ids = ItemIdConfig::new().nested("project", ItemIdConfig::new().by_property("tasks", "key"));
        let mut draft = Draft::new(state(json!({"project": {"tasks": [{"key": 0, "done": false}]}})), Some(&ids));
        draft.set_ptr("/project/tasks/0/done", json!(true)).expect("set");
        assert_eq!(draft.patches()[0].id, Some(Key::Int(0)));
    }

    #[test]
    fn push_insert_and_dash_append() {
        let mut draft = Draft::new(state(json!({"xs": [1]})), None);
        draft.push_ptr("/xs", json!(3)).expect("push");
        draft.insert_ptr("/xs/1", json!(2)).expect("insert");
        draft.set_ptr("/xs/-", json!(4)).expect("append");
        assert_eq!(draft.state()["xs"], json!([1, 2, 3, 4]));
        let pointers: Vec<_> = draft.patches().iter().map(Patch::pointer).collect();
        assert_eq!(pointers, vec!["/xs/1", "/xs/1", "/xs/3"]);
        assert!(draft.patches().iter().all(|p| p.op == PatchOp::Add));
    }

    #[test]
    fn truncate_records_length_reduction() {
        let mut draft = Draft::new(state(json!({"xs": [1, 2, 3]})), None);
        draft.truncate_ptr("/xs", 1).expect("truncate");
        draft.truncate_ptr("/xs", 1).expect("no-op truncate");
        assert_eq!(draft.patches(), &[Patch::replace(p(&["xs", "length"]), json!(1), Some(json!(3)))]);
        assert_eq!(
            draft.set_ptr("/xs/length", json!(5)),
            Err(DraftError::InvalidLength { path: "/xs".into(), length: "5".into() })
        );
    }

    #[test]
    fn errors_leave_no_patch() {
        let mut draft = Draft::new(state(json!({"xs": [1], "o": {}})), None);
        assert_eq!(draft.set(&[], json!({})), Err(DraftError::RootPath));
        assert_eq!(draft.set_ptr("count", json!(1)), Err(DraftError::InvalidPointer("count".into())));
        assert_eq!(draft.set_ptr("/missing/a", json!(1)), Err(DraftError::PathNotFound("/missing/a".into())));
        assert_eq!(
            draft.set_ptr("/xs/5", json!(1)),
            Err(DraftError::IndexOutOfBounds { path: "/xs/5".into(), index: 5, len: 1 })
        );
        assert_eq!(draft.push_ptr("/o", json!(1)), Err(DraftError::NotAnArray("/o".into())));
        assert_eq!(draft.remove_ptr("/o/nope"), Err(DraftError::PathNotFound("/o/nope".into())));
        assert!(draft.patches().is_empty());
    }

    #[test]
    fn edit_diffs_subtree_and_tags_item_changes() {
        let ids = todos();
        let mut draft = Draft::new(state(json!({"items": [{"id": 7, "done": false, "tags": []}]})), Some(&ids));
        draft
            .edit_ptr("/items/0", |item| {
                item["done"] = json!(true);
                if let Some(tags) = item["tags"].as_array_mut() {
                    tags.push(json!("x"));
                }
            })
            .expect("edit");
        let seen: Vec<_> = draft.patches().iter().map(|p| (p.pointer(), p.id.clone())).collect();
        assert_eq!(
            seen,
            vec![("/items/0/done".to_string(), Some(Key::Int(7))), ("/items/0/tags/0".to_string(), Some(Key::Int(7)))]
        );
    }

    #[test]
    fn edit_state_falls_back_to_full_diff() {
        let mut draft = Draft::new(state(json!({"a": 1, "b": {"x": 1}})), None);
        draft.edit_state(|s| {
            s.insert("a".into(), json!(2));
            s["b"]["x"] = json!(2);
        });
        let pointers: Vec<_> = draft.patches().iter().map(Patch::pointer).collect();
        assert_eq!(pointers, vec!["/a", "/b/x"]);
    }
}

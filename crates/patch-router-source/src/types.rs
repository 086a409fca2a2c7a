//! Core types for the patch model.
//!
//! A [`Patch`] is one structural change record produced by a
//! [`PatchSource`](crate::PatchSource). Its `path` always starts with the
//! top-level field name of the state that changed.

use std::fmt;

use serde_json::{Map, Value};

/// The state tree a store holds: top-level field name → value.
pub type State = Map<String, Value>;

// ── Path ──────────────────────────────────────────────────────────────────

/// A step in a patch path.
///
/// Object members are addressed by [`PathSegment::Key`], array elements by
/// [`PathSegment::Index`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A patch path, root first.
pub type Path = Vec<PathSegment>;

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Key(_) => None,
            PathSegment::Index(idx) => Some(*idx),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(idx: usize) -> Self {
        PathSegment::Index(idx)
    }
}

/// Format a path as a JSON Pointer (RFC 6901) string.
pub fn format_pointer(path: &[PathSegment]) -> String {
    let mut ptr = String::with_capacity(path.len() * 8);
    for step in path {
        ptr.push('/');
        match step {
            PathSegment::Key(key) => ptr.push_str(&key.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(idx) => ptr.push_str(&idx.to_string()),
        }
    }
    ptr
}

/// Parse a JSON Pointer (RFC 6901) into key segments. `""` is the root.
///
/// Every token comes back as [`PathSegment::Key`]; whether a numeric token
/// addresses an array element depends on the value it is applied to.
pub fn parse_pointer(ptr: &str) -> Option<Path> {
    if ptr.is_empty() {
        return Some(Vec::new());
    }
    let rest = ptr.strip_prefix('/')?;
    rest.split('/')
        .map(|token| {
            if token.replace("~0", "").replace("~1", "").contains('~') {
                return None;
            }
            Some(PathSegment::Key(token.replace("~1", "/").replace("~0", "~")))
        })
        .collect()
}

// ── Key ───────────────────────────────────────────────────────────────────

/// A subscription key: either a literal collection key or an item identity.
///
/// `Key::Int(0)` and `Key::Str(String::new())` are ordinary keys; only the
/// absence of a key (`None`) disables keyed routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl Key {
    /// Read a key out of a JSON value. Strings and integral numbers qualify;
    /// everything else (including `null`) has no key.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(Key::Int),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Str(s) => Value::String(s.clone()),
            Key::Int(i) => Value::from(*i),
        }
    }

    /// Look up this key in a collection value: a member of an object, or an
    /// element of an array for integer keys.
    pub fn lookup<'a>(&self, collection: &'a Value) -> Option<&'a Value> {
        match (self, collection) {
            (Key::Str(s), Value::Object(map)) => map.get(s),
            (Key::Int(i), Value::Object(map)) => map.get(&i.to_string()),
            (Key::Int(i), Value::Array(arr)) => usize::try_from(*i).ok().and_then(|i| arr.get(i)),
            (Key::Str(s), Value::Array(arr)) => s.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i64::from(i))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Int(i as i64)
    }
}

impl From<&PathSegment> for Key {
    fn from(step: &PathSegment) -> Self {
        match step {
            PathSegment::Key(key) => Key::Str(key.clone()),
            PathSegment::Index(idx) => Key::Int(*idx as i64),
        }
    }
}

// ── Patch ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Replace => "replace",
            PatchOp::Remove => "remove",
        }
    }
}

/// One structural change record.
///
/// `id` carries the identity of the ordered-collection item whose property
/// changed. It is only set for in-place property updates of an existing
/// item, never for removals or whole-item/whole-field replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub path: Path,
    pub op: PatchOp,
    pub value: Option<Value>,
    pub old_value: Option<Value>,
    pub id: Option<Key>,
}

impl Patch {
    pub fn add(path: Path, value: Value) -> Self {
        Self { path, op: PatchOp::Add, value: Some(value), old_value: None, id: None }
    }

    pub fn replace(path: Path, value: Value, old_value: Option<Value>) -> Self {
        Self { path, op: PatchOp::Replace, value: Some(value), old_value, id: None }
    }

    pub fn remove(path: Path, old_value: Option<Value>) -> Self {
        Self { path, op: PatchOp::Remove, value: None, old_value, id: None }
    }

    pub fn with_id(mut self, id: Key) -> Self {
        self.id = Some(id);
        self
    }

    /// The top-level field this patch belongs to.
    pub fn field(&self) -> Option<&PathSegment> {
        self.path.first()
    }

    pub fn pointer(&self) -> String {
        format_pointer(&self.path)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

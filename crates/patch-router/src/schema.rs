//! Field classification.
//!
//! A store classifies each top-level field once, at construction. The
//! classification decides how keyed events are addressed: ordered
//! collections by item identity, everything else by literal key.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use patch_router_source::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Primitive,
    /// A sequence; keyed events address its items by identity.
    Ordered,
    /// An object addressed by arbitrary key.
    Keyed,
}

impl FieldKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => FieldKind::Ordered,
            Value::Object(_) => FieldKind::Keyed,
            _ => FieldKind::Primitive,
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, FieldKind::Ordered)
    }
}

/// Field name → kind, in declaration order.
///
/// Deserializes from a plain map, e.g. `{"todos": "ordered", "users": "keyed"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: IndexMap<String, FieldKind>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    /// Classify the fields of an initial state by the shape of their values.
    pub fn infer(state: &State) -> Self {
        Self {
            fields: state.iter().map(|(name, value)| (name.clone(), FieldKind::of(value))).collect(),
        }
    }

    pub fn kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

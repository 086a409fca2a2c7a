//! Event addressing.
//!
//! Every top-level field gets a [`FieldId`] the first time the store sees it
//! (schema fields at construction). Events are addressed by [`EventName`],
//! so routing never builds event-name strings.

use std::fmt;

use indexmap::IndexMap;

use crate::schema::{FieldKind, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u32);

impl FieldId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// The wildcard event: every update, with the full patch list.
    Any,
    /// `<field>:updated`: the patches of one field.
    Updated(FieldId),
}

/// Interned field names and their fixed classification.
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldTable {
    fields: IndexMap<String, FieldKind>,
}

impl FieldTable {
    pub(crate) fn from_schema(schema: &Schema) -> Self {
        Self { fields: schema.iter().map(|(name, kind)| (name.to_string(), kind)).collect() }
    }

    /// The id of `name`, registering it first if needed. Fields unknown at
    /// construction are never ordered collections.
    pub(crate) fn intern(&mut self, name: &str) -> FieldId {
        if let Some(idx) = self.fields.get_index_of(name) {
            return FieldId(idx as u32);
        }
        let (idx, _) = self.fields.insert_full(name.to_string(), FieldKind::Primitive);
        FieldId(idx as u32)
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<FieldId> {
        self.fields.get_index_of(name).map(|idx| FieldId(idx as u32))
    }

    pub(crate) fn kind(&self, id: FieldId) -> FieldKind {
        self.fields.get_index(id.index()).map_or(FieldKind::Primitive, |(_, kind)| *kind)
    }

    pub(crate) fn name(&self, id: FieldId) -> Option<&str> {
        self.fields.get_index(id.index()).map(|(name, _)| name.as_str())
    }
}

/// Human-readable event label: `*` or `<field>:updated`.
pub struct EventLabel<'a> {
    pub(crate) event: EventName,
    pub(crate) field: Option<&'a str>,
}

impl fmt::Display for EventLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.event, self.field) {
            (EventName::Any, _) => f.write_str("*"),
            (EventName::Updated(_), Some(name)) => write!(f, "{name}:updated"),
            (EventName::Updated(id), None) => write!(f, "#{}:updated", id.index()),
        }
    }
}

//! Per-field item identity configuration.
//!
//! An ordered-collection field can only be subscribed to by item identity if
//! an extractor is configured for it. Object-valued fields may carry a nested
//! configuration for the arrays they contain.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::types::Key;

/// Extracts the logical identity of an ordered-collection item.
pub type ItemIdFn = Rc<dyn Fn(&Value) -> Option<Key>>;

#[derive(Clone)]
pub enum ItemIdRule {
    /// The field is an ordered collection; items are identified by this function.
    Extract(ItemIdFn),
    /// The field is an object; the rules apply to its members.
    Nested(ItemIdConfig),
}

impl fmt::Debug for ItemIdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemIdRule::Extract(_) => f.write_str("Extract(..)"),
            ItemIdRule::Nested(cfg) => f.debug_tuple("Nested").field(cfg).finish(),
        }
    }
}

/// Field name → identity rule, in insertion order.
#[derive(Clone, Default)]
pub struct ItemIdConfig {
    fields: IndexMap<String, ItemIdRule>,
}

impl ItemIdConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure an identity extractor for an ordered-collection field.
    pub fn field<F>(mut self, name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&Value) -> Option<Key> + 'static,
    {
        self.fields.insert(name.into(), ItemIdRule::Extract(Rc::new(extract)));
        self
    }

    /// Identify items by one of their properties, e.g. `by_property("todos", "id")`.
    ///
    /// Items whose property is missing, `null`, or not a string/integer have
    /// no identity.
    pub fn by_property(self, name: impl Into<String>, property: &str) -> Self {
        let property = property.to_string();
        self.field(name, move |item| item.get(&property).and_then(Key::from_value))
    }

    /// Configure the arrays nested inside an object-valued field.
    pub fn nested(mut self, name: impl Into<String>, config: ItemIdConfig) -> Self {
        self.fields.insert(name.into(), ItemIdRule::Nested(config));
        self
    }

    pub fn get(&self, field: &str) -> Option<&ItemIdRule> {
        self.fields.get(field)
    }

    /// The extractor configured for `field`, if the field is an identified
    /// ordered collection.
    pub fn extractor(&self, field: &str) -> Option<&ItemIdFn> {
        match self.fields.get(field) {
            Some(ItemIdRule::Extract(f)) => Some(f),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemIdRule)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for ItemIdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

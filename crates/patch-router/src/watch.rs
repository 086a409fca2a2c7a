//! Value-level subscriptions on top of the patch events.
//!
//! The `watch_*` methods deliver the current value after a change instead of
//! patches. [`Selection`] pairs a read with a subscription for one field or
//! one key, which is the shape UI adapters wrap.

use serde_json::Value;

use patch_router_emitter::ListenerId;
use patch_router_source::{Key, PatchSource};

use crate::error::StoreError;
use crate::store::{KeyMatch, Store};

impl<S: PatchSource + 'static> Store<S> {
    /// Call `listener` with the field's new value whenever it changes.
    pub fn watch_field<F>(&self, field: &str, listener: F) -> ListenerId
    where
        F: Fn(Option<&Value>) + 'static,
    {
        let store = self.downgrade();
        let name = field.to_string();
        self.on(field, move |_| {
            if let Some(store) = store.upgrade() {
                listener(store.get(&name).as_ref());
            }
        })
    }

    /// Call `listener` with the value at `field[key]` whenever that key is
    /// touched. `None` means the key no longer exists.
    pub fn watch_key<F>(&self, field: &str, key: impl Into<Key>, listener: F) -> ListenerId
    where
        F: Fn(Option<&Value>) + 'static,
    {
        let store = self.downgrade();
        let name = field.to_string();
        let key = key.into();
        self.on_key(field, KeyMatch::Key(key.clone()), move |_, _| {
            if let Some(store) = store.upgrade() {
                let collection = store.get(&name);
                listener(collection.as_ref().and_then(|c| key.lookup(c)));
            }
        })
    }

    /// Call `listener` with the current item whose identity is `id` whenever
    /// one of its properties changes in place.
    pub fn watch_item<F>(&self, field: &str, id: impl Into<Key>, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(Option<&Value>) + 'static,
    {
        let store = self.downgrade();
        let name = field.to_string();
        let id = id.into();
        self.on_item_id(field, KeyMatch::Key(id.clone()), move |_, _| {
            if let Some(store) = store.upgrade() {
                let item = store.find_item(&name, &id);
                listener(item.as_ref());
            }
        })
    }

    /// The item of an ordered-collection field whose identity is `id`.
    pub fn find_item(&self, field: &str, id: &Key) -> Option<Value> {
        let extract = self.item_id_config()?.extractor(field)?;
        match self.get(field)? {
            Value::Array(items) => items.into_iter().find(|item| extract(item).as_ref() == Some(id)),
            _ => None,
        }
    }

    /// A read/subscribe pair for a whole field.
    pub fn select(&self, field: &str) -> Selection<S> {
        Selection { store: self.clone(), field: field.to_string(), key: None }
    }

    /// A read/subscribe pair for one key of a keyed-collection field.
    pub fn select_key(&self, field: &str, key: impl Into<Key>) -> Selection<S> {
        Selection { store: self.clone(), field: field.to_string(), key: Some(key.into()) }
    }
}

/// A field, or one key of a field, that can be read and subscribed to.
pub struct Selection<S> {
    store: Store<S>,
    field: String,
    key: Option<Key>,
}

impl<S: PatchSource + 'static> Selection<S> {
    pub fn get(&self) -> Option<Value> {
        let value = self.store.get(&self.field)?;
        match &self.key {
            Some(key) => key.lookup(&value).cloned(),
            None => Some(value),
        }
    }

    /// Call `listener` with the selected value whenever it may have changed.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Option<&Value>) + 'static,
    {
        match &self.key {
            Some(key) => self.store.watch_key(&self.field, key.clone(), listener),
            None => self.store.watch_field(&self.field, listener),
        }
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.store.off(id)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }
}

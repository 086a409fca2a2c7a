//! The router: holds the state, applies updates, and routes their patches.
//!
//! # Routing
//!
//! Each [`Store::update`] emits, in order:
//! 1. the wildcard event with the full patch list (even when it is empty),
//! 2. one `<field>:updated` event per touched field, in first-seen order,
//! 3. for fields with keyed listeners, one keyed event per affected key,
//!    each carrying the field's full patch list.
//!
//! Keys of ordered collections are item identities and require an item id
//! function for the field. Keys of other fields are literal keys; when such
//! a field is replaced wholesale every registered key is notified, and when
//! its collection shrinks the vanished positions are notified.
//!
//! Mutations go through a [`Draft`], so the patches say how each change was
//! made: assigning a field or an item is a replacement, not an edit.
//!
//! All callbacks run synchronously. A callback may call `update` again: the
//! nested update routes completely before the outer one continues.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, trace};

use patch_router_emitter::{EventBus, KeySlot, ListenerId};
use patch_router_source::{
    Draft, DraftError, ItemIdConfig, ItemIdRule, Key, Patch, PatchSource, RecordingPatchSource, State,
};

use crate::error::StoreError;
use crate::event::{EventLabel, EventName, FieldId, FieldTable};
use crate::group::group_patches_by_field;
use crate::keys::{extract_keys_from_patches, vanished_keys};
use crate::schema::{FieldKind, Schema};

// ── Options ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Field classification. Inferred from the initial state when absent.
    pub schema: Option<Schema>,
    pub item_ids: Option<ItemIdConfig>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_item_ids(mut self, item_ids: ItemIdConfig) -> Self {
        self.item_ids = Some(item_ids);
        self
    }
}

/// A keyed subscription target: one key, or every key of the field.
///
/// The string `"*"` converts to [`KeyMatch::Any`]; use `KeyMatch::Key` to
/// address a literal `*` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyMatch {
    Key(Key),
    Any,
}

impl From<Key> for KeyMatch {
    fn from(key: Key) -> Self {
        KeyMatch::Key(key)
    }
}

impl From<&str> for KeyMatch {
    fn from(key: &str) -> Self {
        match key {
            "*" => KeyMatch::Any,
            key => KeyMatch::Key(Key::from(key)),
        }
    }
}

impl From<String> for KeyMatch {
    fn from(key: String) -> Self {
        match key.as_str() {
            "*" => KeyMatch::Any,
            _ => KeyMatch::Key(Key::from(key)),
        }
    }
}

impl From<i64> for KeyMatch {
    fn from(key: i64) -> Self {
        KeyMatch::Key(Key::Int(key))
    }
}

impl From<i32> for KeyMatch {
    fn from(key: i32) -> Self {
        KeyMatch::Key(Key::from(key))
    }
}

fn slot(key: impl Into<KeyMatch>) -> KeySlot<Key> {
    match key.into() {
        KeyMatch::Key(key) => KeySlot::Key(key),
        KeyMatch::Any => KeySlot::Any,
    }
}

// ── Store ─────────────────────────────────────────────────────────────────

pub(crate) struct Inner<S> {
    source: S,
    state: RefCell<Rc<State>>,
    fields: RefCell<FieldTable>,
    item_ids: Option<ItemIdConfig>,
    bus: EventBus<EventName, Key, [Patch]>,
}

/// Shared handle to a routed state tree.
///
/// Cloning is cheap and every clone addresses the same store, so listeners
/// can keep a handle and update from inside a callback.
pub struct Store<S = RecordingPatchSource> {
    inner: Rc<Inner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

/// Non-owning handle, for listeners that must not keep the store alive.
pub struct WeakStore<S = RecordingPatchSource> {
    inner: Weak<Inner<S>>,
}

impl<S> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self { inner: Weak::clone(&self.inner) }
    }
}

impl<S> WeakStore<S> {
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl Store<RecordingPatchSource> {
    /// A store over `initial` with an inferred schema and no item ids.
    pub fn new(initial: State) -> Self {
        let schema = Schema::infer(&initial);
        Self::build(initial, schema, None, RecordingPatchSource)
    }

    pub fn with_options(initial: State, options: StoreOptions) -> Result<Self, StoreError> {
        Self::with_source(initial, options, RecordingPatchSource)
    }
}

impl<S: PatchSource> Store<S> {
    /// A store that obtains its patches from `source`.
    ///
    /// Fails if an item id function is configured for a field that is not
    /// classified as an ordered collection.
    pub fn with_source(initial: State, options: StoreOptions, source: S) -> Result<Self, StoreError> {
        let schema = options.schema.unwrap_or_else(|| Schema::infer(&initial));
        if let Some(ids) = &options.item_ids {
            for (field, rule) in ids.iter() {
                if matches!(rule, ItemIdRule::Extract(_)) && schema.kind(field) != Some(FieldKind::Ordered) {
                    return Err(StoreError::ItemIdOnUnorderedField { field: field.to_string() });
                }
            }
        }
        Ok(Self::build(initial, schema, options.item_ids, source))
    }

    fn build(initial: State, schema: Schema, item_ids: Option<ItemIdConfig>, source: S) -> Self {
        Self {
            inner: Rc::new(Inner {
                source,
                state: RefCell::new(Rc::new(initial)),
                fields: RefCell::new(FieldTable::from_schema(&schema)),
                item_ids,
                bus: EventBus::new(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore { inner: Rc::downgrade(&self.inner) }
    }

    // ── Fields ────────────────────────────────────────────────────────────

    fn intern(&self, field: &str) -> FieldId {
        self.inner.fields.borrow_mut().intern(field)
    }

    /// The event a field's patches are routed on.
    pub fn field_event(&self, field: &str) -> EventName {
        EventName::Updated(self.intern(field))
    }

    /// The event of a field already known to the store, without interning.
    fn existing_event(&self, field: &str) -> Option<EventName> {
        self.inner.fields.borrow().lookup(field).map(EventName::Updated)
    }

    /// The label of an event: `*` or `<field>:updated`.
    pub fn event_label(&self, event: EventName) -> String {
        let fields = self.inner.fields.borrow();
        let field = match event {
            EventName::Updated(id) => fields.name(id),
            EventName::Any => None,
        };
        EventLabel { event, field }.to_string()
    }

    pub fn field_kind(&self, field: &str) -> FieldKind {
        let fields = self.inner.fields.borrow();
        fields.lookup(field).map_or(FieldKind::Primitive, |id| fields.kind(id))
    }

    /// Whether `field` was classified as an ordered collection at construction.
    pub fn is_ordered(&self, field: &str) -> bool {
        self.field_kind(field).is_ordered()
    }

    pub fn item_id_config(&self) -> Option<&ItemIdConfig> {
        self.inner.item_ids.as_ref()
    }

    fn has_item_id_fn(&self, field: &str) -> bool {
        self.inner.item_ids.as_ref().is_some_and(|ids| ids.extractor(field).is_some())
    }

    // ── State ─────────────────────────────────────────────────────────────

    /// The current value of a field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.state.borrow().get(field).cloned()
    }

    /// A copy of the current state. Every call returns a new copy.
    pub fn state(&self) -> State {
        State::clone(&self.inner.state.borrow())
    }

    fn snapshot(&self) -> Rc<State> {
        Rc::clone(&self.inner.state.borrow())
    }

    // ── Update ────────────────────────────────────────────────────────────

    /// Apply `mutate` to the state and route the resulting patches.
    ///
    /// Returns the full, unfiltered patch list. Panics raised by the mutation
    /// or by item id functions propagate unchanged. If the mutation fails, or
    /// the patch source produces a patch with an empty path, the update is
    /// rejected before the state is replaced or anything is emitted.
    pub fn update<F>(&self, mutate: F) -> Result<Vec<Patch>, StoreError>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<(), DraftError>,
    {
        let current = self.snapshot();
        let produced = self.inner.source.produce(&current, mutate, self.inner.item_ids.as_ref());
        drop(current);
        let (next, patches) = produced?;

        let grouped = group_patches_by_field(&patches)?;
        *self.inner.state.borrow_mut() = Rc::new(next);
        debug!("routing update: {} patches across {} fields", patches.len(), grouped.all.len());

        let bus = &self.inner.bus;
        bus.emit(&EventName::Any, &patches);

        for (field, field_patches) in &grouped.all {
            let event = self.field_event(field);
            bus.emit(&event, field_patches);

            if !bus.has_keyed_listeners(&event) {
                continue;
            }
            let is_ordered = self.is_ordered(field);
            if is_ordered && !self.has_item_id_fn(field) {
                trace!("{field}: keyed listeners present but no item id function, skipping keyed pass");
                continue;
            }

            let mut keys = extract_keys_from_patches(field_patches, is_ordered);
            if !is_ordered {
                if grouped.replaced_fields.contains(field) {
                    keys.extend(bus.keyed_listener_keys(&event));
                }
                if let Some(&reduction) = grouped.length_reductions.get(field) {
                    let registered = bus.keyed_listener_keys(&event);
                    let vanished = vanished_keys(reduction, &registered);
                    if (vanished.len() as u64) < reduction.old_length - reduction.new_length {
                        debug!("{field}: shrink of {reduction:?} narrowed to {} registered keys", vanished.len());
                    }
                    keys.extend(vanished);
                }
            }
            for key in &keys {
                let called = bus.emit_keyed(&event, key, field_patches);
                trace!("{field}:updated#{key} -> {called} listeners");
            }
        }
        Ok(patches)
    }

    // ── Field and wildcard subscriptions ─────────────────────────────────

    /// Listen to every patch under `field`.
    pub fn on<F>(&self, field: &str, listener: F) -> ListenerId
    where
        F: Fn(&[Patch]) + 'static,
    {
        self.inner.bus.on(self.field_event(field), listener)
    }

    pub fn once<F>(&self, field: &str, listener: F) -> ListenerId
    where
        F: Fn(&[Patch]) + 'static,
    {
        self.inner.bus.once(self.field_event(field), listener)
    }

    /// Listen to every update, with its full patch list.
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[Patch]) + 'static,
    {
        self.inner.bus.on(EventName::Any, listener)
    }

    pub fn once_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[Patch]) + 'static,
    {
        self.inner.bus.once(EventName::Any, listener)
    }

    /// Remove any listener registered on this store.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.bus.off(id)
    }

    // ── Key subscriptions ─────────────────────────────────────────────────

    /// Listen to one key (or every key) of a keyed-collection field.
    ///
    /// Fires when the key's value changes, when the key is deleted, and when
    /// the whole field is replaced. The listener receives the key and the
    /// field's full patch list.
    pub fn on_key<F>(&self, field: &str, key: impl Into<KeyMatch>, listener: F) -> ListenerId
    where
        F: Fn(&Key, &[Patch]) + 'static,
    {
        self.inner.bus.on_keyed(self.field_event(field), slot(key), listener)
    }

    pub fn once_key<F>(&self, field: &str, key: impl Into<KeyMatch>, listener: F) -> ListenerId
    where
        F: Fn(&Key, &[Patch]) + 'static,
    {
        self.inner.bus.once_keyed(self.field_event(field), slot(key), listener)
    }

    pub fn off_key(&self, id: ListenerId) -> bool {
        self.off(id)
    }

    // ── Item id subscriptions ─────────────────────────────────────────────

    fn require_item_id_fn(&self, field: &str) -> Result<(), StoreError> {
        if self.has_item_id_fn(field) {
            Ok(())
        } else {
            Err(StoreError::MissingItemIdConfig { field: field.to_string() })
        }
    }

    /// Listen to one item (or every item) of an ordered-collection field, by
    /// identity.
    ///
    /// Fires only when a property of an existing item changes in place; item
    /// removal and whole-item or whole-field replacement do not fire. Fails
    /// if no item id function is configured for `field`.
    pub fn on_item_id<F>(&self, field: &str, id: impl Into<KeyMatch>, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&Key, &[Patch]) + 'static,
    {
        self.require_item_id_fn(field)?;
        Ok(self.inner.bus.on_keyed(self.field_event(field), slot(id), listener))
    }

    pub fn once_item_id<F>(&self, field: &str, id: impl Into<KeyMatch>, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&Key, &[Patch]) + 'static,
    {
        self.require_item_id_fn(field)?;
        Ok(self.inner.bus.once_keyed(self.field_event(field), slot(id), listener))
    }

    pub fn off_item_id(&self, id: ListenerId) -> bool {
        self.off(id)
    }

    // ── Introspection ─────────────────────────────────────────────────────

    /// Plain listeners on `field`. Unknown fields have none.
    pub fn listener_count(&self, field: &str) -> usize {
        self.existing_event(field).map_or(0, |event| self.inner.bus.listener_count(&event))
    }

    pub fn keyed_listener_count(&self, field: &str) -> usize {
        self.existing_event(field).map_or(0, |event| self.inner.bus.keyed_listener_count(&event))
    }
}

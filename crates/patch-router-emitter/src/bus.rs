use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{KeySlot, ListenerId};

type Listener<P> = Rc<dyn Fn(&P)>;
type KeyedListener<K, P> = Rc<dyn Fn(&K, &P)>;

struct Entry<L> {
    listener: L,
    once: bool,
}

struct Channel<K, P: ?Sized> {
    plain: IndexMap<ListenerId, Entry<Listener<P>>>,
    keyed: IndexMap<K, IndexMap<ListenerId, Entry<KeyedListener<K, P>>>>,
    any: IndexMap<ListenerId, Entry<KeyedListener<K, P>>>,
}

impl<K, P: ?Sized> Default for Channel<K, P> {
    fn default() -> Self {
        Self { plain: IndexMap::new(), keyed: IndexMap::new(), any: IndexMap::new() }
    }
}

impl<K, P: ?Sized> Channel<K, P> {
    fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.keyed.is_empty() && self.any.is_empty()
    }
}

enum Location<E, K> {
    Plain(E),
    Keyed(E, KeySlot<K>),
}

struct Registry<E, K, P: ?Sized> {
    channels: HashMap<E, Channel<K, P>>,
    locations: HashMap<ListenerId, Location<E, K>>,
    next_id: u64,
}

/// Takes every listener out of `entries` for one emission: one-shot entries
/// are removed from the registry before anything runs.
fn drain_for_emit<L: Clone>(entries: &mut IndexMap<ListenerId, Entry<L>>, fired: &mut Vec<ListenerId>) -> Vec<L> {
    let out = entries.values().map(|e| e.listener.clone()).collect();
    entries.retain(|id, e| {
        if e.once {
            fired.push(*id);
        }
        !e.once
    });
    out
}

/// A listener registry with plain, keyed, and wildcard-keyed subscriptions.
///
/// Events are identified by `E`, keyed subscriptions by `K`, and listeners
/// receive the payload as `&P`. The bus is re-entrant: listeners are
/// collected before any of them runs, so a listener may subscribe,
/// unsubscribe, or emit again. Changes made during an emission take effect
/// from the next emission on.
pub struct EventBus<E, K, P: ?Sized> {
    registry: RefCell<Registry<E, K, P>>,
}

impl<E, K, P: ?Sized> Default for EventBus<E, K, P> {
    fn default() -> Self {
        Self {
            registry: RefCell::new(Registry { channels: HashMap::new(), locations: HashMap::new(), next_id: 1 }),
        }
    }
}

impl<E, K, P> EventBus<E, K, P>
where
    E: Eq + Hash + Clone,
    K: Eq + Hash + Clone,
    P: ?Sized,
{
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ──────────────────────────────────────────────────────

    fn add_plain(&self, event: E, listener: Listener<P>, once: bool) -> ListenerId {
        let mut reg = self.registry.borrow_mut();
        let id = ListenerId(reg.next_id);
        reg.next_id = reg.next_id.saturating_add(1);
        reg.channels.entry(event.clone()).or_default().plain.insert(id, Entry { listener, once });
        reg.locations.insert(id, Location::Plain(event));
        id
    }

    fn add_keyed(&self, event: E, slot: KeySlot<K>, listener: KeyedListener<K, P>, once: bool) -> ListenerId {
        let mut reg = self.registry.borrow_mut();
        let id = ListenerId(reg.next_id);
        reg.next_id = reg.next_id.saturating_add(1);
        let channel = reg.channels.entry(event.clone()).or_default();
        match &slot {
            KeySlot::Any => {
                channel.any.insert(id, Entry { listener, once });
            }
            KeySlot::Key(key) => {
                channel.keyed.entry(key.clone()).or_default().insert(id, Entry { listener, once });
            }
        }
        reg.locations.insert(id, Location::Keyed(event, slot));
        id
    }

    pub fn on<F>(&self, event: E, listener: F) -> ListenerId
    where
        F: Fn(&P) + 'static,
    {
        self.add_plain(event, Rc::new(listener), false)
    }

    /// Like [`EventBus::on`], but the listener is removed before its first call.
    pub fn once<F>(&self, event: E, listener: F) -> ListenerId
    where
        F: Fn(&P) + 'static,
    {
        self.add_plain(event, Rc::new(listener), true)
    }

    /// Subscribe to one key of `event`, or to every key with [`KeySlot::Any`].
    /// The listener receives the key the event was emitted for.
    pub fn on_keyed<F>(&self, event: E, slot: KeySlot<K>, listener: F) -> ListenerId
    where
        F: Fn(&K, &P) + 'static,
    {
        self.add_keyed(event, slot, Rc::new(listener), false)
    }

    pub fn once_keyed<F>(&self, event: E, slot: KeySlot<K>, listener: F) -> ListenerId
    where
        F: Fn(&K, &P) + 'static,
    {
        self.add_keyed(event, slot, Rc::new(listener), true)
    }

    /// Remove a listener of any kind. Returns `false` if it was not registered
    /// (already removed, or a one-shot listener that already fired).
    pub fn off(&self, id: ListenerId) -> bool {
        let mut reg = self.registry.borrow_mut();
        let Some(location) = reg.locations.remove(&id) else {
            return false;
        };
        let event = match &location {
            Location::Plain(event) | Location::Keyed(event, _) => event.clone(),
        };
        let Some(channel) = reg.channels.get_mut(&event) else {
            return false;
        };
        let removed = match location {
            Location::Plain(_) => channel.plain.shift_remove(&id).is_some(),
            Location::Keyed(_, KeySlot::Any) => channel.any.shift_remove(&id).is_some(),
            Location::Keyed(_, KeySlot::Key(key)) => {
                let removed = channel.keyed.get_mut(&key).is_some_and(|set| set.shift_remove(&id).is_some());
                if channel.keyed.get(&key).is_some_and(IndexMap::is_empty) {
                    channel.keyed.shift_remove(&key);
                }
                removed
            }
        };
        if channel.is_empty() {
            reg.channels.remove(&event);
        }
        removed
    }

    // ── Emission ──────────────────────────────────────────────────────────

    fn forget(&self, fired: Vec<ListenerId>) {
        if fired.is_empty() {
            return;
        }
        let mut reg = self.registry.borrow_mut();
        for id in fired {
            reg.locations.remove(&id);
        }
    }

    fn prune(&self, event: &E) {
        let mut reg = self.registry.borrow_mut();
        if reg.channels.get(event).is_some_and(Channel::is_empty) {
            reg.channels.remove(event);
        }
    }

    /// Call every plain listener of `event`, in registration order.
    /// Returns the number of listeners called.
    pub fn emit(&self, event: &E, payload: &P) -> usize {
        let mut fired = Vec::new();
        let listeners = {
            let mut reg = self.registry.borrow_mut();
            match reg.channels.get_mut(event) {
                Some(channel) => drain_for_emit(&mut channel.plain, &mut fired),
                None => return 0,
            }
        };
        self.forget(fired);
        self.prune(event);
        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    /// Call the listeners of `key` on `event`, then the wildcard listeners.
    /// Returns the number of listeners called.
    pub fn emit_keyed(&self, event: &E, key: &K, payload: &P) -> usize {
        let mut fired = Vec::new();
        let listeners = {
            let mut reg = self.registry.borrow_mut();
            let Some(channel) = reg.channels.get_mut(event) else {
                return 0;
            };
            let mut out = match channel.keyed.get_mut(key) {
                Some(set) => drain_for_emit(set, &mut fired),
                None => Vec::new(),
            };
            if channel.keyed.get(key).is_some_and(IndexMap::is_empty) {
                channel.keyed.shift_remove(key);
            }
            out.extend(drain_for_emit(&mut channel.any, &mut fired));
            out
        };
        self.forget(fired);
        self.prune(event);
        for listener in &listeners {
            listener(key, payload);
        }
        listeners.len()
    }

    // ── Introspection ─────────────────────────────────────────────────────

    /// Whether any keyed listener (including a wildcard one) exists for `event`.
    pub fn has_keyed_listeners(&self, event: &E) -> bool {
        let reg = self.registry.borrow();
        reg.channels.get(event).is_some_and(|c| !c.keyed.is_empty() || !c.any.is_empty())
    }

    /// The concrete keys with at least one listener on `event`, in the order
    /// they were first subscribed. The wildcard slot is not a key.
    pub fn keyed_listener_keys(&self, event: &E) -> Vec<K> {
        let reg = self.registry.borrow();
        reg.channels.get(event).map(|c| c.keyed.keys().cloned().collect()).unwrap_or_default()
    }

    /// Number of plain listeners registered for `event`.
    pub fn listener_count(&self, event: &E) -> usize {
        let reg = self.registry.borrow();
        reg.channels.get(event).map_or(0, |c| c.plain.len())
    }

    /// Number of keyed listeners (wildcard included) registered for `event`.
    pub fn keyed_listener_count(&self, event: &E) -> usize {
        let reg = self.registry.borrow();
        reg.channels
            .get(event)
            .map_or(0, |c| c.any.len() + c.keyed.values().map(IndexMap::len).sum::<usize>())
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.registry.borrow().locations.contains_key(&id)
    }
}

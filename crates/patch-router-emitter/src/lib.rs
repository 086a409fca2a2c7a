//! Single-threaded event emitter with plain, keyed, and wildcard-keyed
//! subscriptions.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use patch_router_emitter::{EventBus, KeySlot};
//!
//! let bus: EventBus<&str, u32, str> = EventBus::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let s = seen.clone();
//! bus.on_keyed("users", KeySlot::Any, move |key, payload| {
//!     s.borrow_mut().push(format!("{key}={payload}"));
//! });
//! bus.emit_keyed(&"users", &7, "renamed");
//!
//! assert_eq!(*seen.borrow(), vec!["7=renamed"]);
//! assert_eq!(bus.keyed_listener_keys(&"users"), Vec::<u32>::new());
//! ```

mod bus;

pub use bus::EventBus;

/// Handle returned by every subscription call; pass it to [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Which keys a keyed subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySlot<K> {
    Key(K),
    /// The wildcard: every key emitted on the event.
    Any,
}

impl<K> KeySlot<K> {
    pub fn key(&self) -> Option<&K> {
        match self {
            KeySlot::Key(key) => Some(key),
            KeySlot::Any => None,
        }
    }
}

impl<K> From<K> for KeySlot<K> {
    fn from(key: K) -> Self {
        KeySlot::Key(key)
    }
}

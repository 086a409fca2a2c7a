//! Patch-driven event router.
//!
//! A [`Store`] holds a state tree. Every [`Store::update`] runs a mutation
//! against a [`Draft`] through a [`PatchSource`], then routes the resulting
//! patches to subscribers at three granularities: every update, one field,
//! or one key / item identity within a field.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use patch_router::{ItemIdConfig, Store, StoreOptions};
//! use serde_json::json;
//!
//! let initial = match json!({"todos": [{"id": 1, "done": false}], "count": 0}) {
//!     serde_json::Value::Object(map) => map,
//!     _ => unreachable!(),
//! };
//! let options = StoreOptions::new().with_item_ids(ItemIdConfig::new().by_property("todos", "id"));
//! let store = Store::with_options(initial, options).unwrap();
//!
//! let hits = Rc::new(Cell::new(0));
//! let h = hits.clone();
//! store.on_item_id("todos", 1, move |_, _| h.set(h.get() + 1)).unwrap();
//!
//! store.update(|d| d.set_ptr("/todos/0/done", json!(true))).unwrap();
//! assert_eq!(hits.get(), 1);
//!
//! // Replacing or removing the item does not notify identity subscribers.
//! store.update(|d| d.set_ptr("/todos/0", json!({"id": 1, "done": false}))).unwrap();
//! store.update(|d| d.remove_ptr("/todos/0").map(|_| ())).unwrap();
//! assert_eq!(hits.get(), 1);
//! ```

pub mod cli;
pub mod error;
pub mod event;
pub mod group;
pub mod keys;
pub mod schema;
pub mod store;
pub mod watch;

pub use error::StoreError;
pub use event::{EventName, FieldId};
pub use group::{group_patches_by_field, GroupedPatches, LengthReduction};
pub use keys::{extract_keys_from_patches, vanished_keys, MAX_VANISHED_KEYS};
pub use schema::{FieldKind, Schema};
pub use store::{KeyMatch, Store, StoreOptions, WeakStore};
pub use watch::Selection;

pub use patch_router_emitter::ListenerId;
pub use patch_router_source::{
    DiffPatchSource, Draft, DraftError, ItemIdConfig, ItemIdRule, Key, Patch, PatchOp, PatchSource, PathSegment,
    RecordingPatchSource, State,
};

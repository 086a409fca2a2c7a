//! Patch model and patch sources for `patch-router`.
//!
//! A [`PatchSource`] turns `(state, mutation)` into `(new state, patches)`.
//! Mutations run against a [`Draft`], whose path-addressed `set`, `remove`,
//! `push` and `truncate` calls record one patch per change.
//! [`RecordingPatchSource`] returns those patches as recorded;
//! [`DiffPatchSource`] diffs the result instead. Patches inside an item of an
//! identified ordered collection carry the item's id ([`ItemIdConfig`]).
//!
//! # Example
//!
//! ```
//! use patch_router_source::{ItemIdConfig, Key, PatchSource, RecordingPatchSource, State};
//! use serde_json::json;
//!
//! let mut state = State::new();
//! state.insert("items".into(), json!([{"id": 1, "done": false}]));
//! let ids = ItemIdConfig::new().by_property("items", "id");
//!
//! let (next, patches) = RecordingPatchSource
//!     .produce(&state, |d| d.set_ptr("/items/0/done", json!(true)), Some(&ids))
//!     .unwrap();
//! assert_eq!(next["items"][0]["done"], json!(true));
//! assert_eq!(patches[0].id, Some(Key::Int(1)));
//!
//! // Assigning the whole item is a replacement, not an edit of item 1.
//! let (_, patches) = RecordingPatchSource
//!     .produce(&next, |d| d.set_ptr("/items/0", json!({"id": 1, "done": false})), Some(&ids))
//!     .unwrap();
//! assert_eq!(patches[0].id, None);
//! ```

pub mod codec;
pub mod diff;
pub mod draft;
pub mod item_id;
pub mod source;
pub mod types;
pub mod util;

pub use codec::{from_json, from_json_patches, to_json, to_json_patches, CodecError};
pub use diff::{diff_state, diff_value};
pub use draft::{Draft, DraftError};
pub use item_id::{ItemIdConfig, ItemIdFn, ItemIdRule};
pub use source::{DiffPatchSource, PatchSource, RecordingPatchSource};
pub use types::{format_pointer, parse_pointer, Key, Patch, PatchOp, Path, PathSegment, State};
pub use util::{matcher, path_starts_with, patches_under};

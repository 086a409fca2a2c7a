use std::cell::RefCell;
use std::rc::Rc;

use patch_router::{
    DiffPatchSource, Draft, DraftError, FieldKind, ItemIdConfig, ItemIdRule, Key, KeyMatch, Patch, PatchSource,
    PathSegment, Schema, State, Store, StoreError, StoreOptions,
};
use serde_json::{json, Value};

// ── Helpers ───────────────────────────────────────────────────────────────

fn state(v: Value) -> State {
    match v {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn todo_store(items: Value) -> Store {
    let options = StoreOptions::new().with_item_ids(ItemIdConfig::new().by_property("items", "id"));
    Store::with_options(state(json!({ "items": items })), options).expect("store")
}

/// Hands out pre-baked patches and leaves the state untouched.
struct CannedSource(Vec<Patch>);

impl PatchSource for CannedSource {
    fn produce<F>(&self, state: &State, _mutate: F, _ids: Option<&ItemIdConfig>) -> Result<(State, Vec<Patch>), DraftError>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<(), DraftError>,
    {
        Ok((state.clone(), self.0.clone()))
    }
}

// ── Field and wildcard events ─────────────────────────────────────────────

#[test]
fn field_listener_receives_replace_patch() {
    let store = Store::new(state(json!({"count": 0, "name": "x"})));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    store.on("count", move |patches| s.borrow_mut().push(patches.to_vec()));

    store.update(|d| d.set_ptr("/count", json!(1))).expect("update");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[0][0].path, vec![PathSegment::from("count")]);
    assert_eq!(seen[0][0].value, Some(json!(1)));
    assert_eq!(patch_router_source::to_json(&seen[0][0])["op"], json!("replace"));
}

#[test]
fn wildcard_fires_even_without_patches() {
    let store = Store::new(state(json!({"count": 0})));
    let calls = log();
    let c = calls.clone();
    store.on_any(move |patches| c.borrow_mut().push(format!("any:{}", patches.len())));
    let c = calls.clone();
    store.on("count", move |_| c.borrow_mut().push("count".into()));

    let patches = store.update(|_| Ok(())).expect("update");

    assert!(patches.is_empty());
    assert_eq!(*calls.borrow(), vec!["any:0"]);
}

#[test]
fn two_fields_fire_once_each_in_first_seen_order() {
    let store = Store::new(state(json!({"a": 0, "b": 0, "c": 0})));
    let calls = log();
    for field in ["a", "b", "c"] {
        let c = calls.clone();
        store.on(field, move |patches| c.borrow_mut().push(format!("{field}:{}", patches.len())));
    }
    let c = calls.clone();
    store.on_any(move |patches| c.borrow_mut().push(format!("*:{}", patches.len())));

    store
        .update(|d| {
            d.set_ptr("/b", json!(1))?;
            d.set_ptr("/a", json!(1))
        })
        .expect("update");

    // Fields fire in the order the mutation touched them.
    assert_eq!(*calls.borrow(), vec!["*:2", "b:1", "a:1"]);
}

#[test]
fn field_event_includes_deep_patches() {
    let store = Store::new(state(json!({"users": {"u1": {"profile": {"name": "a", "age": 1}}}})));
    let sizes = log();
    let s = sizes.clone();
    store.on("users", move |patches| {
        s.borrow_mut().extend(patches.iter().map(Patch::pointer));
    });
    store
        .update(|d| {
            d.set_ptr("/users/u1/profile/name", json!("b"))?;
            d.set_ptr("/users/u1/profile/age", json!(2))
        })
        .expect("update");
    assert_eq!(*sizes.borrow(), vec!["/users/u1/profile/name", "/users/u1/profile/age"]);
}

#[test]
fn update_returns_unfiltered_patch_list() {
    let store = Store::new(state(json!({"a": 0, "b": {"x": 1}})));
    let patches = store
        .update(|d| {
            d.set_ptr("/a", json!(5))?;
            d.set_ptr("/b/x", json!(2))
        })
        .expect("update");
    assert_eq!(patches.len(), 2);
}

#[test]
fn once_listener_fires_on_first_update_only() {
    let store = Store::new(state(json!({"count": 0})));
    let calls = log();
    let c = calls.clone();
    store.once("count", move |_| c.borrow_mut().push("once".into()));
    let c = calls.clone();
    store.once_any(move |_| c.borrow_mut().push("once-any".into()));
    store.update(|d| d.set_ptr("/count", json!(1))).expect("update");
    store.update(|d| d.set_ptr("/count", json!(2))).expect("update");
    assert_eq!(*calls.borrow(), vec!["once-any", "once"]);
    assert_eq!(store.listener_count("count"), 0);
}

// ── Key subscriptions ─────────────────────────────────────────────────────

#[test]
fn key_listener_fires_on_mutation_and_deletion() {
    let store = Store::new(state(json!({"users": {"user-1": {"name": "a"}, "user-2": {"name": "b"}}})));
    let calls = log();
    let c = calls.clone();
    store.on_key("users", "user-1", move |key, patches| c.borrow_mut().push(format!("{key}:{}", patches.len())));

    store.update(|d| d.set_ptr("/users/user-2/name", json!("c"))).expect("update");
    assert!(calls.borrow().is_empty());

    store.update(|d| d.set_ptr("/users/user-1/name", json!("z"))).expect("update");
    store.update(|d| d.remove_ptr("/users/user-1").map(|_| ())).expect("update");
    assert_eq!(*calls.borrow(), vec!["user-1:1", "user-1:1"]);
}

#[test]
fn whole_field_replacement_notifies_every_registered_key() {
    let store = Store::new(state(json!({"users": {"user-1": {"n": 1}}})));
    let calls = log();
    for key in ["user-1", "ghost"] {
        let c = calls.clone();
        store.on_key("users", key, move |key, _| c.borrow_mut().push(key.to_string()));
    }

    store
        .update(|d| d.set_ptr("/users", json!({"user-1": {"n": 1}, "user-2": {"n": 2}})))
        .expect("update");
    assert_eq!(*calls.borrow(), vec!["user-1", "ghost"]);

    store.update(|d| d.set_ptr("/users", json!(null))).expect("update");
    assert_eq!(*calls.borrow(), vec!["user-1", "ghost", "user-1", "ghost"]);
}

#[test]
fn diff_fallback_reports_field_assignment_as_nested_changes() {
    let store = Store::with_source(state(json!({"users": {"user-1": {"n": 1}}})), StoreOptions::new(), DiffPatchSource)
        .expect("store");
    let calls = log();
    let c = calls.clone();
    store.on_key("users", KeyMatch::Any, move |key, _| c.borrow_mut().push(key.to_string()));

    let patches = store
        .update(|d| d.set_ptr("/users", json!({"user-1": {"n": 1}, "user-2": {"n": 2}})))
        .expect("update");

    assert_eq!(patches.iter().map(Patch::pointer).collect::<Vec<_>>(), vec!["/users/user-2"]);
    assert_eq!(*calls.borrow(), vec!["user-2"]);
}

#[test]
fn replacement_via_patch_source_notifies_registered_keys() {
    let replace = Patch::replace(
        vec!["users".into()],
        json!({"user-1": {}, "user-2": {}}),
        Some(json!({"user-1": {}})),
    );
    let store = Store::with_source(state(json!({"users": {"user-1": {}}})), StoreOptions::new(), CannedSource(vec![replace]))
        .expect("store");
    let calls = log();
    let c = calls.clone();
    store.on_key("users", "user-1", move |key, patches| c.borrow_mut().push(format!("{key}:{}", patches.len())));

    store.update(|_| Ok(())).expect("update");
    assert_eq!(*calls.borrow(), vec!["user-1:1"]);
}

#[test]
fn wildcard_key_listener_receives_each_key() {
    let store = Store::new(state(json!({"users": {"a": 1, "b": 2}})));
    let calls = log();
    let c = calls.clone();
    store.on_key("users", KeyMatch::Any, move |key, _| c.borrow_mut().push(key.to_string()));
    store
        .update(|d| {
            d.set_ptr("/users/b", json!(3))?;
            d.set_ptr("/users/a", json!(4))
        })
        .expect("update");
    assert_eq!(*calls.borrow(), vec!["b", "a"]);
}

#[test]
fn star_key_subscribes_to_every_key() {
    let store = Store::new(state(json!({"users": {"a": 1, "b": 2}})));
    let calls = log();
    let c = calls.clone();
    store.on_key("users", "*", move |key, _| c.borrow_mut().push(key.to_string()));
    assert_eq!(store.keyed_listener_count("users"), 1);

    store.update(|d| d.set_ptr("/users/b", json!(3))).expect("update");
    store.update(|d| d.set_ptr("/users/c", json!(4))).expect("update");
    assert_eq!(*calls.borrow(), vec!["b", "c"]);
}

#[test]
fn shrinking_unordered_array_notifies_vanished_positions() {
    let options = StoreOptions::new().with_schema(Schema::new().field("slots", FieldKind::Keyed));
    let store = Store::with_options(state(json!({"slots": ["a", "b", "c", "d"]})), options).expect("store");
    let calls = log();
    let c = calls.clone();
    store.on_key("slots", KeyMatch::Any, move |key, _| c.borrow_mut().push(key.to_string()));

    store.update(|d| d.truncate_ptr("/slots", 1)).expect("update");

    // "length" from the patch path, then the vanished indices.
    assert_eq!(*calls.borrow(), vec!["length", "1", "2", "3"]);
}

#[test]
fn huge_length_reduction_notifies_only_registered_positions() {
    let shrink = Patch::replace(vec!["slots".into(), "length".into()], json!(2), Some(json!(u64::MAX)));
    let options = StoreOptions::new().with_schema(Schema::new().field("slots", FieldKind::Keyed));
    let store = Store::with_source(state(json!({"slots": []})), options, CannedSource(vec![shrink])).expect("store");
    let calls = log();
    for key in [1i64, 7, i64::MAX] {
        let c = calls.clone();
        store.on_key("slots", key, move |key, _| c.borrow_mut().push(key.to_string()));
    }

    store.update(|_| Ok(())).expect("update");
    assert_eq!(*calls.borrow(), vec!["7", i64::MAX.to_string().as_str()]);
}

#[test]
fn once_key_fires_once() {
    let store = Store::new(state(json!({"users": {"a": 1}})));
    let calls = log();
    let c = calls.clone();
    store.once_key("users", "a", move |key, _| c.borrow_mut().push(key.to_string()));
    store.update(|d| d.set_ptr("/users/a", json!(2))).expect("update");
    store.update(|d| d.set_ptr("/users/a", json!(3))).expect("update");
    assert_eq!(*calls.borrow(), vec!["a"]);
}

// ── Item id subscriptions ─────────────────────────────────────────────────

#[test]
fn item_id_listener_fires_on_property_update_only() {
    let store = todo_store(json!([{"id": 1, "done": false}]));
    let calls = log();
    let c = calls.clone();
    store
        .on_item_id("items", 1, move |id, _| c.borrow_mut().push(id.to_string()))
        .expect("subscribe");

    store.update(|d| d.set_ptr("/items/0/done", json!(true))).expect("update");
    assert_eq!(calls.borrow().len(), 1);

    store.update(|d| d.remove_ptr("/items/0").map(|_| ())).expect("update");
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn item_id_listener_ignores_item_and_field_replacement() {
    let store = todo_store(json!([{"id": 1, "done": false}, {"id": 2, "done": false}]));
    let calls = log();
    let c = calls.clone();
    store
        .on_item_id("items", KeyMatch::Any, move |id, _| c.borrow_mut().push(id.to_string()))
        .expect("subscribe");

    // Same identity, new value: still a replacement of the item.
    store.update(|d| d.set_ptr("/items/0", json!({"id": 1, "done": true}))).expect("update");
    // Same identities throughout the field.
    store
        .update(|d| d.set_ptr("/items", json!([{"id": 1, "done": false}, {"id": 2, "done": true}])))
        .expect("update");
    // New identity, then a non-array.
    store.update(|d| d.set_ptr("/items/0", json!({"id": 3, "done": true}))).expect("update");
    store.update(|d| d.set_ptr("/items", json!(null))).expect("update");

    assert!(calls.borrow().is_empty());
}

#[test]
fn item_replacement_reaches_field_listeners_without_id() {
    let store = todo_store(json!([{"id": 1, "done": false}]));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    store.on("items", move |patches| s.borrow_mut().extend(patches.iter().map(|p| (p.pointer(), p.id.clone()))));

    store.update(|d| d.set_ptr("/items/0", json!({"id": 1, "done": true}))).expect("update");
    store.update(|d| d.set_ptr("/items", json!([{"id": 1, "done": false}]))).expect("update");

    assert_eq!(*seen.borrow(), vec![("/items/0".to_string(), None), ("/items".to_string(), None)]);
}

#[test]
fn falsy_identities_are_valid_keys() {
    let options = StoreOptions::new().with_item_ids(ItemIdConfig::new().field("items", |item: &Value| {
        item.get("id").and_then(Key::from_value)
    }));
    let store = Store::with_options(state(json!({"items": [{"id": 0, "v": 0}, {"id": "", "v": 0}, {"v": 0}]})), options)
        .expect("store");
    let calls = log();
    let c = calls.clone();
    store
        .on_item_id("items", KeyMatch::Any, move |id, _| c.borrow_mut().push(format!("{id:?}")))
        .expect("subscribe");

    store
        .update(|d| {
            d.set_ptr("/items/0/v", json!(1))?;
            d.set_ptr("/items/1/v", json!(1))
        })
        .expect("update");

    assert_eq!(*calls.borrow(), vec!["Int(0)", "Str(\"\")"]);
}

#[test]
fn item_without_identity_never_produces_keyed_event() {
    let store = todo_store(json!([{"done": false}]));
    let calls = log();
    let c = calls.clone();
    store
        .on_item_id("items", KeyMatch::Any, move |id, _| c.borrow_mut().push(id.to_string()))
        .expect("subscribe");
    let c = calls.clone();
    store.on("items", move |_| c.borrow_mut().push("field".into()));

    store.update(|d| d.set_ptr("/items/0/done", json!(true))).expect("update");
    assert_eq!(*calls.borrow(), vec!["field"]);
}

#[test]
fn item_id_subscription_requires_configuration() {
    let store = Store::new(state(json!({"items": []})));
    let err = store.on_item_id("items", 1, |_, _| {}).unwrap_err();
    assert_eq!(err, StoreError::MissingItemIdConfig { field: "items".into() });
    let message = err.to_string();
    assert!(message.contains("`items`"));
    assert!(message.contains("configure"));

    let err = store.once_item_id("items", KeyMatch::Any, |_, _| {}).unwrap_err();
    assert_eq!(err, StoreError::MissingItemIdConfig { field: "items".into() });
}

#[test]
fn ordered_field_without_item_ids_skips_keyed_emission() {
    let store = Store::new(state(json!({"items": [{"id": 1, "done": false}]})));
    let calls = log();
    let c = calls.clone();
    store.on_key("items", KeyMatch::Any, move |key, _| c.borrow_mut().push(key.to_string()));
    let c = calls.clone();
    store.on("items", move |_| c.borrow_mut().push("field".into()));

    store.update(|d| d.set_ptr("/items/0/done", json!(true))).expect("update");
    assert_eq!(*calls.borrow(), vec!["field"]);
}

#[test]
fn off_item_id_stops_delivery() {
    let store = todo_store(json!([{"id": 1, "done": false}]));
    let calls = log();
    let c = calls.clone();
    let id = store
        .on_item_id("items", 1, move |id, _| c.borrow_mut().push(id.to_string()))
        .expect("subscribe");
    assert!(store.off_item_id(id));
    assert!(!store.off_item_id(id));
    store.update(|d| d.set_ptr("/items/0/done", json!(true))).expect("update");
    assert!(calls.borrow().is_empty());
}

#[test]
fn item_id_config_is_exposed() {
    let store = todo_store(json!([]));
    let cfg = store.item_id_config().expect("config");
    assert!(matches!(cfg.get("items"), Some(ItemIdRule::Extract(_))));
    assert!(Store::new(State::new()).item_id_config().is_none());
}

// ── State access and invariants ───────────────────────────────────────────

#[test]
fn state_returns_distinct_copies() {
    let store = Store::new(state(json!({"a": 1, "b": [1, 2]})));
    let mut first = store.state();
    let second = store.state();
    assert_eq!(first, second);
    first.insert("a".into(), json!(99));
    assert_eq!(store.get("a"), Some(json!(1)));
    assert_eq!(store.state(), second);
}

#[test]
fn empty_patch_path_is_rejected_without_side_effects() {
    let bad = Patch::replace(vec![], json!({}), None);
    let source = CannedSource(vec![Patch::replace(vec!["a".into()], json!(2), Some(json!(1))), bad]);
    let store = Store::with_source(state(json!({"a": 1})), StoreOptions::new(), source).expect("store");
    let calls = log();
    let c = calls.clone();
    store.on_any(move |_| c.borrow_mut().push("any".into()));

    let err = store.update(|_| Ok(())).unwrap_err();
    assert_eq!(err, StoreError::EmptyPatchPath { index: 1 });
    assert!(calls.borrow().is_empty());
    assert_eq!(store.get("a"), Some(json!(1)));
}

#[test]
fn item_id_panic_propagates_out_of_update() {
    let options = StoreOptions::new().with_item_ids(ItemIdConfig::new().field("items", |_: &Value| panic!("bad id")));
    let store = Store::with_options(state(json!({"items": [{"id": 1}]})), options).expect("store");
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        store.update(|d| d.set_ptr("/items/0/x", json!(1)))
    }));
    assert!(result.is_err());
    assert_eq!(store.get("items"), Some(json!([{"id": 1}])));
}

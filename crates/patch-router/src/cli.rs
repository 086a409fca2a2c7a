//! `patch-route` — show how an update is routed.
//!
//! Provides the logic behind the binary entry point: given the current state,
//! the next state, and optionally a schema and item id properties, it routes
//! the difference and renders one line per emitted event.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use thiserror::Error;

use patch_router_source::{to_json_patches, ItemIdConfig, Patch, State};

use crate::error::StoreError;
use crate::schema::Schema;
use crate::store::{KeyMatch, Store, StoreOptions};

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),
    #[error("{0}")]
    Store(#[from] StoreError),
}

fn parse_object(json: &str, what: &'static str) -> Result<State, CliError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::NotAnObject(what)),
    }
}

fn render(label: &str, patches: &[Patch]) -> String {
    format!("{label} {}", to_json_patches(patches))
}

// ── patch-route ───────────────────────────────────────────────────────────

/// Route the update from `state_json` to `next_json`.
///
/// `item_ids_json` maps ordered-collection fields to the item property that
/// holds their identity, e.g. `{"todos": "id"}`. Every field gets a plain and
/// a wildcard keyed listener, so all keyed emissions are shown as
/// `<field>:updated#<key>`.
pub fn route_json(
    state_json: &str,
    next_json: &str,
    schema_json: Option<&str>,
    item_ids_json: Option<&str>,
) -> Result<String, CliError> {
    let state = parse_object(state_json, "state")?;
    let next = parse_object(next_json, "next state")?;

    let mut options = StoreOptions::new();
    if let Some(json) = schema_json {
        options = options.with_schema(serde_json::from_str::<Schema>(json)?);
    }
    if let Some(json) = item_ids_json {
        let props: IndexMap<String, String> = serde_json::from_str(json)?;
        let ids = props.iter().fold(ItemIdConfig::new(), |ids, (field, prop)| ids.by_property(field.as_str(), prop));
        options = options.with_item_ids(ids);
    }
    let store = Store::with_options(state.clone(), options)?;

    let lines = Rc::new(RefCell::new(Vec::new()));
    let out = lines.clone();
    store.on_any(move |patches| out.borrow_mut().push(render("*", patches)));

    let fields: IndexSet<String> = state.keys().chain(next.keys()).cloned().collect();
    for field in &fields {
        let label = store.event_label(store.field_event(field));
        let out = lines.clone();
        let plain = label.clone();
        store.on(field, move |patches| out.borrow_mut().push(render(&plain, patches)));
        let out = lines.clone();
        store.on_key(field, KeyMatch::Any, move |key, patches| {
            out.borrow_mut().push(render(&format!("{label}#{key}"), patches));
        });
    }

    store.update(move |d| {
        d.edit_state(|s| *s = next);
        Ok(())
    })?;
    let rendered = lines.borrow().join("\n");
    Ok(rendered)
}

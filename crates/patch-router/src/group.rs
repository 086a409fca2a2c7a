//! Patch grouping.
//!
//! One pass over an update's patches partitions them by top-level field and
//! records the two structural conditions that keyed routing has to
//! reconcile: whole-field replacement and a collection shrinking.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use patch_router_source::{Patch, PatchOp, PathSegment};

use crate::error::StoreError;

/// A field's collection got shorter: keys `new_length..old_length` are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthReduction {
    pub old_length: u64,
    pub new_length: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedPatches {
    /// Field → every patch under it, in update order. Fields appear in the
    /// order their first patch was seen.
    pub all: IndexMap<String, Vec<Patch>>,
    /// Field → positions (in the update's list) of the patches whose path has
    /// one or two segments.
    pub top_level: IndexMap<String, Vec<usize>>,
    /// Fields whose whole value was replaced, added, or removed.
    pub replaced_fields: IndexSet<String>,
    pub length_reductions: IndexMap<String, LengthReduction>,
}

fn field_name(step: &PathSegment) -> String {
    match step {
        PathSegment::Key(key) => key.clone(),
        PathSegment::Index(idx) => idx.to_string(),
    }
}

/// `[field, "length"]` replaced by a smaller non-negative integer.
fn length_reduction(patch: &Patch) -> Option<LengthReduction> {
    if patch.op != PatchOp::Replace || patch.path.len() != 2 || patch.path[1].as_key() != Some("length") {
        return None;
    }
    let new_length = patch.value.as_ref().and_then(Value::as_u64)?;
    let old_length = patch.old_value.as_ref().and_then(Value::as_u64)?;
    (new_length < old_length).then_some(LengthReduction { old_length, new_length })
}

/// Group an update's patches by top-level field.
///
/// A patch with an empty path would mean the state root itself was
/// replaced, which the store never allows; it fails the whole grouping.
pub fn group_patches_by_field(patches: &[Patch]) -> Result<GroupedPatches, StoreError> {
    let mut out = GroupedPatches::default();
    for (index, patch) in patches.iter().enumerate() {
        let Some(first) = patch.path.first() else {
            return Err(StoreError::EmptyPatchPath { index });
        };
        let field = field_name(first);

        if patch.path.len() <= 2 {
            out.top_level.entry(field.clone()).or_default().push(index);
            if patch.path.len() == 1 {
                out.replaced_fields.insert(field.clone());
            } else if let Some(reduction) = length_reduction(patch) {
                out.length_reductions.insert(field.clone(), reduction);
            }
        }
        out.all.entry(field).or_default().push(patch.clone());
    }
    Ok(out)
}

//! The patch source contract, its recording implementation and the
//! diff-based fallback.

use crate::diff::diff_state;
use crate::draft::{Draft, DraftError};
use crate::item_id::ItemIdConfig;
use crate::types::{Patch, State};

/// Applies a mutation to a state and reports what changed.
///
/// Implementations must not mutate `state` itself. The returned patch list
/// is ordered and may be empty; no patch may have an empty path. When the
/// mutation fails nothing is returned.
pub trait PatchSource {
    fn produce<F>(
        &self,
        state: &State,
        mutate: F,
        item_ids: Option<&ItemIdConfig>,
    ) -> Result<(State, Vec<Patch>), DraftError>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<(), DraftError>;
}

/// Runs the mutation on a [`Draft`] and returns the patches it recorded.
///
/// Every patch reflects how the change was made: assigning a field yields
/// one `replace` at the field, assigning an item yields one `replace` at the
/// item.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingPatchSource;

impl PatchSource for RecordingPatchSource {
    fn produce<F>(
        &self,
        state: &State,
        mutate: F,
        item_ids: Option<&ItemIdConfig>,
    ) -> Result<(State, Vec<Patch>), DraftError>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<(), DraftError>,
    {
        let mut draft = Draft::new(state.clone(), item_ids);
        mutate(&mut draft)?;
        Ok(draft.into_parts())
    }
}

/// Runs the mutation on a [`Draft`], then discards what it recorded and
/// diffs the result against the original state.
///
/// The diff cannot tell a wholesale assignment from an equivalent set of
/// in-place edits, so patches come out at the finest granularity.
/// Identity extractors are called while diffing; a panic inside one unwinds
/// through [`PatchSource::produce`] unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffPatchSource;

impl PatchSource for DiffPatchSource {
    fn produce<F>(
        &self,
        state: &State,
        mutate: F,
        item_ids: Option<&ItemIdConfig>,
    ) -> Result<(State, Vec<Patch>), DraftError>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<(), DraftError>,
    {
        let mut draft = Draft::new(state.clone(), item_ids);
        mutate(&mut draft)?;
        let (next, _) = draft.into_parts();
        let patches = diff_state(state, &next, item_ids);
        Ok((next, patches))
    }
}

//! Keyed-event key extraction.

use indexmap::IndexSet;

use patch_router_source::{Key, Patch};

use crate::group::LengthReduction;

/// Largest shrink whose vanished positions are enumerated one by one.
pub const MAX_VANISHED_KEYS: u64 = 1 << 16;

/// The keys one field's patches address.
///
/// Ordered collections are addressed by item identity only: a patch adds its
/// `id` when one is present (`0` and `""` included). Other fields are
/// addressed by the literal second path segment.
pub fn extract_keys_from_patches(patches: &[Patch], is_ordered: bool) -> IndexSet<Key> {
    let mut keys = IndexSet::new();
    for patch in patches {
        if is_ordered {
            if let Some(id) = &patch.id {
                keys.insert(id.clone());
            }
        } else if let Some(step) = patch.path.get(1) {
            keys.insert(Key::from(step));
        }
    }
    keys
}

/// The positional keys a length reduction removed.
///
/// Shrinks of at most [`MAX_VANISHED_KEYS`] positions yield every index in
/// `new_length..old_length`. Larger shrinks, or lengths beyond `i64`, yield
/// only the `registered` integer keys inside that range.
pub fn vanished_keys(reduction: LengthReduction, registered: &[Key]) -> Vec<Key> {
    let LengthReduction { old_length, new_length } = reduction;
    let span = old_length.saturating_sub(new_length);
    if span <= MAX_VANISHED_KEYS && i64::try_from(old_length).is_ok() {
        return (new_length..old_length).filter_map(|i| i64::try_from(i).ok()).map(Key::Int).collect();
    }
    registered
        .iter()
        .filter(|key| match key {
            Key::Int(i) => u64::try_from(*i).is_ok_and(|i| (new_length..old_length).contains(&i)),
            Key::Str(_) => false,
        })
        .cloned()
        .collect()
}

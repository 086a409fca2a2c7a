//! Path filtering helpers for patch consumers.
//!
//! Keyed subscribers receive every patch of their field; these helpers narrow
//! such a list down to a subtree.

use crate::types::{Patch, PathSegment};

// ── Path matcher ───────────────────────────────────────────────────────────

/// Creates a closure that returns `true` if a patch's path starts with the
/// given `prefix` path.
///
/// A patch matches when its path is equal to the prefix or has the prefix as
/// an ancestor.
///
/// # Example
///
/// ```
/// use patch_router_source::{matcher, Patch, PathSegment};
///
/// let prefix = vec![PathSegment::from("users"), PathSegment::from("u1")];
/// let is_under_u1 = matcher(&prefix);
///
/// let rename = Patch::add(
///     vec!["users".into(), "u1".into(), "name".into()],
///     serde_json::json!("Ann"),
/// );
/// assert!(is_under_u1(&rename));
///
/// let other = Patch::add(vec!["users".into(), "u2".into()], serde_json::json!({}));
/// assert!(!is_under_u1(&other));
/// ```
pub fn matcher(prefix: &[PathSegment]) -> impl Fn(&Patch) -> bool + '_ {
    move |patch: &Patch| path_starts_with(&patch.path, prefix)
}

/// Returns `true` if `prefix` is a prefix of `path` (or equal to it).
pub fn path_starts_with(path: &[PathSegment], prefix: &[PathSegment]) -> bool {
    if path.len() < prefix.len() {
        return false;
    }
    path[..prefix.len()] == *prefix
}

/// The patches touching `prefix` or anything below it, in original order.
pub fn patches_under<'a>(patches: &'a [Patch], prefix: &[PathSegment]) -> Vec<&'a Patch> {
    patches.iter().filter(|p| path_starts_with(&p.path, prefix)).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────

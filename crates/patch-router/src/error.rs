use thiserror::Error;

use patch_router_source::DraftError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A patch source produced a patch addressing the state root. The update
    /// is rejected and the held state is left unchanged.
    #[error("patch #{index} has an empty path; the root state can never be replaced")]
    EmptyPatchPath { index: usize },
    #[error(
        "no item id function configured for field `{field}`; \
         configure one with `ItemIdConfig::field(\"{field}\", ..)` before subscribing by item id"
    )]
    MissingItemIdConfig { field: String },
    #[error("field `{field}` has an item id function but is not an ordered collection")]
    ItemIdOnUnorderedField { field: String },
    /// The mutation failed. Nothing was committed or emitted.
    #[error("mutation failed: {0}")]
    Mutation(#[from] DraftError),
}

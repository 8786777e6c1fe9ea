// Retrieval core: dot-product ranking and the layer → card selection policy.
// Pure functions over the read-only catalogs; no model calls here.

pub mod selector;
pub mod similarity;

use thiserror::Error;

use crate::catalog::matrix::DimensionMismatch;

/// The query embedding cannot be ranked against a catalog matrix.
#[derive(Debug, Error)]
#[error("Cannot rank {target} against the query: {source}")]
pub struct RankError {
    pub target: &'static str,
    #[source]
    pub source: DimensionMismatch,
}

//! Pure read-only views over [`FeatureStoreState`].

use buffer_search_models::{Feature, QueryFailure};

use crate::{FeatureStoreState, RequestSeq};

/// Features of the latest applied result.
#[must_use]
pub fn features(state: &FeatureStoreState) -> &[Feature] {
    &state.features
}

/// Number of features in the latest applied result.
#[must_use]
pub fn feature_count(state: &FeatureStoreState) -> usize {
    state.features.len()
}

/// Whether a query is outstanding.
#[must_use]
pub const fn is_loading(state: &FeatureStoreState) -> bool {
    state.loading
}

/// Failure of the latest applied result, if any.
#[must_use]
pub const fn error(state: &FeatureStoreState) -> Option<&QueryFailure> {
    state.error.as_ref()
}

/// Stamp of the latest issued request.
#[must_use]
pub const fn request_seq(state: &FeatureStoreState) -> RequestSeq {
    state.request_seq
}

/// A settled query that matched nothing.
///
/// Distinct from a failure: there is no error.
#[must_use]
pub fn is_empty_result(state: &FeatureStoreState) -> bool {
    !state.loading && state.error.is_none() && state.features.is_empty()
}

/// Whether a result or failure has been applied since the last request
/// or clear.
#[must_use]
pub const fn has_settled(state: &FeatureStoreState) -> bool {
    state.settled
}

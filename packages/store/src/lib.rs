#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature state store.
//!
//! Holds the latest search result set, the loading flag and the last
//! error. State lives in a [`tokio::sync::watch`] channel: every
//! mutation replaces it as a whole, so readers never see a partially
//! applied transition, and subscribers are woken on each change.
//!
//! The only way to change state is through [`StoreAction`]s. Responses
//! from asynchronous queries are applied with a [`RequestSeq`] stamp and
//! dropped unless the stamp is the latest one issued.

pub mod selectors;

use std::sync::Arc;

use buffer_search_models::{Feature, QueryFailure, QueryOutcome};
use strum_macros::{AsRefStr, IntoStaticStr};
use tokio::sync::watch;

/// Monotonic stamp identifying the latest issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestSeq(u64);

impl RequestSeq {
    /// The raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for RequestSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureStoreState {
    /// Features of the latest applied result, in backend order.
    pub features: Vec<Feature>,
    /// Whether a query is outstanding.
    pub loading: bool,
    /// Failure of the latest applied result.
    pub error: Option<QueryFailure>,
    /// Stamp of the latest issued request.
    pub request_seq: RequestSeq,
    /// Whether a result has been applied since the last request or clear.
    /// Tells an empty result apart from a store nobody has searched yet.
    pub settled: bool,
}

/// The four store transitions.
///
/// Action types follow one namespaced scheme, `featureStore/<action>`.
#[derive(Debug, Clone, PartialEq, AsRefStr, IntoStaticStr)]
pub enum StoreAction {
    /// Sets the loading flag. Setting it to `true` issues a new
    /// [`RequestSeq`].
    #[strum(serialize = "featureStore/setLoading")]
    SetLoading(bool),
    /// Replaces the result set, clears the error and stops loading.
    #[strum(serialize = "featureStore/setFeatures")]
    SetFeatures(Vec<Feature>),
    /// Records a failure, drops any features and stops loading.
    #[strum(serialize = "featureStore/setError")]
    SetError(QueryFailure),
    /// Resets to the empty state and invalidates outstanding requests.
    #[strum(serialize = "featureStore/clear")]
    Clear,
}

/// Applies `action` to `state`.
fn reduce(state: &mut FeatureStoreState, action: StoreAction) {
    match action {
        StoreAction::SetLoading(true) => {
            state.loading = true;
            state.settled = false;
            state.request_seq = state.request_seq.next();
        }
        StoreAction::SetLoading(false) => state.loading = false,
        StoreAction::SetFeatures(features) => {
            state.features = features;
            state.error = None;
            state.loading = false;
            state.settled = true;
        }
        StoreAction::SetError(error) => {
            state.features = Vec::new();
            state.error = Some(error);
            state.loading = false;
            state.settled = true;
        }
        StoreAction::Clear => {
            state.features = Vec::new();
            state.error = None;
            state.loading = false;
            state.settled = false;
            state.request_seq = state.request_seq.next();
        }
    }
}

/// Shared handle to the feature state.
///
/// Cloning is cheap; all clones refer to the same state.
#[derive(Clone)]
pub struct FeatureStore {
    state: Arc<watch::Sender<FeatureStoreState>>,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStore {
    /// Creates a store in the empty state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(FeatureStoreState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeatureStoreState> {
        self.state.subscribe()
    }

    /// Runs a selector against the current state.
    pub fn select<R>(&self, selector: impl FnOnce(&FeatureStoreState) -> R) -> R {
        selector(&self.state.borrow())
    }

    /// Clones the current state.
    #[must_use]
    pub fn snapshot(&self) -> FeatureStoreState {
        self.state.borrow().clone()
    }

    /// Applies an action unconditionally and returns the resulting
    /// request stamp.
    pub fn dispatch(&self, action: StoreAction) -> RequestSeq {
        let action_type: &'static str = (&action).into();
        let mut seq = RequestSeq::default();
        self.state.send_modify(|state| {
            reduce(state, action);
            seq = state.request_seq;
        });
        log::trace!("{action_type} -> {seq}");
        seq
    }

    /// Applies an action only if `seq` is the latest issued stamp.
    ///
    /// Returns `false`, leaving state untouched, for stale stamps.
    pub fn dispatch_stamped(&self, seq: RequestSeq, action: StoreAction) -> bool {
        let action_type: &'static str = (&action).into();
        let applied = self.state.send_if_modified(|state| {
            if state.request_seq != seq {
                return false;
            }
            reduce(state, action);
            true
        });
        if applied {
            log::trace!("{action_type} applied for {seq}");
        } else {
            log::debug!("{action_type} for stale request {seq} discarded");
        }
        applied
    }

    /// Sets the loading flag.
    pub fn set_loading(&self, loading: bool) {
        self.dispatch(StoreAction::SetLoading(loading));
    }

    /// Replaces the result set.
    pub fn set_features(&self, features: Vec<Feature>) {
        self.dispatch(StoreAction::SetFeatures(features));
    }

    /// Records a failure.
    pub fn set_error(&self, error: QueryFailure) {
        self.dispatch(StoreAction::SetError(error));
    }

    /// Resets to the empty state.
    pub fn clear(&self) {
        self.dispatch(StoreAction::Clear);
    }

    /// Marks a new request as outstanding and returns its stamp.
    pub fn begin_request(&self) -> RequestSeq {
        self.dispatch(StoreAction::SetLoading(true))
    }

    /// Applies a query outcome if `seq` is still the latest request.
    pub fn apply_outcome(&self, seq: RequestSeq, outcome: QueryOutcome) -> bool {
        let action = match outcome {
            QueryOutcome::Success(features) => StoreAction::SetFeatures(features),
            QueryOutcome::Empty => StoreAction::SetFeatures(Vec::new()),
            QueryOutcome::Failure(failure) => StoreAction::SetError(failure),
        };
        self.dispatch_stamped(seq, action)
    }
}

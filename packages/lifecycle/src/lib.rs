#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Lifecycle bridge and pipeline wiring.
//!
//! The [`LifecycleBridge`] follows an external "active" signal: turning it
//! on arms the draw controller and asks the host to display the result
//! view, turning it off (or dropping the bridge) disposes the displayed
//! view and tears the controller down. [`Pipeline`] builds the whole
//! chain from a [`SearchConfig`].

pub mod config;
pub mod host;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use buffer_search_draw::{DrawController, DrawSettings, MapCollaborator, Notifier};
use buffer_search_models::config::SearchConfig;
use buffer_search_presenter::ResultPresenter;
use buffer_search_query::{QueryTransport, SpatialQueryClient};
use buffer_search_store::FeatureStore;

pub use config::ConfigError;

/// Identifies a component the host knows how to display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    /// Plugin namespace.
    pub namespace: String,
    /// Component name within the namespace.
    pub name: String,
}

impl ComponentRef {
    /// The result table of this plugin.
    #[must_use]
    pub fn result_table() -> Self {
        Self {
            namespace: "buffer-search".to_string(),
            name: "result-table".to_string(),
        }
    }
}

impl std::fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Props handed to the host with a display request.
#[derive(Clone)]
pub struct ComponentProps {
    /// Live view over the search results.
    pub presenter: ResultPresenter,
    /// Layer being searched, for titles.
    pub layer_id: String,
}

/// A displayed component instance.
pub trait ComponentHandle: Send + Sync {
    /// Host-assigned instance id.
    fn id(&self) -> &str;

    /// Removes the instance from the host.
    fn dispose(self: Box<Self>);
}

/// The host's component registry.
pub trait ComponentHost: Send + Sync {
    /// Displays `component` and returns the handle that removes it.
    fn display(&self, component: &ComponentRef, props: ComponentProps) -> Box<dyn ComponentHandle>;
}

#[derive(Default)]
struct BridgeState {
    active: bool,
    handle: Option<Box<dyn ComponentHandle>>,
}

/// Keeps the draw controller and the result view in step with an
/// "active" signal.
///
/// At most one result view is displayed per activation cycle.
pub struct LifecycleBridge {
    controller: DrawController,
    presenter: ResultPresenter,
    host: Arc<dyn ComponentHost>,
    component: ComponentRef,
    settings: DrawSettings,
    state: Mutex<BridgeState>,
}

impl LifecycleBridge {
    /// Creates an inactive bridge.
    #[must_use]
    pub fn new(
        controller: DrawController,
        presenter: ResultPresenter,
        host: Arc<dyn ComponentHost>,
        settings: DrawSettings,
    ) -> Self {
        Self {
            controller,
            presenter,
            host,
            component: ComponentRef::result_table(),
            settings,
            state: Mutex::new(BridgeState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the bridge is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Whether a result view is currently displayed.
    #[must_use]
    pub fn is_displayed(&self) -> bool {
        self.lock().handle.is_some()
    }

    /// Follows the activation signal. Repeating the current value does
    /// nothing.
    pub fn set_active(&self, active: bool) {
        let mut state = self.lock();
        if state.active == active {
            log::trace!("Bridge already {}", if active { "active" } else { "inactive" });
            return;
        }

        if active {
            if let Some(stale) = state.handle.take() {
                stale.dispose();
            }
            self.controller.activate(self.settings.clone());
            let handle = self.host.display(
                &self.component,
                ComponentProps {
                    presenter: self.presenter.clone(),
                    layer_id: self.settings.layer.id.clone(),
                },
            );
            log::info!("Mounted {} as '{}'", self.component, handle.id());
            state.handle = Some(handle);
            state.active = true;
        } else {
            Self::unmount(&mut state, &self.controller);
        }
    }

    /// Disposes the result view and tears the controller down, whatever
    /// the current state.
    pub fn teardown(&self) {
        let mut state = self.lock();
        Self::unmount(&mut state, &self.controller);
    }

    fn unmount(state: &mut BridgeState, controller: &DrawController) {
        match state.handle.take() {
            Some(handle) => {
                log::info!("Unmounting result view '{}'", handle.id());
                handle.dispose();
            }
            None => log::trace!("No result view to unmount"),
        }
        controller.teardown();
        state.active = false;
    }
}

impl Drop for LifecycleBridge {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        Self::unmount(state, &self.controller);
    }
}

/// The wired search pipeline.
pub struct Pipeline {
    store: FeatureStore,
    controller: DrawController,
    presenter: ResultPresenter,
    bridge: LifecycleBridge,
}

impl Pipeline {
    /// Builds store, query client, draw controller, presenter and bridge
    /// from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails validation.
    pub fn from_config(
        config: &SearchConfig,
        map: Arc<dyn MapCollaborator>,
        host: Arc<dyn ComponentHost>,
        notifier: Arc<dyn Notifier>,
        transport: Arc<dyn QueryTransport>,
    ) -> Result<Self, ConfigError> {
        config::validate(config)?;
        if map.crs() != config.map_crs {
            log::warn!(
                "Map reports {} but config says {}; using the map CRS",
                map.crs(),
                config.map_crs
            );
        }

        let store = FeatureStore::new();
        let controller = DrawController::new(
            map,
            SpatialQueryClient::new(transport),
            store.clone(),
            notifier,
        );
        let presenter = ResultPresenter::new(store.clone());
        let settings = DrawSettings {
            layer: config.layer.layer_ref(),
            distance: config.buffer.distance,
            unit: config.buffer.unit,
        };
        let bridge = LifecycleBridge::new(controller.clone(), presenter.clone(), host, settings);

        Ok(Self {
            store,
            controller,
            presenter,
            bridge,
        })
    }

    /// The feature store.
    #[must_use]
    pub const fn store(&self) -> &FeatureStore {
        &self.store
    }

    /// The draw controller.
    #[must_use]
    pub const fn controller(&self) -> &DrawController {
        &self.controller
    }

    /// The result presenter.
    #[must_use]
    pub const fn presenter(&self) -> &ResultPresenter {
        &self.presenter
    }

    /// The lifecycle bridge.
    #[must_use]
    pub const fn bridge(&self) -> &LifecycleBridge {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use async_trait::async_trait;
    use buffer_search_draw::headless::HeadlessMap;
    use buffer_search_draw::{DrawPhase, LogNotifier};
    use buffer_search_query::{QueryError, QueryRequest};

    struct Unreachable;

    #[async_trait]
    impl QueryTransport for Unreachable {
        async fn send(&self, _requests: &[QueryRequest]) -> Result<serde_json::Value, QueryError> {
            Err(QueryError::Transport {
                message: "offline".to_string(),
            })
        }
    }

    fn pipeline() -> (Pipeline, Arc<HeadlessMap>, Arc<HeadlessHost>) {
        let map = Arc::new(HeadlessMap::default());
        let host = Arc::new(HeadlessHost::default());
        let pipeline = Pipeline::from_config(
            &config::default_config().unwrap(),
            map.clone(),
            host.clone(),
            Arc::new(LogNotifier),
            Arc::new(Unreachable),
        )
        .unwrap();
        (pipeline, map, host)
    }

    #[tokio::test]
    async fn activation_mounts_one_view() {
        let (pipeline, map, host) = pipeline();
        let bridge = pipeline.bridge();

        bridge.set_active(true);
        bridge.set_active(true);
        assert!(bridge.is_displayed());
        assert_eq!(host.live_count(), 1);
        assert_eq!(host.display_count(), 1);
        assert_eq!(map.interaction_count(), 1);
        assert_eq!(pipeline.controller().phase(), DrawPhase::Drawing);

        bridge.set_active(false);
        assert_eq!(host.live_count(), 0);
        assert_eq!(map.interaction_count(), 0);
        assert_eq!(map.layer_count(), 0);
        assert!(!pipeline.controller().is_active());
    }

    #[tokio::test]
    async fn each_cycle_gets_a_fresh_view() {
        let (pipeline, _map, host) = pipeline();
        for _ in 0..3 {
            pipeline.bridge().set_active(true);
            assert_eq!(host.live_count(), 1);
            pipeline.bridge().set_active(false);
        }
        assert_eq!(host.display_count(), 3);
        assert_eq!(host.live_count(), 0);
    }

    #[tokio::test]
    async fn teardown_without_view_is_a_no_op() {
        let (pipeline, _map, host) = pipeline();
        pipeline.bridge().teardown();
        pipeline.bridge().set_active(false);
        pipeline.bridge().teardown();
        assert_eq!(host.live_count(), 0);
        assert!(!pipeline.bridge().is_active());
    }

    #[tokio::test]
    async fn dropping_the_pipeline_releases_everything() {
        let (pipeline, map, host) = pipeline();
        pipeline.bridge().set_active(true);
        drop(pipeline);
        assert_eq!(host.live_count(), 0);
        assert_eq!(map.interaction_count(), 0);
        assert_eq!(map.layer_count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = SearchConfig::default();
        config.layer.id = "poi".to_string();
        config.buffer.distance = -1.0;
        let result = Pipeline::from_config(
            &config,
            Arc::new(HeadlessMap::default()),
            Arc::new(HeadlessHost::default()),
            Arc::new(LogNotifier),
            Arc::new(Unreachable),
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}

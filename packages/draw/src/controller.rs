//! The draw interaction state machine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use buffer_search_geometry::BufferError;
use buffer_search_models::{
    BufferGeometry, FailureKind, LayerRef, OutcomeKind, Point, QueryFailure, QueryOutcome, Unit,
};
use buffer_search_query::SpatialQueryClient;
use buffer_search_store::{FeatureStore, RequestSeq};
use strum_macros::AsRefStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::map::{DrawGeometryType, DrawTool, MapCollaborator, OverlayFeature, OverlayLayer};
use crate::notify::{Notifier, Severity};

/// Parameters fixed for one activation.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSettings {
    /// Layer to search.
    pub layer: LayerRef,
    /// Buffer distance in `unit`.
    pub distance: f64,
    /// Unit of `distance`.
    pub unit: Unit,
}

/// Where the controller is in handling the latest gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AsRefStr)]
pub enum DrawPhase {
    /// No drawing tool is installed.
    #[default]
    Idle,
    /// The tool is installed and waiting for a gesture.
    Drawing,
    /// A gesture completed and the overlay was cleared.
    PointCaptured,
    /// The search zone has been computed.
    BufferReady,
    /// The query is outstanding.
    Querying,
    /// The latest gesture finished. The tool stays armed, so the next
    /// gesture starts over at [`DrawPhase::PointCaptured`].
    Settled(OutcomeKind),
}

/// What happened to a single gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawResult {
    /// The outcome was applied to the store and overlay.
    Settled(OutcomeKind),
    /// A newer gesture, a teardown or a re-activation superseded this
    /// one; nothing was applied.
    Stale,
    /// The controller was not active.
    Inactive,
}

struct Session {
    tool: Arc<dyn DrawTool>,
    overlay: Arc<dyn OverlayLayer>,
    settings: DrawSettings,
    pump: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct ControllerState {
    phase: DrawPhase,
    generation: u64,
    session: Option<Session>,
}

struct Inner {
    map: Arc<dyn MapCollaborator>,
    client: SpatialQueryClient,
    store: FeatureStore,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ControllerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, session: Session) {
        session.tool.set_listener(None);
        self.map.remove_interaction(&session.tool);
        session.overlay.clear();
        self.map.remove_layer(&session.overlay);
        if let Some(pump) = session.pump {
            pump.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .session
            .take();
        if let Some(session) = session {
            log::debug!("Draw controller dropped while active, releasing map resources");
            self.release(session);
        }
    }
}

/// A gesture that passed the activity check.
struct Gesture {
    generation: u64,
    seq: RequestSeq,
    point: Point,
    settings: DrawSettings,
}

/// Turns draw gestures on the map into buffer searches.
///
/// Every gesture clears the overlay, computes a search zone, queries the
/// layer and applies the outcome to the [`FeatureStore`]. Gestures may
/// overlap; only the most recent one is applied.
#[derive(Clone)]
pub struct DrawController {
    inner: Arc<Inner>,
}

impl DrawController {
    /// Creates an inactive controller.
    #[must_use]
    pub fn new(
        map: Arc<dyn MapCollaborator>,
        client: SpatialQueryClient,
        store: FeatureStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                map,
                client,
                store,
                notifier,
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> DrawPhase {
        self.inner.lock().phase
    }

    /// Whether a drawing tool is installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// The store this controller writes to.
    #[must_use]
    pub fn store(&self) -> &FeatureStore {
        &self.inner.store
    }

    /// Installs a point drawing tool and an empty overlay layer.
    ///
    /// Does nothing and returns `false` if the controller is already
    /// active. Gestures on the tool are processed on the current Tokio
    /// runtime; without one, only [`Self::handle_draw_end`] drives the
    /// controller.
    pub fn activate(&self, settings: DrawSettings) -> bool {
        let mut state = self.inner.lock();
        if state.session.is_some() {
            log::debug!("Draw controller already active");
            return false;
        }

        let map = &self.inner.map;
        let tool = map.create_draw_tool(DrawGeometryType::Point);
        let overlay = map.create_overlay();
        map.add_layer(&overlay);
        map.add_interaction(&tool);

        let (tx, rx) = mpsc::unbounded_channel();
        tool.set_listener(Some(Box::new(move |point: Point| {
            if tx.send(point).is_err() {
                log::debug!("Draw event after the controller stopped listening");
            }
        })));
        let pump = spawn_pump(Arc::downgrade(&self.inner), rx);

        state.generation += 1;
        log::info!(
            "Draw controller active on layer '{}' ({} {}, generation {})",
            settings.layer.id,
            settings.distance,
            settings.unit,
            state.generation
        );
        state.session = Some(Session {
            tool,
            overlay,
            settings,
            pump,
        });
        state.phase = DrawPhase::Drawing;
        drop(state);
        true
    }

    /// Removes the drawing tool and overlay layer and clears the store.
    ///
    /// Safe to call in any phase and any number of times. Queries still in
    /// flight will not touch the store or overlay.
    pub fn teardown(&self) {
        let session = {
            let mut state = self.inner.lock();
            state.phase = DrawPhase::Idle;
            state.session.take()
        };
        let Some(session) = session else {
            log::trace!("Draw controller teardown while inactive");
            return;
        };

        self.inner.release(session);
        self.inner.store.clear();
        log::info!("Draw controller torn down");
    }

    /// Processes one completed draw gesture at `point`.
    ///
    /// A point without a CRS is taken to be in the map CRS.
    pub async fn handle_draw_end(&self, point: Point) -> DrawResult {
        let Some(gesture) = self.capture(point) else {
            log::debug!("Ignoring draw gesture while inactive");
            return DrawResult::Inactive;
        };
        self.run(gesture).await
    }

    /// Computes the zone for a captured gesture, queries it and settles.
    async fn run(&self, gesture: Gesture) -> DrawResult {
        let zone = match buffer_search_geometry::generate_buffer(
            &gesture.point,
            gesture.settings.distance,
            gesture.settings.unit,
        ) {
            Ok(zone) => zone,
            Err(e) => return self.settle(&gesture, None, invalid_parameters(&e)),
        };
        self.advance(&gesture, DrawPhase::BufferReady);

        let query_zone = if zone.crs == gesture.settings.layer.crs {
            zone.clone()
        } else {
            match buffer_search_geometry::reproject(&zone, &gesture.settings.layer.crs) {
                Ok(query_zone) => query_zone,
                Err(e) => return self.settle(&gesture, None, invalid_parameters(&e)),
            }
        };

        self.advance(&gesture, DrawPhase::Querying);
        let outcome = self
            .inner
            .client
            .query(&gesture.settings.layer, &query_zone)
            .await;
        self.settle(&gesture, Some(zone), outcome)
    }

    fn capture(&self, point: Point) -> Option<Gesture> {
        let mut state = self.inner.lock();
        let generation = state.generation;
        let session = state.session.as_ref()?;
        session.overlay.clear();
        let settings = session.settings.clone();
        let seq = self.inner.store.begin_request();
        state.phase = DrawPhase::PointCaptured;
        drop(state);

        let point = if point.crs.is_some() {
            point
        } else {
            Point::with_crs(point.x, point.y, self.inner.map.crs())
        };
        log::debug!(
            "Draw gesture {seq} at ({}, {}) in {}",
            point.x,
            point.y,
            point.effective_crs()
        );

        Some(Gesture {
            generation,
            seq,
            point,
            settings,
        })
    }

    fn is_current(&self, state: &ControllerState, gesture: &Gesture) -> bool {
        state.session.is_some()
            && state.generation == gesture.generation
            && self.inner.store.select(|store| store.request_seq) == gesture.seq
    }

    fn advance(&self, gesture: &Gesture, phase: DrawPhase) {
        let mut state = self.inner.lock();
        if self.is_current(&state, gesture) {
            state.phase = phase;
        }
    }

    fn settle(
        &self,
        gesture: &Gesture,
        zone: Option<BufferGeometry>,
        outcome: QueryOutcome,
    ) -> DrawResult {
        let kind = outcome.kind();
        let notice = notice(&gesture.settings, &outcome);

        {
            let mut state = self.inner.lock();
            if !self.is_current(&state, gesture) {
                log::debug!("Discarding outcome of superseded gesture {}", gesture.seq);
                return DrawResult::Stale;
            }
            if !self.inner.store.apply_outcome(gesture.seq, outcome) {
                return DrawResult::Stale;
            }
            if let Some(session) = state.session.as_ref() {
                session.overlay.clear();
                if !matches!(kind, OutcomeKind::Failure(_)) {
                    if let Some(zone) = zone {
                        session
                            .overlay
                            .add_feature(OverlayFeature::search_zone(zone.polygon));
                    }
                    session
                        .overlay
                        .add_feature(OverlayFeature::drawn_point(&gesture.point));
                }
            }
            state.phase = DrawPhase::Settled(kind);
        }

        log::debug!("Gesture {} settled as {kind:?}", gesture.seq);
        if let Some((message, severity)) = notice {
            self.inner.notifier.notify(&message, severity);
        }
        DrawResult::Settled(kind)
    }
}

fn invalid_parameters(e: &BufferError) -> QueryOutcome {
    QueryOutcome::Failure(QueryFailure::new(FailureKind::InvalidParameter, e.to_string()))
}

/// The user notification for a settled outcome, if any.
fn notice(settings: &DrawSettings, outcome: &QueryOutcome) -> Option<(String, Severity)> {
    match outcome {
        QueryOutcome::Success(_) => None,
        QueryOutcome::Empty => Some((
            format!(
                "No features found within {} {} of the selected point",
                settings.distance, settings.unit
            ),
            Severity::Info,
        )),
        QueryOutcome::Failure(failure) if failure.kind == FailureKind::InvalidParameter => Some((
            format!("Invalid buffer parameters: {}", failure.message),
            Severity::Error,
        )),
        QueryOutcome::Failure(failure) => Some((format!("Search failed: {failure}"), Severity::Error)),
    }
}

/// Forwards draw events to the controller. Gestures are captured in
/// arrival order so request stamps follow the order the user drew; only the
/// query runs on its own task, so a slow query never delays the next draw.
fn spawn_pump(
    inner: Weak<Inner>,
    mut events: mpsc::UnboundedReceiver<Point>,
) -> Option<JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        log::warn!("No Tokio runtime; map draw events will not be processed");
        return None;
    };

    Some(runtime.spawn(async move {
        while let Some(point) = events.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let controller = DrawController { inner };
            let Some(gesture) = controller.capture(point) else {
                log::debug!("Ignoring draw gesture while inactive");
                continue;
            };
            tokio::spawn(async move {
                controller.run(gesture).await;
            });
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMap;
    use crate::map::OverlayStyle;
    use async_trait::async_trait;
    use buffer_search_models::Crs;
    use buffer_search_query::{QueryError, QueryRequest, QueryTransport};
    use buffer_search_store::selectors;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedTransport {
        features: Option<usize>,
        calls: AtomicUsize,
    }

    impl FixedTransport {
        fn returning(count: usize) -> Arc<Self> {
            Arc::new(Self {
                features: Some(count),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                features: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl QueryTransport for FixedTransport {
        async fn send(&self, _requests: &[QueryRequest]) -> Result<serde_json::Value, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(count) = self.features else {
                return Err(QueryError::Transport {
                    message: "connection refused".to_string(),
                });
            };
            let features: Vec<_> = (0..count)
                .map(|i| {
                    json!({
                        "type": "Feature",
                        "geometry": { "type": "Point", "coordinates": [10.0, 20.0] },
                        "properties": { "id": i }
                    })
                })
                .collect();
            let collection = json!({ "type": "FeatureCollection", "features": features });
            Ok(json!({ "success": true, "data": [{ "features": collection.to_string() }] }))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(String, Severity)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str, severity: Severity) {
            self.messages
                .lock()
                .unwrap()
                .push((message.to_string(), severity));
        }
    }

    struct Fixture {
        map: Arc<HeadlessMap>,
        transport: Arc<FixedTransport>,
        notifier: Arc<RecordingNotifier>,
        controller: DrawController,
    }

    fn fixture(transport: Arc<FixedTransport>) -> Fixture {
        let map = Arc::new(HeadlessMap::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = DrawController::new(
            map.clone(),
            SpatialQueryClient::new(transport.clone()),
            FeatureStore::new(),
            notifier.clone(),
        );
        Fixture {
            map,
            transport,
            notifier,
            controller,
        }
    }

    fn settings(distance: f64) -> DrawSettings {
        DrawSettings {
            layer: LayerRef {
                id: "poi".to_string(),
                geometry_field_name: "geom".to_string(),
                crs: Crs::wgs84(),
            },
            distance,
            unit: Unit::Meters,
        }
    }

    fn styles(map: &HeadlessMap) -> Vec<OverlayStyle> {
        map.overlay_features().iter().map(|f| f.style).collect()
    }

    #[tokio::test]
    async fn inactive_controller_ignores_gestures() {
        let f = fixture(FixedTransport::returning(1));
        assert_eq!(
            f.controller.handle_draw_end(Point::new(10.0, 20.0)).await,
            DrawResult::Inactive
        );
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.controller.phase(), DrawPhase::Idle);
    }

    #[tokio::test]
    async fn activation_is_idempotent() {
        let f = fixture(FixedTransport::returning(1));
        assert!(f.controller.activate(settings(1000.0)));
        assert!(!f.controller.activate(settings(1000.0)));
        assert_eq!(f.map.interaction_count(), 1);
        assert_eq!(f.map.layer_count(), 1);
        assert_eq!(f.controller.phase(), DrawPhase::Drawing);
    }

    #[tokio::test]
    async fn teardown_releases_everything_and_is_idempotent() {
        let f = fixture(FixedTransport::returning(1));
        f.controller.teardown();
        f.controller.activate(settings(1000.0));
        f.controller.teardown();
        f.controller.teardown();
        assert_eq!(f.map.interaction_count(), 0);
        assert_eq!(f.map.layer_count(), 0);
        assert_eq!(f.controller.phase(), DrawPhase::Idle);
        assert!(!f.map.finish_draw(10.0, 20.0));
    }

    #[tokio::test]
    async fn success_fills_store_and_overlay() {
        let f = fixture(FixedTransport::returning(3));
        f.controller.activate(settings(1000.0));

        let result = f.controller.handle_draw_end(Point::new(10.0, 20.0)).await;
        assert_eq!(result, DrawResult::Settled(OutcomeKind::Success));

        let state = f.controller.store().snapshot();
        assert_eq!(state.features.len(), 3);
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(
            styles(&f.map),
            [OverlayStyle::SearchZone, OverlayStyle::DrawnPoint]
        );
        assert_eq!(
            f.controller.phase(),
            DrawPhase::Settled(OutcomeKind::Success)
        );
        assert!(f.notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_draws_do_not_accumulate_overlay_features() {
        let f = fixture(FixedTransport::returning(1));
        f.controller.activate(settings(1000.0));
        f.controller.handle_draw_end(Point::new(10.0, 20.0)).await;
        f.controller.handle_draw_end(Point::new(11.0, 21.0)).await;
        assert_eq!(f.map.overlay_features().len(), 2);
    }

    #[tokio::test]
    async fn invalid_distance_skips_the_query() {
        let f = fixture(FixedTransport::returning(3));
        f.controller.activate(settings(0.0));

        let result = f.controller.handle_draw_end(Point::new(10.0, 20.0)).await;
        assert_eq!(
            result,
            DrawResult::Settled(OutcomeKind::Failure(FailureKind::InvalidParameter))
        );
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 0);
        assert!(f.map.overlay_features().is_empty());

        let error = f.controller.store().select(|s| selectors::error(s).cloned());
        assert_eq!(error.map(|e| e.kind), Some(FailureKind::InvalidParameter));

        let messages = f.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, Severity::Error);
        assert!(messages[0].0.starts_with("Invalid buffer parameters"));
    }

    #[tokio::test]
    async fn empty_result_keeps_overlay_and_informs() {
        let f = fixture(FixedTransport::returning(0));
        f.controller.activate(settings(500.0));

        let result = f.controller.handle_draw_end(Point::new(10.0, 20.0)).await;
        assert_eq!(result, DrawResult::Settled(OutcomeKind::Empty));
        assert!(f.controller.store().select(selectors::is_empty_result));
        assert_eq!(f.map.overlay_features().len(), 2);

        let messages = f.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, Severity::Info);
        assert!(messages[0].0.contains("500 meters"));
    }

    #[tokio::test]
    async fn transport_failure_clears_overlay_and_reports() {
        let f = fixture(FixedTransport::failing());
        f.controller.activate(settings(1000.0));

        let result = f.controller.handle_draw_end(Point::new(10.0, 20.0)).await;
        assert_eq!(
            result,
            DrawResult::Settled(OutcomeKind::Failure(FailureKind::Transport))
        );
        assert!(f.map.overlay_features().is_empty());
        let state = f.controller.store().snapshot();
        assert!(state.features.is_empty());
        assert_eq!(state.error.map(|e| e.kind), Some(FailureKind::Transport));
        assert_eq!(
            f.notifier.messages.lock().unwrap()[0].1,
            Severity::Error
        );
    }

    #[tokio::test]
    async fn mercator_map_queries_in_layer_crs() {
        let map = Arc::new(HeadlessMap::new(Crs::web_mercator()));
        let controller = DrawController::new(
            map.clone(),
            SpatialQueryClient::new(FixedTransport::returning(1)),
            FeatureStore::new(),
            Arc::new(RecordingNotifier::default()),
        );
        controller.activate(settings(1000.0));

        let result = controller
            .handle_draw_end(Point::new(1_113_194.9, 2_273_030.9))
            .await;
        assert_eq!(result, DrawResult::Settled(OutcomeKind::Success));

        let zone = map
            .overlay_features()
            .into_iter()
            .find(|f| f.style == OverlayStyle::SearchZone)
            .unwrap();
        let geo::Geometry::Polygon(polygon) = zone.geometry else {
            panic!("zone is not a polygon");
        };
        // Overlay stays in map units.
        assert!(polygon.exterior().0[0].x > 1_000_000.0);
    }

    #[tokio::test]
    async fn gestures_from_the_map_are_processed() {
        let f = fixture(FixedTransport::returning(2));
        f.controller.activate(settings(1000.0));
        let mut rx = f.controller.store().subscribe();

        assert!(f.map.finish_draw(10.0, 20.0));
        loop {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update().clone();
            if !state.loading && !state.features.is_empty() {
                assert_eq!(state.features.len(), 2);
                break;
            }
        }
    }

    #[tokio::test]
    async fn outcome_after_teardown_is_stale() {
        let f = fixture(FixedTransport::returning(1));
        f.controller.activate(settings(1000.0));
        let gesture = f.controller.capture(Point::new(10.0, 20.0)).unwrap();
        f.controller.teardown();

        let result = f.controller.settle(&gesture, None, QueryOutcome::Empty);
        assert_eq!(result, DrawResult::Stale);
        assert!(!f.controller.store().select(selectors::is_loading));
        assert!(f.map.overlay_features().is_empty());
    }

    /// Echoes the zone's mean longitude back; zones west of 30 degrees
    /// answer after a delay.
    struct EchoTransport;

    #[async_trait]
    impl QueryTransport for EchoTransport {
        async fn send(&self, requests: &[QueryRequest]) -> Result<serde_json::Value, QueryError> {
            let geometry = &requests[0].filter.condition_list[0].spatial_condition.geometry;
            let polygon: serde_json::Value = serde_json::from_str(geometry).unwrap();
            let ring = polygon["coordinates"][0].as_array().unwrap();
            #[allow(clippy::cast_precision_loss)]
            let origin_x = ring.iter().map(|c| c[0].as_f64().unwrap()).sum::<f64>() / ring.len() as f64;
            if origin_x < 30.0 {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            let collection = json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [origin_x, 0.0] },
                    "properties": { "origin_x": origin_x }
                }]
            });
            Ok(json!({ "success": true, "data": [{ "features": collection.to_string() }] }))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn back_to_back_map_gestures_keep_the_later_draw() {
        let map = Arc::new(HeadlessMap::default());
        let controller = DrawController::new(
            map.clone(),
            SpatialQueryClient::new(Arc::new(EchoTransport)),
            FeatureStore::new(),
            Arc::new(RecordingNotifier::default()),
        );
        controller.activate(settings(1000.0));

        assert!(map.finish_draw(10.0, 0.0));
        assert!(map.finish_draw(50.0, 0.0));

        let mut settled = false;
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if controller.store().select(|s| !s.loading && !s.features.is_empty()) {
                settled = true;
                break;
            }
        }
        assert!(settled);
        // Give the slower, earlier gesture time to come back.
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        let state = controller.store().snapshot();
        assert_eq!(state.features.len(), 1);
        let origin_x = state.features[0].properties["origin_x"].as_f64().unwrap();
        assert!((origin_x - 50.0).abs() < 0.5, "store holds origin x={origin_x}");
        assert_eq!(controller.phase(), DrawPhase::Settled(OutcomeKind::Success));
    }
}

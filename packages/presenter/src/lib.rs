#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result presenter.
//!
//! Turns feature store state into a tabular [`RenderModel`]. The model is
//! a pure function of the store state; the only state the presenter keeps
//! is the [`TableView`] (page and sort) and the row activation listener.

pub mod view;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use buffer_search_models::Feature;
use buffer_search_store::{FeatureStore, FeatureStoreState};
use geo::Centroid;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;

pub use view::{SortDirection, SortSpec, TableView};

/// What the result view should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum ResultStatus {
    /// Nothing has been searched yet.
    Idle,
    /// A search is outstanding.
    Loading,
    /// The latest search failed.
    Failed(String),
    /// The latest search matched nothing.
    NoResults,
    /// The latest search returned rows.
    Results,
}

/// One table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    /// Position of the feature in the store.
    pub index: usize,
    /// Stable identifier shown to the user.
    pub display_id: String,
    /// Formatted coordinate of the feature.
    pub coordinates: String,
    /// Flattened properties keyed by dotted path.
    pub cells: BTreeMap<String, String>,
}

impl ResultRow {
    /// The cell for `column`, or an empty string.
    #[must_use]
    pub fn cell(&self, column: &str) -> &str {
        self.cells.get(column).map_or("", String::as_str)
    }
}

/// Everything needed to draw the result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderModel {
    /// Overall status.
    pub status: ResultStatus,
    /// Sorted union of the row cell keys.
    pub columns: Vec<String>,
    /// One row per stored feature, in store order.
    pub rows: Vec<ResultRow>,
}

/// Builds the render model for `state`.
#[must_use]
pub fn render(state: &FeatureStoreState) -> RenderModel {
    let rows: Vec<ResultRow> = state
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| to_row(index, feature))
        .collect();

    let columns: BTreeSet<&String> = rows.iter().flat_map(|row| row.cells.keys()).collect();
    let columns = columns.into_iter().cloned().collect();

    let status = if state.loading {
        ResultStatus::Loading
    } else if let Some(error) = &state.error {
        ResultStatus::Failed(error.to_string())
    } else if !rows.is_empty() {
        ResultStatus::Results
    } else if state.settled {
        ResultStatus::NoResults
    } else {
        ResultStatus::Idle
    };

    RenderModel {
        status,
        columns,
        rows,
    }
}

fn to_row(index: usize, feature: &Feature) -> ResultRow {
    let mut cells = BTreeMap::new();
    flatten_into(&mut cells, None, &feature.properties);

    ResultRow {
        index,
        display_id: display_id(index, feature),
        coordinates: feature
            .geometry
            .as_ref()
            .map(format_coordinates)
            .unwrap_or_default(),
        cells,
    }
}

/// The `id` property, else the feature id, else the 1-based position.
fn display_id(index: usize, feature: &Feature) -> String {
    match feature.properties.get("id") {
        Some(Value::Null) | None => feature
            .id
            .clone()
            .unwrap_or_else(|| (index + 1).to_string()),
        Some(value) => cell_text(value),
    }
}

fn flatten_into(cells: &mut BTreeMap<String, String>, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let key = prefix.map_or_else(|| key.clone(), |prefix| format!("{prefix}.{key}"));
        match value {
            Value::Object(nested) => flatten_into(cells, Some(&key), nested),
            other => {
                cells.insert(key, cell_text(other));
            }
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `"x, y"` of a point, or of the centroid of anything else.
fn format_coordinates(geometry: &geo::Geometry<f64>) -> String {
    let point = match geometry {
        geo::Geometry::Point(point) => Some(*point),
        other => other.centroid(),
    };
    point.map_or_else(String::new, |p| format!("{:.6}, {:.6}", p.x(), p.y()))
}

/// Callback for row activation, e.g. to highlight the feature on the map.
pub type RowListener = Box<dyn Fn(&ResultRow, &Feature) + Send + Sync>;

struct PresenterState {
    view: TableView,
    listener: Option<RowListener>,
}

/// A live result view over a [`FeatureStore`].
///
/// Cloning is cheap; clones share the view and the listener.
#[derive(Clone)]
pub struct ResultPresenter {
    store: FeatureStore,
    state: Arc<Mutex<PresenterState>>,
}

impl ResultPresenter {
    /// Creates a presenter with the default [`TableView`].
    #[must_use]
    pub fn new(store: FeatureStore) -> Self {
        Self::with_view(store, TableView::default())
    }

    /// Creates a presenter with the given view.
    #[must_use]
    pub fn with_view(store: FeatureStore, view: TableView) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(PresenterState {
                view,
                listener: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PresenterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render model of the current store state.
    #[must_use]
    pub fn model(&self) -> RenderModel {
        self.store.select(render)
    }

    /// A copy of the current view.
    #[must_use]
    pub fn view(&self) -> TableView {
        self.lock().view.clone()
    }

    /// Changes the view.
    pub fn update_view(&self, update: impl FnOnce(&mut TableView)) {
        update(&mut self.lock().view);
    }

    /// Rows on the current page of the current model.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<ResultRow> {
        let model = self.model();
        let view = self.view();
        view.visible_rows(&model.rows).into_iter().cloned().collect()
    }

    /// Installs the row activation listener, replacing any previous one.
    pub fn on_row_activated(&self, listener: RowListener) {
        self.lock().listener = Some(listener);
    }

    /// Removes the row activation listener.
    pub fn clear_row_listener(&self) {
        self.lock().listener = None;
    }

    /// Activates the row for the feature at store position `index`.
    ///
    /// Returns `false` if there is no such row or no listener.
    pub fn activate_row(&self, index: usize) -> bool {
        let state = self.store.snapshot();
        let Some(feature) = state.features.get(index) else {
            log::debug!("No result row {index} to activate");
            return false;
        };
        let row = to_row(index, feature);

        let presenter = self.lock();
        presenter.listener.as_ref().is_some_and(|listener| {
            listener(&row, feature);
            true
        })
    }

    /// Stream of render models, one per store change.
    #[must_use]
    pub fn updates(&self) -> ModelUpdates {
        ModelUpdates {
            receiver: self.store.subscribe(),
            presenter: self.clone(),
        }
    }
}

/// Receives a new [`RenderModel`] whenever the store changes.
pub struct ModelUpdates {
    receiver: watch::Receiver<FeatureStoreState>,
    presenter: ResultPresenter,
}

impl ModelUpdates {
    /// Waits for the next store change and renders it.
    ///
    /// A new result set moves the view back to the first page. Returns
    /// `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<RenderModel> {
        self.receiver.changed().await.ok()?;
        let model = render(&self.receiver.borrow_and_update());
        if model.status != ResultStatus::Loading {
            self.presenter.update_view(TableView::reset_page);
        }
        Some(model)
    }

    /// Waits until the model is neither idle nor loading.
    pub async fn settled(&mut self) -> Option<RenderModel> {
        loop {
            let model = self.changed().await?;
            if !matches!(model.status, ResultStatus::Idle | ResultStatus::Loading) {
                return Some(model);
            }
        }
    }
}

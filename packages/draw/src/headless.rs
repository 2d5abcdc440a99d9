//! In-memory map for running the pipeline without a renderer.
//!
//! Draw gestures are injected with [`HeadlessMap::finish_draw`] and the
//! overlay contents can be inspected afterwards. Used by the CLI and by
//! tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use buffer_search_models::{Crs, Point};

use crate::map::{
    DrawGeometryType, DrawListener, DrawTool, MapCollaborator, OverlayFeature, OverlayLayer,
};

/// Draw tool whose gestures are triggered programmatically.
pub struct HeadlessDrawTool {
    geometry_type: DrawGeometryType,
    listener: Mutex<Option<DrawListener>>,
}

impl HeadlessDrawTool {
    /// Simulates a completed gesture at `point`.
    ///
    /// Returns `false` if no listener is installed.
    pub fn finish(&self, point: Point) -> bool {
        let listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        listener.as_ref().is_some_and(|listener| {
            listener(point);
            true
        })
    }
}

impl DrawTool for HeadlessDrawTool {
    fn geometry_type(&self) -> DrawGeometryType {
        self.geometry_type
    }

    fn set_listener(&self, listener: Option<DrawListener>) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = listener;
    }
}

/// Overlay that keeps its features in memory.
#[derive(Default)]
pub struct HeadlessOverlay {
    features: Mutex<Vec<OverlayFeature>>,
}

impl HeadlessOverlay {
    /// Features currently on the overlay.
    #[must_use]
    pub fn features(&self) -> Vec<OverlayFeature> {
        self.features
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OverlayLayer for HeadlessOverlay {
    fn clear(&self) {
        self.features
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn add_feature(&self, feature: OverlayFeature) {
        log::debug!("Overlay: {} {:?}", feature.style, feature.geometry);
        self.features
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(feature);
    }
}

/// [`MapCollaborator`] with no rendering.
pub struct HeadlessMap {
    crs: Crs,
    tool: Mutex<Option<Arc<HeadlessDrawTool>>>,
    overlay: Mutex<Option<Arc<HeadlessOverlay>>>,
    interactions: AtomicUsize,
    layers: AtomicUsize,
}

impl HeadlessMap {
    /// Creates a map whose coordinates are in `crs`.
    #[must_use]
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            tool: Mutex::new(None),
            overlay: Mutex::new(None),
            interactions: AtomicUsize::new(0),
            layers: AtomicUsize::new(0),
        }
    }

    /// Simulates a click at `(x, y)` with the most recently created tool.
    ///
    /// Returns `false` if there is no tool or it has no listener.
    pub fn finish_draw(&self, x: f64, y: f64) -> bool {
        let tool = self
            .tool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        tool.is_some_and(|tool| tool.finish(Point::new(x, y)))
    }

    /// Features on the most recently created overlay.
    #[must_use]
    pub fn overlay_features(&self) -> Vec<OverlayFeature> {
        self.overlay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|overlay| overlay.features())
            .unwrap_or_default()
    }

    /// Number of installed drawing tools.
    #[must_use]
    pub fn interaction_count(&self) -> usize {
        self.interactions.load(Ordering::SeqCst)
    }

    /// Number of installed overlay layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.load(Ordering::SeqCst)
    }
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new(Crs::wgs84())
    }
}

fn decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
}

impl MapCollaborator for HeadlessMap {
    fn crs(&self) -> Crs {
        self.crs.clone()
    }

    fn create_draw_tool(&self, geometry_type: DrawGeometryType) -> Arc<dyn DrawTool> {
        let tool = Arc::new(HeadlessDrawTool {
            geometry_type,
            listener: Mutex::new(None),
        });
        *self.tool.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&tool));
        tool
    }

    fn create_overlay(&self) -> Arc<dyn OverlayLayer> {
        let overlay = Arc::new(HeadlessOverlay::default());
        *self.overlay.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&overlay));
        overlay
    }

    fn add_interaction(&self, tool: &Arc<dyn DrawTool>) {
        log::debug!("Installing {} draw tool", tool.geometry_type());
        self.interactions.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_interaction(&self, tool: &Arc<dyn DrawTool>) {
        log::debug!("Removing {} draw tool", tool.geometry_type());
        decrement(&self.interactions);
    }

    fn add_layer(&self, _layer: &Arc<dyn OverlayLayer>) {
        self.layers.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_layer(&self, _layer: &Arc<dyn OverlayLayer>) {
        decrement(&self.layers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn tool_forwards_to_latest_listener_only() {
        let map = HeadlessMap::default();
        let tool = map.create_draw_tool(DrawGeometryType::Point);
        assert!(!map.finish_draw(1.0, 2.0));

        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&first);
        tool.set_listener(Some(Box::new(move |_: Point| flag.store(true, Ordering::SeqCst))));
        let flag = Arc::clone(&second);
        tool.set_listener(Some(Box::new(move |_: Point| flag.store(true, Ordering::SeqCst))));

        assert!(map.finish_draw(1.0, 2.0));
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }

    #[test]
    fn counts_never_go_negative() {
        let map = HeadlessMap::default();
        let layer = map.create_overlay();
        map.remove_layer(&layer);
        assert_eq!(map.layer_count(), 0);
        map.add_layer(&layer);
        assert_eq!(map.layer_count(), 1);
    }
}

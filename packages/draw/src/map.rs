//! Map collaborator interface.
//!
//! The controller never talks to a concrete map library. The host
//! supplies a [`MapCollaborator`] that creates draw tools and overlay
//! layers and installs or removes them.

use std::sync::Arc;

use buffer_search_models::{Crs, Point};
use strum_macros::{AsRefStr, Display};

/// Callback invoked with the coordinate of a completed draw gesture.
pub type DrawListener = Box<dyn Fn(Point) + Send + Sync>;

/// Geometry a draw tool captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum DrawGeometryType {
    /// A single click.
    Point,
}

/// Styling applied to overlay features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum OverlayStyle {
    /// The point the user drew.
    DrawnPoint,
    /// The buffer polygon around it.
    SearchZone,
}

/// A feature rendered on the overlay layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFeature {
    /// Geometry in the map CRS.
    pub geometry: geo::Geometry<f64>,
    /// How to render it.
    pub style: OverlayStyle,
}

impl OverlayFeature {
    /// A drawn point marker.
    #[must_use]
    pub fn drawn_point(point: &Point) -> Self {
        Self {
            geometry: geo::Geometry::Point(point.into()),
            style: OverlayStyle::DrawnPoint,
        }
    }

    /// A search zone polygon.
    #[must_use]
    pub fn search_zone(polygon: geo::Polygon<f64>) -> Self {
        Self {
            geometry: geo::Geometry::Polygon(polygon),
            style: OverlayStyle::SearchZone,
        }
    }
}

/// An interactive drawing tool.
pub trait DrawTool: Send + Sync {
    /// Geometry this tool captures.
    fn geometry_type(&self) -> DrawGeometryType;

    /// Installs the draw-end listener, replacing any previous one.
    /// `None` removes it.
    fn set_listener(&self, listener: Option<DrawListener>);
}

/// A vector layer drawn above the map.
pub trait OverlayLayer: Send + Sync {
    /// Removes every feature.
    fn clear(&self);

    /// Adds a feature.
    fn add_feature(&self, feature: OverlayFeature);
}

/// Map operations the controller needs.
pub trait MapCollaborator: Send + Sync {
    /// CRS of map coordinates.
    fn crs(&self) -> Crs;

    /// Creates a drawing tool for `geometry_type`.
    fn create_draw_tool(&self, geometry_type: DrawGeometryType) -> Arc<dyn DrawTool>;

    /// Creates an empty overlay layer.
    fn create_overlay(&self) -> Arc<dyn OverlayLayer>;

    /// Installs a drawing tool on the map.
    fn add_interaction(&self, tool: &Arc<dyn DrawTool>);

    /// Removes a drawing tool from the map.
    fn remove_interaction(&self, tool: &Arc<dyn DrawTool>);

    /// Adds an overlay layer to the map.
    fn add_layer(&self, layer: &Arc<dyn OverlayLayer>);

    /// Removes an overlay layer from the map.
    fn remove_layer(&self, layer: &Arc<dyn OverlayLayer>);
}

//! Activation-time configuration for the search pipeline.
//!
//! Every field has a default so partial TOML files deserialize cleanly.
//! Loading and validation live in the lifecycle crate.

use serde::{Deserialize, Serialize};

use crate::{Crs, LayerRef, Unit};

/// Complete configuration for one activation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// CRS of the map the user draws on.
    pub map_crs: Crs,
    /// Target layer.
    pub layer: LayerConfig,
    /// Default buffer parameters.
    pub buffer: BufferConfig,
    /// Backend query settings.
    pub query: QueryConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            map_crs: Crs::wgs84(),
            layer: LayerConfig::default(),
            buffer: BufferConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

/// Target layer section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Backend data source identifier.
    pub id: String,
    /// Geometry attribute the spatial filter applies to.
    pub geometry_field: String,
    /// CRS the backend interprets requests in.
    pub crs: Crs,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            geometry_field: "geom".to_string(),
            crs: Crs::wgs84(),
        }
    }
}

impl LayerConfig {
    /// Builds the [`LayerRef`] handed to the query client.
    #[must_use]
    pub fn layer_ref(&self) -> LayerRef {
        LayerRef {
            id: self.id.clone(),
            geometry_field_name: self.geometry_field.clone(),
            crs: self.crs.clone(),
        }
    }
}

/// Buffer section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Buffer radius in `unit`.
    pub distance: f64,
    /// Unit of `distance`.
    pub unit: Unit,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            distance: 1000.0,
            unit: Unit::Meters,
        }
    }
}

/// Query transport section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// URL the query request is POSTed to.
    pub endpoint: String,
    /// Retries for transient transport failures.
    pub max_retries: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            max_retries: 2,
            timeout_secs: 30,
        }
    }
}

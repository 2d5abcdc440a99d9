#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Core types for the point-buffer search pipeline.
//!
//! These types are shared by the buffer generator, the spatial query
//! client, the feature store and the result presenter. They carry no
//! behavior beyond small conversions and classification helpers.

pub mod config;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A coordinate reference system identifier (e.g. `"EPSG:4326"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

/// The family a known CRS code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Longitude/latitude in degrees on WGS84.
    Geographic,
    /// Spherical Web Mercator in meters.
    WebMercator,
}

impl Crs {
    /// Code of the WGS84 geographic CRS.
    pub const WGS84: &'static str = "EPSG:4326";
    /// Code of the spherical Web Mercator CRS.
    pub const WEB_MERCATOR: &'static str = "EPSG:3857";

    /// Creates a CRS from its code. The code is stored as given.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// WGS84 longitude/latitude.
    #[must_use]
    pub fn wgs84() -> Self {
        Self::new(Self::WGS84)
    }

    /// Web Mercator.
    #[must_use]
    pub fn web_mercator() -> Self {
        Self::new(Self::WEB_MERCATOR)
    }

    /// Returns the CRS code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Classifies the code, or `None` when it is not a supported CRS.
    #[must_use]
    pub fn kind(&self) -> Option<CrsKind> {
        match self.0.trim().to_ascii_uppercase().as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" | "WGS84" => Some(CrsKind::Geographic),
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" => Some(CrsKind::WebMercator),
            _ => None,
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single drawn coordinate pair.
///
/// `x` is longitude (or easting) and `y` latitude (or northing). A point
/// without a CRS is interpreted as [`Crs::WGS84`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Longitude or easting.
    pub x: f64,
    /// Latitude or northing.
    pub y: f64,
    /// Coordinate reference system of `x`/`y`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
}

impl Point {
    /// Creates a point with no explicit CRS.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, crs: None }
    }

    /// Creates a point in the given CRS.
    #[must_use]
    pub const fn with_crs(x: f64, y: f64, crs: Crs) -> Self {
        Self {
            x,
            y,
            crs: Some(crs),
        }
    }

    /// The CRS this point is expressed in, defaulting to WGS84.
    #[must_use]
    pub fn effective_crs(&self) -> Crs {
        self.crs.clone().unwrap_or_default()
    }
}

impl From<&Point> for geo::Point<f64> {
    fn from(point: &Point) -> Self {
        Self::new(point.x, point.y)
    }
}

/// Distance unit for a buffer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Unit {
    /// Meters.
    #[default]
    #[serde(alias = "m")]
    #[strum(to_string = "meters", serialize = "m")]
    Meters,
    /// Kilometers.
    #[serde(alias = "km")]
    #[strum(to_string = "kilometers", serialize = "km")]
    Kilometers,
}

impl Unit {
    /// Converts a distance in this unit to meters.
    #[must_use]
    pub fn to_meters(self, distance: f64) -> f64 {
        match self {
            Self::Meters => distance,
            Self::Kilometers => distance * 1000.0,
        }
    }
}

/// The derived search zone around a drawn point.
///
/// The polygon is expressed in `crs`, the same CRS as the origin it was
/// generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferGeometry {
    /// Closed exterior ring around the origin.
    pub polygon: geo::Polygon<f64>,
    /// CRS of the polygon coordinates.
    pub crs: Crs,
}

/// Identifies the backend data source to query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRef {
    /// Backend data source identifier.
    pub id: String,
    /// Name of the geometry attribute the spatial filter applies to.
    pub geometry_field_name: String,
    /// CRS the backend should interpret the request in.
    pub crs: Crs,
}

/// A single feature returned by the spatial data source.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identifier assigned by the data source, if any.
    pub id: Option<String>,
    /// Feature geometry. `None` for attribute-only features.
    pub geometry: Option<geo::Geometry<f64>>,
    /// Attribute properties.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    /// Creates a feature with a geometry and no properties.
    #[must_use]
    pub fn from_geometry(geometry: geo::Geometry<f64>) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            properties: serde_json::Map::new(),
        }
    }
}

/// Classification of a failed search, shared by every component.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum FailureKind {
    /// Bad buffer distance, unit or origin; rejected before querying.
    #[strum(serialize = "InvalidParameterError")]
    InvalidParameter,
    /// Backend unreachable or refused the request.
    #[strum(serialize = "TransportError")]
    Transport,
    /// Backend responded with a payload that could not be decoded.
    #[strum(serialize = "ParseError")]
    Parse,
}

/// A failed search with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct QueryFailure {
    /// Failure class.
    pub kind: FailureKind,
    /// Description of what went wrong.
    pub message: String,
}

impl QueryFailure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result of a spatial query. Never mixes partial data with failure.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// One or more features intersect the search zone.
    Success(Vec<Feature>),
    /// The query succeeded and nothing intersects the search zone.
    Empty,
    /// The query could not be completed.
    Failure(QueryFailure),
}

impl QueryOutcome {
    /// Builds `Success` or `Empty` depending on whether `features` is empty.
    #[must_use]
    pub fn from_features(features: Vec<Feature>) -> Self {
        if features.is_empty() {
            Self::Empty
        } else {
            Self::Success(features)
        }
    }

    /// The terminal kind of this outcome.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Empty => OutcomeKind::Empty,
            Self::Failure(failure) => OutcomeKind::Failure(failure.kind),
        }
    }
}

/// Data-free summary of a [`QueryOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Features were returned.
    Success,
    /// No features matched.
    Empty,
    /// The search failed.
    Failure(FailureKind),
}

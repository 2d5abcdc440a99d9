#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geodesic buffer generation around a drawn point.
//!
//! The search zone is a closed ring of [`SEGMENTS`] vertices, each placed
//! by solving the direct geodesic problem on the WGS84 ellipsoid from the
//! origin. This keeps the zone accurate at any latitude, unlike a planar
//! circle in degrees. Web Mercator origins are unprojected first and the
//! ring is projected back, so the output is always in the origin's CRS.

pub mod mercator;

use buffer_search_models::{BufferGeometry, Crs, CrsKind, Point, Unit};
use geo::{Coord, Destination, Distance, Geodesic, LineString, MapCoords, Polygon};
use thiserror::Error;

/// Number of ring segments in a generated buffer.
pub const SEGMENTS: u32 = 64;

/// Errors rejecting buffer parameters before any query is issued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    /// Distance is zero, negative, or not finite.
    #[error("buffer distance must be a finite number greater than zero, got {distance}")]
    InvalidDistance {
        /// The rejected distance.
        distance: f64,
    },

    /// Unit string is not one of the supported units.
    #[error("unsupported buffer unit '{unit}' (expected meters or kilometers)")]
    UnsupportedUnit {
        /// The rejected unit string.
        unit: String,
    },

    /// Origin CRS cannot be buffered.
    #[error("unsupported coordinate reference system '{code}'")]
    UnsupportedCrs {
        /// The rejected CRS code.
        code: String,
    },

    /// Origin coordinates are not a valid position.
    #[error("invalid origin ({x}, {y}): {reason}")]
    InvalidOrigin {
        /// Origin x.
        x: f64,
        /// Origin y.
        y: f64,
        /// Why the origin was rejected.
        reason: &'static str,
    },
}

/// A validated buffer request.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferRequest {
    origin: Point,
    distance: f64,
    unit: Unit,
}

impl BufferRequest {
    /// Validates and creates a request.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidDistance`] if `distance` is not a
    /// finite positive number.
    pub fn new(origin: Point, distance: f64, unit: Unit) -> Result<Self, BufferError> {
        validate_distance(distance)?;
        Ok(Self {
            origin,
            distance,
            unit,
        })
    }

    /// Like [`Self::new`], parsing the unit from a string such as `"km"`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::UnsupportedUnit`] for unknown unit names and
    /// [`BufferError::InvalidDistance`] for a bad distance.
    pub fn parse(origin: Point, distance: f64, unit: &str) -> Result<Self, BufferError> {
        let unit = unit
            .trim()
            .parse::<Unit>()
            .map_err(|_| BufferError::UnsupportedUnit {
                unit: unit.to_string(),
            })?;
        Self::new(origin, distance, unit)
    }

    /// The point the buffer is centered on.
    #[must_use]
    pub const fn origin(&self) -> &Point {
        &self.origin
    }

    /// The buffer radius in [`Self::unit`].
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    /// The unit of [`Self::distance`].
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Generates the buffer geometry for this request.
    ///
    /// # Errors
    ///
    /// See [`generate_buffer`].
    pub fn generate(&self) -> Result<BufferGeometry, BufferError> {
        generate_buffer(&self.origin, self.distance, self.unit)
    }
}

fn validate_distance(distance: f64) -> Result<(), BufferError> {
    if distance.is_finite() && distance > 0.0 {
        Ok(())
    } else {
        Err(BufferError::InvalidDistance { distance })
    }
}

/// Generates the polygon enclosing every point within `distance` of
/// `origin`.
///
/// Pure and deterministic: identical inputs always produce identical
/// coordinates.
///
/// # Errors
///
/// Returns [`BufferError`] if the distance is not a finite positive number,
/// the origin CRS is unsupported, or the origin is not a valid position.
pub fn generate_buffer(
    origin: &Point,
    distance: f64,
    unit: Unit,
) -> Result<BufferGeometry, BufferError> {
    validate_distance(distance)?;

    let crs = origin.effective_crs();
    let kind = crs.kind().ok_or_else(|| BufferError::UnsupportedCrs {
        code: crs.code().to_string(),
    })?;

    if !origin.x.is_finite() || !origin.y.is_finite() {
        return Err(BufferError::InvalidOrigin {
            x: origin.x,
            y: origin.y,
            reason: "coordinates must be finite",
        });
    }

    let center = match kind {
        CrsKind::Geographic => {
            if !(-90.0..=90.0).contains(&origin.y) {
                return Err(BufferError::InvalidOrigin {
                    x: origin.x,
                    y: origin.y,
                    reason: "latitude must be within [-90, 90]",
                });
            }
            geo::Point::new(origin.x, origin.y)
        }
        CrsKind::WebMercator => {
            let (lon, lat) = mercator::to_lon_lat(origin.x, origin.y);
            geo::Point::new(lon, lat)
        }
    };

    // Unit conversion happens before the distance is applied.
    let meters = unit.to_meters(distance);

    let vertices: Vec<Coord<f64>> = (0..SEGMENTS)
        .map(|step| {
            let bearing = 360.0 * f64::from(step) / f64::from(SEGMENTS);
            let vertex = Geodesic.destination(center, bearing, meters);
            Coord {
                x: vertex.x(),
                y: vertex.y(),
            }
        })
        .collect();

    let mut ring = match enclosed_pole(center, meters, origin)? {
        Some(pole_lat) => polar_ring(&vertices, pole_lat),
        None => vertices
            .into_iter()
            .map(|c| Coord {
                x: unwrap_longitude(c.x, center.x()),
                y: c.y,
            })
            .collect(),
    };

    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }

    if kind == CrsKind::WebMercator {
        for coord in &mut ring {
            let (x, y) = mercator::from_lon_lat(coord.x, coord.y);
            *coord = Coord { x, y };
        }
    }

    log::trace!(
        "Generated {SEGMENTS}-segment buffer of {distance} {unit} around ({}, {}) in {crs}",
        origin.x,
        origin.y,
    );

    Ok(BufferGeometry {
        polygon: Polygon::new(LineString::from(ring), vec![]),
        crs,
    })
}

/// Expresses `buffer` in the `target` CRS.
///
/// Used when the map and the queried layer disagree on CRS: the zone is
/// generated in the map CRS for display and reprojected for the query.
///
/// # Errors
///
/// Returns [`BufferError::UnsupportedCrs`] if either CRS is unsupported.
pub fn reproject(buffer: &BufferGeometry, target: &Crs) -> Result<BufferGeometry, BufferError> {
    let unsupported = |crs: &Crs| BufferError::UnsupportedCrs {
        code: crs.code().to_string(),
    };
    let from = buffer.crs.kind().ok_or_else(|| unsupported(&buffer.crs))?;
    let to = target.kind().ok_or_else(|| unsupported(target))?;

    let polygon = match (from, to) {
        (CrsKind::Geographic, CrsKind::Geographic) | (CrsKind::WebMercator, CrsKind::WebMercator) => {
            buffer.polygon.clone()
        }
        (CrsKind::Geographic, CrsKind::WebMercator) => buffer.polygon.map_coords(|c| {
            let (x, y) = mercator::from_lon_lat(c.x, c.y);
            Coord { x, y }
        }),
        (CrsKind::WebMercator, CrsKind::Geographic) => buffer.polygon.map_coords(|c| {
            let (x, y) = mercator::to_lon_lat(c.x, c.y);
            Coord { x, y }
        }),
    };

    Ok(BufferGeometry {
        polygon,
        crs: target.clone(),
    })
}

/// The latitude of the pole inside the zone, if the zone reaches one.
fn enclosed_pole(
    center: geo::Point<f64>,
    meters: f64,
    origin: &Point,
) -> Result<Option<f64>, BufferError> {
    let reaches = |pole_lat: f64| {
        Geodesic.distance(center, geo::Point::new(center.x(), pole_lat)) <= meters
    };
    match (reaches(90.0), reaches(-90.0)) {
        (true, true) => Err(BufferError::InvalidOrigin {
            x: origin.x,
            y: origin.y,
            reason: "search zone would contain both poles",
        }),
        (true, false) => Ok(Some(90.0)),
        (false, true) => Ok(Some(-90.0)),
        (false, false) => Ok(None),
    }
}

/// Builds an open ring around a pole from geodesic `vertices`.
///
/// A circle around a pole wraps through every longitude, so in degrees it
/// is a band rather than a ring. The band is cut at the antimeridian and
/// closed along the pole latitude, keeping every longitude in `[-180, 180]`.
fn polar_ring(vertices: &[Coord<f64>], pole_lat: f64) -> Vec<Coord<f64>> {
    let wrapped: Vec<Coord<f64>> = vertices
        .iter()
        .map(|c| Coord {
            x: unwrap_longitude(c.x, 0.0),
            y: c.y,
        })
        .collect();
    let n = wrapped.len();
    let Some(cut) = (0..n).find(|&i| (wrapped[(i + 1) % n].x - wrapped[i].x).abs() > 180.0) else {
        return wrapped;
    };

    let mut ring: Vec<Coord<f64>> = (1..=n).map(|i| wrapped[(cut + i) % n]).collect();
    let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) else {
        return ring;
    };
    let last_edge = 180.0_f64.copysign(last.x);
    let first_edge = 180.0_f64.copysign(first.x);
    ring.extend([
        Coord {
            x: last_edge,
            y: last.y,
        },
        Coord {
            x: last_edge,
            y: pole_lat,
        },
        Coord {
            x: first_edge,
            y: pole_lat,
        },
        Coord {
            x: first_edge,
            y: first.y,
        },
    ]);
    ring
}

/// Shifts `lon` by whole turns so it lies within 180 degrees of `reference`.
///
/// Keeps rings continuous when the zone crosses the antimeridian.
fn unwrap_longitude(lon: f64, reference: f64) -> f64 {
    let mut lon = lon;
    while lon - reference > 180.0 {
        lon -= 360.0;
    }
    while lon - reference < -180.0 {
        lon += 360.0;
    }
    lon
}

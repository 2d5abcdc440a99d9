//! Wire types for the backend spatial query request.
//!
//! The backend expects a JSON array of requests, each naming a data
//! source, a filter made of spatial conditions, and the CRS the
//! serialized geometry is expressed in.

use buffer_search_models::{BufferGeometry, LayerRef};
use serde::{Deserialize, Serialize};

use crate::QueryError;

/// A single data source query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Data source to query.
    pub data_source: DataSourceRef,
    /// Filter applied to the data source.
    pub filter: QueryFilter,
    /// CRS code of every geometry in the filter.
    pub crs: String,
}

/// Reference to a backend data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceRef {
    /// Data source identifier.
    pub id: String,
}

/// Conditions combined with a logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    /// Conditions to combine.
    pub condition_list: Vec<Condition>,
    /// How the conditions are combined.
    pub logical_operation: LogicalOperation,
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Spatial predicate against a geometry field.
    pub spatial_condition: SpatialCondition,
}

/// Spatial predicate: `key` relates to `geometry` by `spatial_relation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialCondition {
    /// Geometry field name on the data source.
    pub key: String,
    /// Reference geometry serialized as a `GeoJSON` string.
    pub geometry: String,
    /// Predicate to apply.
    pub spatial_relation: SpatialRelation,
}

/// Spatial predicates understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpatialRelation {
    /// Geometries share at least one point.
    Intersect,
}

/// Logical combination of filter conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperation {
    /// All conditions must hold.
    And,
    /// Any condition may hold.
    Or,
}

/// Builds an intersection query of `area` against `layer`.
///
/// # Errors
///
/// Returns [`QueryError::Json`] if the geometry cannot be serialized.
pub fn build_request(layer: &LayerRef, area: &BufferGeometry) -> Result<QueryRequest, QueryError> {
    if area.crs != layer.crs {
        log::warn!(
            "Search zone is in {} but layer '{}' expects {}",
            area.crs,
            layer.id,
            layer.crs
        );
    }

    let geometry = geojson::Geometry::new(geojson::Value::from(&area.polygon));
    let geometry = serde_json::to_string(&geometry)?;

    Ok(QueryRequest {
        data_source: DataSourceRef {
            id: layer.id.clone(),
        },
        filter: QueryFilter {
            condition_list: vec![Condition {
                spatial_condition: SpatialCondition {
                    key: layer.geometry_field_name.clone(),
                    geometry,
                    spatial_relation: SpatialRelation::Intersect,
                },
            }],
            logical_operation: LogicalOperation::And,
        },
        crs: layer.crs.code().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer_search_models::{Crs, Point, Unit};

    fn layer() -> LayerRef {
        LayerRef {
            id: "poi".to_string(),
            geometry_field_name: "geom".to_string(),
            crs: Crs::wgs84(),
        }
    }

    #[test]
    fn serializes_to_backend_shape() {
        let area =
            buffer_search_geometry::generate_buffer(&Point::new(10.0, 20.0), 100.0, Unit::Meters)
                .unwrap();
        let request = build_request(&layer(), &area).unwrap();
        let json = serde_json::to_value([&request]).unwrap();

        let first = &json[0];
        assert_eq!(first["dataSource"]["id"], "poi");
        assert_eq!(first["crs"], "EPSG:4326");
        assert_eq!(first["filter"]["logicalOperation"], "AND");
        let condition = &first["filter"]["conditionList"][0]["spatialCondition"];
        assert_eq!(condition["key"], "geom");
        assert_eq!(condition["spatialRelation"], "INTERSECT");

        let geometry: serde_json::Value =
            serde_json::from_str(condition["geometry"].as_str().unwrap()).unwrap();
        assert_eq!(geometry["type"], "Polygon");
        assert_eq!(
            geometry["coordinates"][0].as_array().unwrap().len(),
            buffer_search_geometry::SEGMENTS as usize + 1
        );
    }
}

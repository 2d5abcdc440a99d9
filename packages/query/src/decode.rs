//! Response decoding.
//!
//! The backend wraps results in an envelope whose `features` payload is
//! usually a `GeoJSON` document serialized to a string, so decoding takes
//! two passes: the envelope, then the embedded `GeoJSON`.

use buffer_search_models::Feature;
use geojson::GeoJson;
use serde_json::Value;

use crate::QueryError;

/// Decodes a backend response body into features.
///
/// Accepts `{ "success", "message", "data": [entry, ...] }`, a single entry
/// under `data`, a bare entry, or a bare array of entries. Each entry's
/// `features` is a serialized or inline `GeoJSON` document; `null` means
/// no features.
///
/// # Errors
///
/// Returns [`QueryError::Backend`] when the envelope reports failure and
/// [`QueryError::Payload`] or [`QueryError::GeoJson`] when the payload is
/// malformed.
pub fn decode_response(body: &Value) -> Result<Vec<Feature>, QueryError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("backend reported failure")
            .to_string();
        return Err(QueryError::Backend { message });
    }

    let entries: Vec<&Value> = match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get("data") {
            None => vec![body],
            Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(entry @ Value::Object(_)) => vec![entry],
            Some(_) => {
                return Err(QueryError::Payload {
                    message: "'data' must be an array or an object".to_string(),
                });
            }
        },
        _ => {
            return Err(QueryError::Payload {
                message: "response body must be a JSON object or array".to_string(),
            });
        }
    };

    let mut features = Vec::new();
    for entry in entries {
        features.extend(decode_entry(entry)?);
    }
    Ok(features)
}

fn decode_entry(entry: &Value) -> Result<Vec<Feature>, QueryError> {
    let payload = entry.get("features").ok_or_else(|| QueryError::Payload {
        message: "result entry has no 'features' field".to_string(),
    })?;

    match payload {
        Value::Null => Ok(Vec::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Vec::new()),
        Value::String(text) => convert_geojson(text.parse::<GeoJson>()?),
        Value::Object(_) => convert_geojson(GeoJson::from_json_value(payload.clone())?),
        Value::Array(items) => {
            let mut features = Vec::with_capacity(items.len());
            for item in items {
                features.extend(convert_geojson(GeoJson::from_json_value(item.clone())?)?);
            }
            Ok(features)
        }
        _ => Err(QueryError::Payload {
            message: "'features' must be a GeoJSON string or object".to_string(),
        }),
    }
}

fn convert_geojson(geojson: GeoJson) -> Result<Vec<Feature>, QueryError> {
    match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .map(convert_feature)
            .collect(),
        GeoJson::Feature(feature) => Ok(vec![convert_feature(feature)?]),
        GeoJson::Geometry(geometry) => match geometry.value {
            geojson::Value::GeometryCollection(members) => members
                .into_iter()
                .map(|member| -> Result<Feature, QueryError> {
                    Ok(Feature::from_geometry(member.try_into()?))
                })
                .collect(),
            value => Ok(vec![Feature::from_geometry(
                geojson::Geometry::new(value).try_into()?,
            )]),
        },
    }
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature, QueryError> {
    let id = feature.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });
    let geometry = feature
        .geometry
        .map(geo::Geometry::<f64>::try_from)
        .transpose()?;

    Ok(Feature {
        id,
        geometry,
        properties: feature.properties.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(count: usize) -> Value {
        let features: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "type": "Feature",
                    "id": i,
                    "geometry": { "type": "Point", "coordinates": [10.0 + i as f64 * 0.001, 20.0] },
                    "properties": { "name": format!("poi-{i}") }
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    #[test]
    fn decodes_serialized_feature_collection() {
        let body = json!({
            "success": true,
            "data": [{ "features": collection(3).to_string() }]
        });
        let features = decode_response(&body).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[1].id.as_deref(), Some("1"));
        assert_eq!(features[2].properties["name"], "poi-2");
        assert!(matches!(features[0].geometry, Some(geo::Geometry::Point(_))));
    }

    #[test]
    fn decodes_inline_payload_and_bare_entries() {
        let inline = json!({ "data": { "features": collection(2) } });
        assert_eq!(decode_response(&inline).unwrap().len(), 2);

        let bare = json!([{ "features": collection(1).to_string() }, { "features": null }]);
        assert_eq!(decode_response(&bare).unwrap().len(), 1);
    }

    #[test]
    fn geometry_collection_becomes_property_less_features() {
        let payload = json!({
            "type": "GeometryCollection",
            "geometries": [
                { "type": "Point", "coordinates": [1.0, 2.0] },
                { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] }
            ]
        });
        let body = json!({ "data": [{ "features": payload.to_string() }] });
        let features = decode_response(&body).unwrap();
        assert_eq!(features.len(), 2);
        assert!(features.iter().all(|f| f.properties.is_empty()));
    }

    #[test]
    fn empty_collection_decodes_to_no_features() {
        let body = json!({ "success": true, "data": [{ "features": collection(0).to_string() }] });
        assert!(decode_response(&body).unwrap().is_empty());
    }

    #[test]
    fn backend_failure_is_reported() {
        let body = json!({ "success": false, "message": "layer not found" });
        let err = decode_response(&body).unwrap_err();
        assert!(matches!(err, QueryError::Backend { ref message } if message == "layer not found"));
    }

    #[test]
    fn malformed_payloads_are_errors() {
        let garbled = json!({ "data": [{ "features": "{\"type\": \"FeatureColl" }] });
        assert!(decode_response(&garbled).is_err());

        let missing = json!({ "data": [{ "rows": [] }] });
        assert!(matches!(
            decode_response(&missing),
            Err(QueryError::Payload { .. })
        ));

        assert!(matches!(
            decode_response(&json!("nope")),
            Err(QueryError::Payload { .. })
        ));
    }
}

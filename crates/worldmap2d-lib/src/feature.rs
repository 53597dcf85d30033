//! GeoFeature construction from records
//!
//! Three strategies are tried in order and the first one that applies wins:
//!
//! 1. A per-source mapping (`datasources.<source>.latitude_attr` / `longitude_attr`)
//! 2. A GeoJSON-like attribute (`geojson_attr`) holding `{type, coordinates}`
//! 3. Flat `lat_attr` / `lon_attr` attributes on the record itself
//!
//! Building is a pure function of the record and the configuration.

use crate::config::MapConfig;
use crate::record::value_as_f64;
use crate::{FieldPath, MapError, Record, RecordKey, Result};
use geo::{Coord, LineString, Point, Polygon};
use serde_json::Value;
use std::collections::HashMap;

/// Geometry of a feature, in WGS84 with `x = lon` and `y = lat`
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
}

impl Geometry {
    /// A representative position (the point itself, or the first ring vertex)
    pub fn anchor(&self) -> Option<Point<f64>> {
        match self {
            Geometry::Point(point) => Some(*point),
            Geometry::Polygon(polygon) => polygon.exterior().points().next(),
        }
    }
}

/// A record together with the geometry derived from it
///
/// Features are rebuilt on every re-sync and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub geometry: Geometry,
    pub record: Record,
}

impl GeoFeature {
    #[inline]
    pub fn key(&self) -> &RecordKey {
        self.record.key()
    }
}

/// Converts records into [`GeoFeature`]s according to the map configuration
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    mappings: HashMap<String, (FieldPath, FieldPath)>,
    geojson_attr: Option<FieldPath>,
    lat_attr: FieldPath,
    lon_attr: FieldPath,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl FeatureBuilder {
    pub fn new(config: &MapConfig) -> Self {
        let mappings = config
            .datasources
            .iter()
            .filter_map(|(source, ds)| match (&ds.latitude_attr, &ds.longitude_attr) {
                (Some(lat), Some(lon)) => Some((source.clone(), (lat.clone(), lon.clone()))),
                _ => None,
            })
            .collect();
        Self {
            mappings,
            geojson_attr: config.geojson_attr.clone(),
            lat_attr: config.lat_attr.clone(),
            lon_attr: config.lon_attr.clone(),
        }
    }

    /// Builder reading every record's geometry from the GeoJSON attribute `attr`
    pub fn for_geojson(attr: FieldPath) -> Self {
        Self {
            mappings: HashMap::new(),
            geojson_attr: Some(attr.clone()),
            lat_attr: attr.clone(),
            lon_attr: attr,
        }
    }

    /// Build the feature for `record`
    pub fn build(&self, record: &Record) -> Result<GeoFeature> {
        let geometry = if let Some((lat, lon)) = self.mappings.get(record.source()) {
            Geometry::Point(read_point(record, lat, lon)?)
        } else if let Some(attr) = &self.geojson_attr {
            let value = record
                .resolve(attr)
                .ok_or_else(|| invalid(record, format!("attribute '{attr}' is absent")))?;
            parse_geojson(record, value)?
        } else {
            match read_point(record, &self.lat_attr, &self.lon_attr) {
                Ok(point) => Geometry::Point(point),
                Err(err) => {
                    tracing::warn!(
                        "Record {} has no geometry mapping and no usable '{}'/'{}' attributes",
                        record.key(),
                        self.lat_attr,
                        self.lon_attr
                    );
                    return Err(err);
                }
            }
        };

        Ok(GeoFeature {
            geometry,
            record: record.clone(),
        })
    }

    /// Position of `record` for panning, without building a full feature
    pub fn position(&self, record: &Record) -> Result<Point<f64>> {
        let feature = self.build(record)?;
        feature
            .geometry
            .anchor()
            .ok_or_else(|| invalid(record, "geometry has no vertices".to_string()))
    }
}

fn invalid(record: &Record, reason: String) -> MapError {
    MapError::InvalidGeometry {
        key: record.key().clone(),
        reason,
    }
}

fn read_point(record: &Record, lat: &FieldPath, lon: &FieldPath) -> Result<Point<f64>> {
    let read = |path: &FieldPath| {
        record.number(path).ok_or_else(|| MapError::MissingAttribute {
            key: record.key().clone(),
            attribute: path.to_string(),
        })
    };
    let lat = read(lat)?;
    let lon = read(lon)?;
    checked_point(record, lon, lat)
}

fn checked_point(record: &Record, lon: f64, lat: f64) -> Result<Point<f64>> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(invalid(record, format!("({lat}, {lon}) is outside WGS84 bounds")));
    }
    Ok(Point::new(lon, lat))
}

fn position(record: &Record, value: &Value) -> Result<Coord<f64>> {
    match value.as_array().map(Vec::as_slice) {
        Some([lon, lat, ..]) => {
            let (Some(lon), Some(lat)) = (value_as_f64(lon), value_as_f64(lat)) else {
                return Err(invalid(record, format!("non-numeric position {value}")));
            };
            Ok(checked_point(record, lon, lat)?.0)
        }
        _ => Err(invalid(record, format!("expected [lon, lat], got {value}"))),
    }
}

fn parse_geojson(record: &Record, value: &Value) -> Result<Geometry> {
    let coordinates = value
        .get("coordinates")
        .ok_or_else(|| invalid(record, "geometry has no coordinates".to_string()))?;
    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind,
        // Infer from nesting depth when the type is omitted
        None => match coordinates.get(0) {
            Some(Value::Array(_)) => "Polygon",
            _ => "Point",
        },
    };

    match kind {
        "Point" => Ok(Geometry::Point(position(record, coordinates)?.into())),
        "Polygon" => {
            let rings = coordinates
                .as_array()
                .ok_or_else(|| invalid(record, "polygon coordinates must be an array".to_string()))?;
            // Accept a bare ring or GeoJSON rings (first ring is the exterior)
            let ring = match rings.first() {
                Some(Value::Array(first)) if matches!(first.first(), Some(Value::Array(_))) => first,
                _ => rings,
            };
            let coords = ring
                .iter()
                .map(|p| position(record, p))
                .collect::<Result<Vec<_>>>()?;
            if coords.len() < 3 {
                return Err(invalid(
                    record,
                    format!("polygon ring needs at least 3 positions, got {}", coords.len()),
                ));
            }
            Ok(Geometry::Polygon(Polygon::new(LineString::from(coords), vec![])))
        }
        other => Err(invalid(record, format!("unsupported geometry type '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasourceConfig;
    use serde_json::json;

    fn config_with_geojson() -> MapConfig {
        MapConfig {
            geojson_attr: Some(FieldPath::parse("geo").unwrap()),
            ..MapConfig::default()
        }
    }

    #[test]
    fn test_flat_attributes() {
        let builder = FeatureBuilder::new(&MapConfig::default());
        let record = Record::new("s", 1, json!({"latitude": 52.0, "longitude": 8.5}));
        let feature = builder.build(&record).unwrap();
        assert_eq!(feature.geometry, Geometry::Point(Point::new(8.5, 52.0)));
        assert_eq!(feature.key(), &RecordKey::new("s", 1));
    }

    #[test]
    fn test_flat_attributes_missing() {
        let builder = FeatureBuilder::new(&MapConfig::default());
        let record = Record::new("s", 1, json!({"latitude": 52.0}));
        let err = builder.build(&record).unwrap_err();
        assert!(matches!(err, MapError::MissingAttribute { attribute, .. } if attribute == "longitude"));
    }

    #[test]
    fn test_source_mapping_wins() {
        let mut config = config_with_geojson();
        config.datasources.insert(
            "sensors".into(),
            DatasourceConfig {
                latitude_attr: Some(FieldPath::parse("lat").unwrap()),
                longitude_attr: Some(FieldPath::parse("lon").unwrap()),
                ..DatasourceConfig::default()
            },
        );
        let builder = FeatureBuilder::new(&config);
        let record = Record::new(
            "sensors",
            2,
            json!({"lat": 52.1, "lon": 8.1, "geo": {"type": "Point", "coordinates": [0.0, 0.0]}}),
        );
        let feature = builder.build(&record).unwrap();
        assert_eq!(feature.geometry, Geometry::Point(Point::new(8.1, 52.1)));

        let unmapped = Record::new("other", 3, record.fields().clone().into());
        assert_eq!(
            builder.build(&unmapped).unwrap().geometry,
            Geometry::Point(Point::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_mapped_source_missing_attribute() {
        let mut config = MapConfig::default();
        config.datasources.insert(
            "sensors".into(),
            DatasourceConfig {
                latitude_attr: Some(FieldPath::parse("pos.lat").unwrap()),
                longitude_attr: Some(FieldPath::parse("pos.lon").unwrap()),
                ..DatasourceConfig::default()
            },
        );
        let builder = FeatureBuilder::new(&config);
        let record = Record::new("sensors", 1, json!({"pos": {"lat": 1.0}}));
        assert!(matches!(
            builder.build(&record),
            Err(MapError::MissingAttribute { attribute, .. }) if attribute == "pos.lon"
        ));
    }

    #[test]
    fn test_geojson_point_and_polygon() {
        let builder = FeatureBuilder::new(&config_with_geojson());
        let point = Record::new("s", 1, json!({"geo": {"type": "Point", "coordinates": [8.9, 52.3]}}));
        assert_eq!(
            builder.build(&point).unwrap().geometry,
            Geometry::Point(Point::new(8.9, 52.3))
        );

        let bare_ring = Record::new(
            "s",
            2,
            json!({"geo": {"type": "Polygon", "coordinates": [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]}}),
        );
        let nested = Record::new(
            "s",
            3,
            json!({"geo": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]}}),
        );
        let a = builder.build(&bare_ring).unwrap().geometry;
        let b = builder.build(&nested).unwrap().geometry;
        assert_eq!(a, b);
        match a {
            Geometry::Polygon(polygon) => assert_eq!(polygon.exterior().points().next(), Some(Point::new(0.0, 0.0))),
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_geojson_errors() {
        let builder = FeatureBuilder::new(&config_with_geojson());
        let absent = Record::new("s", 1, json!({"name": "x"}));
        assert!(matches!(builder.build(&absent), Err(MapError::InvalidGeometry { .. })));

        let short = Record::new("s", 2, json!({"geo": {"type": "Polygon", "coordinates": [[0.0, 0.0]]}}));
        assert!(matches!(builder.build(&short), Err(MapError::InvalidGeometry { .. })));

        let line = Record::new("s", 3, json!({"geo": {"type": "LineString", "coordinates": [[0.0, 0.0]]}}));
        assert!(matches!(builder.build(&line), Err(MapError::InvalidGeometry { .. })));

        let out_of_range = Record::new("s", 4, json!({"geo": {"type": "Point", "coordinates": [8.0, 95.0]}}));
        assert!(matches!(builder.build(&out_of_range), Err(MapError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_untyped_geojson_is_inferred() {
        let builder = FeatureBuilder::new(&config_with_geojson());
        let record = Record::new("s", 1, json!({"geo": {"coordinates": ["8.5", "52.5"]}}));
        assert_eq!(builder.build(&record).unwrap().geometry, Geometry::Point(Point::new(8.5, 52.5)));
    }
}

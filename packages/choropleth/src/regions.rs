//! Region shapes and their binding to aggregate counts.
//!
//! Each region feature is matched to a count by its key property. Regions
//! with no count entry are "exit" regions: they are drawn with the
//! no-data fill instead of a bucket color.

use std::collections::BTreeMap;

use geo_dashboard_models::CategoryCount;
use geojson::{Feature, FeatureCollection, GeoJson};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scale::ThresholdScale;

/// Errors that can occur while reading region shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid region shapes: {message}")]
pub struct RegionShapesError {
    /// Description of what went wrong.
    pub message: String,
}

/// A region polygon with its key and display name.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionShape {
    /// Value of the key property, as text.
    pub key: String,
    /// Value of the name property, if configured and present.
    pub name: Option<String>,
    /// The original feature.
    pub feature: Feature,
}

/// All region polygons of the map, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionShapes {
    shapes: Vec<RegionShape>,
}

impl RegionShapes {
    /// Parses a `GeoJSON` `FeatureCollection` document.
    ///
    /// # Errors
    ///
    /// Returns [`RegionShapesError`] if the text is not `GeoJSON` or not a
    /// `FeatureCollection`.
    pub fn parse(
        text: &str,
        key_property: &str,
        name_property: Option<&str>,
    ) -> Result<Self, RegionShapesError> {
        let geojson: GeoJson = text.parse().map_err(|e| RegionShapesError {
            message: format!("{e}"),
        })?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(RegionShapesError {
                message: "expected a FeatureCollection".to_string(),
            });
        };
        Ok(Self::from_collection(collection, key_property, name_property))
    }

    /// Keys every feature by `key_property`. Features without the key are
    /// dropped with a warning.
    #[must_use]
    pub fn from_collection(
        collection: FeatureCollection,
        key_property: &str,
        name_property: Option<&str>,
    ) -> Self {
        let total = collection.features.len();
        let shapes: Vec<RegionShape> = collection
            .features
            .into_iter()
            .filter_map(|feature| {
                let key = feature.property(key_property).and_then(property_text)?;
                let name = name_property
                    .and_then(|p| feature.property(p))
                    .and_then(property_text);
                Some(RegionShape { key, name, feature })
            })
            .collect();

        if shapes.len() < total {
            log::warn!(
                "{} of {total} region features have no '{key_property}' property",
                total - shapes.len()
            );
        }

        Self { shapes }
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// `true` when there are no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterates the regions in document order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionShape> {
        self.shapes.iter()
    }

    /// Rebuilds a `FeatureCollection` for the renderer.
    #[must_use]
    pub fn to_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.shapes.iter().map(|s| s.feature.clone()).collect(),
            foreign_members: None,
        }
    }

    /// Styles every region from `counts` using `scale`.
    #[must_use]
    pub fn bind(
        &self,
        counts: &[CategoryCount],
        scale: &ThresholdScale,
        no_data_fill: &str,
    ) -> Vec<RegionStyle> {
        let by_key: BTreeMap<&str, u64> =
            counts.iter().map(|c| (c.key.as_str(), c.value)).collect();

        let styles: Vec<RegionStyle> = self
            .shapes
            .iter()
            .map(|shape| {
                let value = by_key.get(shape.key.as_str()).copied();
                let fill = value.map_or_else(
                    || RegionFill::NoData {
                        fill: no_data_fill.to_string(),
                    },
                    |v| RegionFill::Bucket {
                        index: scale.bucket(v),
                        color: scale.color(v).to_string(),
                    },
                );
                RegionStyle {
                    key: shape.key.clone(),
                    name: shape.name.clone(),
                    value,
                    fill,
                }
            })
            .collect();

        let matched = styles.iter().filter(|s| s.value.is_some()).count();
        if matched < counts.len() {
            log::debug!(
                "{} count keys have no region shape",
                counts.len() - matched
            );
        }

        styles
    }
}

/// Property values may be strings or numbers (e.g. zip codes).
fn property_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// How one region is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionFill {
    /// The region has a count and is shaded by its bucket.
    Bucket {
        /// Bucket index, lightest first.
        index: usize,
        /// Bucket color.
        color: String,
    },
    /// The region has no count.
    NoData {
        /// Neutral fill.
        fill: String,
    },
}

/// Style of one region in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStyle {
    /// Region key.
    pub key: String,
    /// Display name.
    pub name: Option<String>,
    /// Count, if the region appeared in the aggregate.
    pub value: Option<u64>,
    /// Fill decision.
    pub fill: RegionFill,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> RegionShapes {
        let doc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "postalCode": "10001", "PO_NAME": "New York" },
                  "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] } },
                { "type": "Feature", "properties": { "postalCode": 10002 },
                  "geometry": { "type": "Polygon", "coordinates": [[[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 0.0]]] } },
                { "type": "Feature", "properties": { "postalCode": "10003" },
                  "geometry": { "type": "Polygon", "coordinates": [[[2.0, 0.0], [3.0, 0.0], [3.0, 1.0], [2.0, 0.0]]] } },
                { "type": "Feature", "properties": { "postalCode": "10004" },
                  "geometry": { "type": "Polygon", "coordinates": [[[3.0, 0.0], [4.0, 0.0], [4.0, 1.0], [3.0, 0.0]]] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": [[[4.0, 0.0], [5.0, 0.0], [5.0, 1.0], [4.0, 0.0]]] } }
            ]
        });
        RegionShapes::parse(&doc.to_string(), "postalCode", Some("PO_NAME")).unwrap()
    }

    fn ramp() -> Vec<String> {
        vec!["#1".into(), "#2".into(), "#3".into(), "#4".into(), "#5".into()]
    }

    #[test]
    fn keys_string_and_numeric_properties() {
        let shapes = shapes();
        assert_eq!(shapes.len(), 4);
        let keys: Vec<&str> = shapes.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["10001", "10002", "10003", "10004"]);
        assert_eq!(shapes.iter().next().unwrap().name.as_deref(), Some("New York"));
    }

    #[test]
    fn zero_count_is_lowest_bucket_not_missing() {
        let counts = vec![
            CategoryCount::new("10001", 5),
            CategoryCount::new("10002", 0),
            CategoryCount::new("10003", 12),
        ];
        let scale = ThresholdScale::equal_width(Some(12), &ramp());
        let styles = shapes().bind(&counts, &scale, "none");

        assert_eq!(
            styles[1].fill,
            RegionFill::Bucket {
                index: 0,
                color: "#1".to_string()
            }
        );
        assert_eq!(styles[1].value, Some(0));
        assert_eq!(
            styles[2].fill,
            RegionFill::Bucket {
                index: 4,
                color: "#5".to_string()
            }
        );
        assert_eq!(
            styles[3].fill,
            RegionFill::NoData {
                fill: "none".to_string()
            }
        );
    }

    #[test]
    fn empty_counts_mark_every_region_no_data() {
        let scale = ThresholdScale::equal_width(None, &ramp());
        let styles = shapes().bind(&[], &scale, "none");
        assert_eq!(styles.len(), 4);
        assert!(
            styles
                .iter()
                .all(|s| matches!(s.fill, RegionFill::NoData { .. }))
        );
    }

    #[test]
    fn rejects_non_collection_documents() {
        let point = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(RegionShapes::parse(point, "postalCode", None).is_err());
        assert!(RegionShapes::parse("not json", "postalCode", None).is_err());
    }
}

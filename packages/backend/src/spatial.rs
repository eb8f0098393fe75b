//! In-memory spatial index for region attribution.
//!
//! Builds an R-tree over the region polygons so point features without a
//! region key can be assigned one by point-in-polygon lookup.

use geo::{BoundingRect, Contains, MultiPolygon};
use geo_dashboard_choropleth::regions::RegionShapes;
use rstar::{AABB, RTree, RTreeObject};

/// A region polygon stored in the R-tree with its key.
struct RegionEntry {
    key: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of region polygons keyed by region key.
pub struct RegionIndex {
    regions: RTree<RegionEntry>,
}

impl RegionIndex {
    /// Indexes every polygonal region; other geometries are skipped.
    #[must_use]
    pub fn build(shapes: &RegionShapes) -> Self {
        let entries: Vec<RegionEntry> = shapes
            .iter()
            .filter_map(|shape| {
                let Some(polygon) = shape
                    .feature
                    .geometry
                    .clone()
                    .and_then(to_multipolygon)
                else {
                    log::warn!("Region {} has no polygon geometry", shape.key);
                    return None;
                };
                Some(RegionEntry {
                    key: shape.key.clone(),
                    envelope: compute_envelope(&polygon),
                    polygon,
                })
            })
            .collect();

        let regions = RTree::bulk_load(entries);
        log::info!("Indexed {} region polygons", regions.size());
        Self { regions }
    }

    /// Number of indexed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.size()
    }

    /// `true` when no region was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.size() == 0
    }

    /// Key of the region containing the point. Regions tile the map
    /// without overlap, so the first match wins.
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64) -> Option<&str> {
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.regions
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.key.as_str())
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Computes the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> RegionShapes {
        let doc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "zip": "A" },
                  "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]] } },
                { "type": "Feature", "properties": { "zip": "B" },
                  "geometry": { "type": "MultiPolygon", "coordinates": [[[[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 0.0]]]] } },
                { "type": "Feature", "properties": { "zip": "C" },
                  "geometry": { "type": "Point", "coordinates": [5.0, 5.0] } }
            ]
        });
        RegionShapes::parse(&doc.to_string(), "zip", None).unwrap()
    }

    #[test]
    fn indexes_polygons_only() {
        assert_eq!(RegionIndex::build(&shapes()).len(), 2);
    }

    #[test]
    fn looks_up_containing_region() {
        let index = RegionIndex::build(&shapes());
        assert_eq!(index.lookup(0.5, 0.5), Some("A"));
        assert_eq!(index.lookup(1.5, 0.25), Some("B"));
        assert_eq!(index.lookup(5.0, 5.0), None);
    }
}

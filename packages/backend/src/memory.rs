//! In-memory backend.
//!
//! Evaluates dashboard queries over a fixed set of point features. The
//! query text is parsed back into a filter, so this backend sees exactly
//! what a remote SQL backend would. The dataset's base predicate must be
//! one it can evaluate. Used for offline runs and tests.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use geo::{Distance, Haversine, Point};
use geo_dashboard_choropleth::regions::RegionShapes;
use geo_dashboard_models::config::DashboardConfig;
use geo_dashboard_models::{AggregateRequest, CategoryCount, CircleSelection, LatLng};
use geo_dashboard_query::{Filter, QueryBuilder};
use geojson::{FeatureCollection, GeoJson};

use crate::spatial::RegionIndex;
use crate::{BackendError, DashboardBackend, shapes};

/// A point feature of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// Location.
    pub position: LatLng,
    /// Category value.
    pub category: String,
    /// Region key, if the source data carries one.
    pub region: Option<String>,
}

/// A [`DashboardBackend`] over in-memory point features.
pub struct MemoryBackend {
    shapes: RegionShapes,
    index: RegionIndex,
    points: Vec<PointFeature>,
    builder: QueryBuilder,
    base: Filter,
    category_column: String,
    region_column: String,
}

impl MemoryBackend {
    /// Creates a backend over `points` and `shapes`, using the dataset's
    /// column names to tell which grouping is which.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Query`] if the dataset's base predicate is
    /// not one this backend can evaluate.
    pub fn new(
        config: &DashboardConfig,
        shapes: RegionShapes,
        points: Vec<PointFeature>,
    ) -> Result<Self, BackendError> {
        let builder = QueryBuilder::new(&config.dataset);
        let base = builder.base_as_filter()?;
        let index = RegionIndex::build(&shapes);
        Ok(Self {
            shapes,
            index,
            points,
            builder,
            base,
            category_column: config.dataset.category_column.clone(),
            region_column: config.dataset.region_column.clone(),
        })
    }

    /// Loads region shapes and point features from local `GeoJSON` files.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if a file cannot be read or parsed, or if
    /// the base predicate is unsupported.
    pub fn from_files(
        config: &DashboardConfig,
        regions_path: &Path,
        points_path: &Path,
    ) -> Result<Self, BackendError> {
        let shapes = shapes::parse(&std::fs::read_to_string(regions_path)?, &config.regions)?;
        let points = parse_points(&std::fs::read_to_string(points_path)?, config)?;
        log::info!(
            "Loaded {} points and {} regions from disk",
            points.len(),
            shapes.len()
        );
        Self::new(config, shapes, points)
    }

    fn region_of(&self, point: &PointFeature) -> Option<String> {
        point.region.clone().or_else(|| {
            self.index
                .lookup(point.position.lng, point.position.lat)
                .map(ToString::to_string)
        })
    }
}

#[async_trait]
impl DashboardBackend for MemoryBackend {
    async fn region_shapes(&self) -> Result<RegionShapes, BackendError> {
        Ok(self.shapes.clone())
    }

    async fn aggregate(
        &self,
        request: &AggregateRequest,
    ) -> Result<Vec<CategoryCount>, BackendError> {
        let filter = self.builder.parse(&request.query)?;
        let by_category = request.spec.group_by == self.category_column;
        if !by_category && request.spec.group_by != self.region_column {
            return Err(BackendError::Response {
                message: format!("column \"{}\" does not exist", request.spec.group_by),
            });
        }

        let mut groups: BTreeMap<String, u64> = BTreeMap::new();
        for point in &self.points {
            if !admits(&self.base, point) || !admits(&filter, point) {
                continue;
            }
            let key = if by_category {
                Some(point.category.clone())
            } else {
                self.region_of(point)
            };
            if let Some(key) = key {
                *groups.entry(key).or_default() += 1;
            }
        }

        let mut counts: Vec<CategoryCount> = groups
            .into_iter()
            .map(|(key, value)| CategoryCount { key, value })
            .collect();
        counts.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
        counts.truncate(usize::try_from(request.spec.limit).unwrap_or(usize::MAX));
        Ok(counts)
    }
}

/// Parses point features from a `GeoJSON` `FeatureCollection`.
///
/// Features need a `Point` geometry and a category property named like
/// the dataset's category column. The region column property is
/// optional; missing regions are resolved from the shapes.
///
/// # Errors
///
/// Returns [`BackendError::Response`] if the document is not a
/// `FeatureCollection`.
pub fn parse_points(
    text: &str,
    config: &DashboardConfig,
) -> Result<Vec<PointFeature>, BackendError> {
    let geojson: GeoJson = text.parse().map_err(|e| BackendError::Response {
        message: format!("Invalid points GeoJSON: {e}"),
    })?;
    let collection = FeatureCollection::try_from(geojson).map_err(|e| BackendError::Response {
        message: format!("Points document is not a FeatureCollection: {e}"),
    })?;

    let category_column = &config.dataset.category_column;
    let region_column = &config.dataset.region_column;
    let total = collection.features.len();

    let points: Vec<PointFeature> = collection
        .features
        .iter()
        .filter_map(|feature| {
            let geojson::Value::Point(coords) = &feature.geometry.as_ref()?.value else {
                return None;
            };
            let (lng, lat) = (*coords.first()?, *coords.get(1)?);
            let category = feature.property(category_column)?.as_str()?.to_string();
            let region = feature.property(region_column).and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            Some(PointFeature {
                position: LatLng::new(lat, lng),
                category,
                region,
            })
        })
        .collect();

    if points.len() < total {
        log::warn!(
            "Skipped {} of {total} point features without a point geometry or '{category_column}'",
            total - points.len()
        );
    }

    Ok(points)
}

fn admits(filter: &Filter, point: &PointFeature) -> bool {
    filter
        .circle
        .as_ref()
        .is_none_or(|circle| within(circle, point.position))
        && filter
            .category
            .as_ref()
            .is_none_or(|category| &point.category == category)
}

/// Great-circle distance check on the mean Earth sphere, as `PostGIS`
/// geography distance does it.
fn within(circle: &CircleSelection, position: LatLng) -> bool {
    distance_m(circle.center, position) <= circle.radius_m
}

fn distance_m(a: LatLng, b: LatLng) -> f64 {
    Haversine.distance(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat))
}

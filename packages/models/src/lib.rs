#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Selection, geometry, and aggregate types for the geo dashboard.
//!
//! These types are shared by the query builder, the choropleth binding,
//! the backends, and the synchronization engine. They carry no behavior
//! beyond validation and formatting so every crate can depend on them
//! without pulling in a runtime.

pub mod config;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Sentinel category meaning "no category filter".
pub const ALL_CATEGORIES: &str = "All";

/// Smallest radius, in meters, that survives printing with 2 decimal
/// digits in a query.
pub const MIN_RADIUS_M: f64 = 0.01;

/// Errors produced when geometry fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A coordinate or radius was NaN or infinite.
    #[error("{field} must be finite, got {value}")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Latitude or longitude fell outside its valid range.
    #[error("{field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// The circle radius was zero or negative.
    #[error("radius must be positive, got {0}")]
    NonPositiveRadius(f64),

    /// The circle radius was positive but rounds to zero in a query.
    #[error("radius must be at least {MIN_RADIUS_M} m, got {0}")]
    RadiusBelowMinimum(f64),
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Creates a coordinate without validating it.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks that both components are finite and within range.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] for non-finite or out-of-range values.
    pub fn validate(&self) -> Result<(), GeometryError> {
        check_range("lat", self.lat, -90.0, 90.0)?;
        check_range("lng", self.lng, -180.0, 180.0)
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), GeometryError> {
    if !value.is_finite() {
        return Err(GeometryError::NonFinite { field, value });
    }
    if value < min || value > max {
        return Err(GeometryError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// The editable circle drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleSelection {
    /// Circle center.
    pub center: LatLng,
    /// Radius in meters.
    pub radius_m: f64,
}

impl CircleSelection {
    /// Creates a circle without validating it.
    #[must_use]
    pub const fn new(center: LatLng, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    /// Checks the center and radius.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the center is invalid or the radius is
    /// not a finite number of at least [`MIN_RADIUS_M`].
    pub fn validate(&self) -> Result<(), GeometryError> {
        self.center.validate()?;
        if !self.radius_m.is_finite() {
            return Err(GeometryError::NonFinite {
                field: "radius",
                value: self.radius_m,
            });
        }
        if self.radius_m <= 0.0 {
            return Err(GeometryError::NonPositiveRadius(self.radius_m));
        }
        if self.radius_m < MIN_RADIUS_M {
            return Err(GeometryError::RadiusBelowMinimum(self.radius_m));
        }
        Ok(())
    }
}

/// Kind of geometry edit reported by the map widget.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EditKind {
    /// The circle was dragged.
    Move,
    /// The circle radius handle was dragged.
    Resize,
}

/// A single edit-move or edit-resize event with the circle's current shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryEdit {
    /// What kind of edit happened.
    pub kind: EditKind,
    /// The circle after the edit.
    pub circle: CircleSelection,
}

/// On-screen caption describing the current circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
    /// Radius in meters.
    pub radius_m: f64,
}

impl From<&CircleSelection> for Caption {
    fn from(circle: &CircleSelection) -> Self {
        Self {
            lat: circle.center.lat,
            lng: circle.center.lng,
            radius_m: circle.radius_m,
        }
    }
}

impl std::fmt::Display for Caption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lat: {:.4}, Lng: {:.4}, Radius: {:.2} m",
            self.lat, self.lng, self.radius_m
        )
    }
}

/// One (key, value) pair of an aggregate result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryCount {
    /// Group key (category name or region identifier).
    pub key: String,
    /// Number of matching features.
    pub value: u64,
}

impl CategoryCount {
    /// Convenience constructor.
    #[must_use]
    pub fn new(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Selection state of one dashboard session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Active category, [`ALL_CATEGORIES`] when unfiltered.
    pub active_category: String,
    /// Latest per-region counts.
    pub counts: Vec<CategoryCount>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            active_category: ALL_CATEGORIES.to_string(),
            counts: Vec::new(),
        }
    }
}

impl Selection {
    /// Returns the active category, or `None` when no filter applies.
    #[must_use]
    pub fn category_filter(&self) -> Option<&str> {
        if self.active_category == ALL_CATEGORIES {
            None
        } else {
            Some(&self.active_category)
        }
    }

    /// Largest value in `counts`, or `None` when there are no counts.
    #[must_use]
    pub fn max_count(&self) -> Option<u64> {
        self.counts.iter().map(|c| c.value).max()
    }
}

/// Aggregate operation computed server-side.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateOperation {
    /// Number of rows per group.
    #[default]
    Count,
}

/// Identifies one of the dashboard's aggregate views.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViewId {
    /// Counts grouped by category, feeding the bar chart.
    Categories,
    /// Counts grouped by region, feeding the choropleth.
    Regions,
}

/// What an aggregate view computes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSpec {
    /// Column to group by.
    pub group_by: String,
    /// Aggregate operation.
    pub operation: AggregateOperation,
    /// Maximum number of groups returned.
    pub limit: u32,
}

/// A request to recompute one view for one data-source generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    /// View the result belongs to.
    pub view: ViewId,
    /// Data-source generation the query was issued under.
    pub generation: u64,
    /// Point query the aggregate is computed over.
    pub query: String,
    /// Grouping and limit.
    pub spec: AggregateSpec,
}

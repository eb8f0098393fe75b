//! Dashboard definitions loaded from TOML.
//!
//! A definition names the remote dataset, the region shapes, the initial
//! circle, and how the two aggregate views and the choropleth are set up.
//! One definition is embedded at compile time so the dashboard can start
//! without a config file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AggregateOperation, AggregateSpec, CircleSelection, GeometryError, LatLng};

/// Number of color buckets in the choropleth scale.
pub const CHOROPLETH_BUCKETS: usize = 5;

/// Embedded default dashboard definition.
const DEFAULT_DASHBOARD_TOML: &str = include_str!("../dashboards/nyc_restaurants.toml");

/// Errors that can occur while loading a dashboard definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The definition file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The definition is not valid TOML for [`DashboardConfig`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The initial circle is not a valid geometry.
    #[error("Invalid initial circle: {0}")]
    Geometry(#[from] GeometryError),

    /// A field holds a value the dashboard cannot use.
    #[error("Invalid field '{field}': {message}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Description of what went wrong.
        message: String,
    },
}

/// A complete dashboard definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Unique identifier (e.g., `"nyc_restaurants"`).
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Carto SQL API connection.
    pub carto: CartoSettings,
    /// Point dataset queried by the overlay and both aggregates.
    pub dataset: DatasetSettings,
    /// Region polygons for the choropleth.
    pub regions: RegionSettings,
    /// Circle shown when the dashboard starts.
    pub initial_circle: CircleSettings,
    /// Result limits of the aggregate views.
    #[serde(default)]
    pub views: ViewSettings,
    /// Choropleth styling.
    pub map: MapSettings,
}

/// Carto SQL API connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartoSettings {
    /// SQL API endpoint (e.g., `"https://team.carto.com/api/v2/sql"`).
    pub api_url: String,
    /// API key. Usually injected from the environment instead.
    pub api_key: Option<String>,
}

/// Table and column names of the point dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// Table holding the point features.
    pub table: String,
    /// Geometry column in EPSG:4326.
    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,
    /// Column grouped by the bar chart and filtered on category clicks.
    pub category_column: String,
    /// Column holding the region key of each point.
    pub region_column: String,
    /// Predicate always applied before the selection filters.
    pub base_filter: Option<String>,
}

fn default_geometry_column() -> String {
    "the_geom".to_string()
}

/// Where region shapes come from and which properties identify them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSettings {
    /// URL of a `GeoJSON` `FeatureCollection`.
    pub url: String,
    /// Feature property matched against the region aggregate keys.
    pub key_property: String,
    /// Feature property holding a display name.
    pub name_property: Option<String>,
}

/// Initial circle, in TOML-friendly flat form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleSettings {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
    /// Radius in meters.
    pub radius_m: f64,
}

impl From<CircleSettings> for CircleSelection {
    fn from(value: CircleSettings) -> Self {
        Self::new(LatLng::new(value.lat, value.lng), value.radius_m)
    }
}

/// Limits of the two aggregate views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSettings {
    /// Number of bars in the category chart.
    #[serde(default = "default_category_limit")]
    pub category_limit: u32,
    /// Maximum number of regions returned by the region aggregate.
    #[serde(default = "default_region_limit")]
    pub region_limit: u32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            category_limit: default_category_limit(),
            region_limit: default_region_limit(),
        }
    }
}

const fn default_category_limit() -> u32 {
    10
}

const fn default_region_limit() -> u32 {
    500
}

/// Choropleth styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSettings {
    /// One color per bucket, lightest first.
    pub ramp: Vec<String>,
    /// Fill used for regions without a count.
    #[serde(default = "default_no_data_fill")]
    pub no_data_fill: String,
    /// Legend caption prefix (e.g., `"Restaurants per zip code"`).
    pub legend_label: String,
}

fn default_no_data_fill() -> String {
    "none".to_string()
}

impl DashboardConfig {
    /// Parses and validates a definition from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or fails
    /// validation.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a definition file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Returns the embedded default definition.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse. It is a compile-time
    /// constant, so a failure is a development error caught by tests.
    #[must_use]
    pub fn embedded_default() -> Self {
        Self::from_toml_str(DEFAULT_DASHBOARD_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded dashboard definition: {e}"))
    }

    /// Checks identifiers, limits, the ramp, and the initial circle.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_identifier("dataset.table", &self.dataset.table)?;
        check_identifier("dataset.geometry_column", &self.dataset.geometry_column)?;
        check_identifier("dataset.category_column", &self.dataset.category_column)?;
        check_identifier("dataset.region_column", &self.dataset.region_column)?;

        if self.views.category_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "views.category_limit",
                message: "must be at least 1".to_string(),
            });
        }
        if self.views.region_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "views.region_limit",
                message: "must be at least 1".to_string(),
            });
        }
        if self.map.ramp.len() != CHOROPLETH_BUCKETS {
            return Err(ConfigError::Invalid {
                field: "map.ramp",
                message: format!(
                    "expected {CHOROPLETH_BUCKETS} colors, found {}",
                    self.map.ramp.len()
                ),
            });
        }
        if self.regions.key_property.is_empty() {
            return Err(ConfigError::Invalid {
                field: "regions.key_property",
                message: "must not be empty".to_string(),
            });
        }

        self.initial_circle().validate()?;
        Ok(())
    }

    /// The circle the dashboard starts with.
    #[must_use]
    pub fn initial_circle(&self) -> CircleSelection {
        self.initial_circle.into()
    }

    /// Aggregate spec of the category (bar chart) view.
    #[must_use]
    pub fn category_spec(&self) -> AggregateSpec {
        AggregateSpec {
            group_by: self.dataset.category_column.clone(),
            operation: AggregateOperation::Count,
            limit: self.views.category_limit,
        }
    }

    /// Aggregate spec of the region (choropleth) view.
    #[must_use]
    pub fn region_spec(&self) -> AggregateSpec {
        AggregateSpec {
            group_by: self.dataset.region_column.clone(),
            operation: AggregateOperation::Count,
            limit: self.views.region_limit,
        }
    }
}

/// Identifiers are spliced into SQL, so only plain names are accepted.
fn check_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let valid = !value.is_empty()
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("'{value}' is not a plain SQL identifier"),
        })
    }
}

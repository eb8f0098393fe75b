#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! SQL construction for the dashboard's data source.
//!
//! The point overlay and both aggregate views read the same data source.
//! Its query is rebuilt from the current [`Filter`] whenever the circle is
//! committed or a category bar is clicked. Geometry and category
//! predicates always compose with `AND`; the category predicate never
//! replaces the geometry one.
//!
//! Category keys come from aggregate results and end up inside a string
//! literal, so they are escaped and keys with control characters are
//! rejected. Table and column names come from the validated dashboard
//! definition and are spliced as-is.

pub mod parse;

use geo_dashboard_models::config::DatasetSettings;
use geo_dashboard_models::{AggregateSpec, CircleSelection, GeometryError};
use thiserror::Error;

pub use parse::parse_filter;

/// Errors that can occur while building a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The circle is not a valid geometry.
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    /// A category key cannot be used in a filter.
    #[error("Invalid category key {key:?}: {message}")]
    Category {
        /// The rejected key.
        key: String,
        /// Description of what went wrong.
        message: &'static str,
    },

    /// A query could not be parsed back into a [`Filter`].
    #[error("Unrecognized query: {message}")]
    Unrecognized {
        /// Description of what went wrong.
        message: String,
    },
}

/// Selection filters applied on top of the base predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Restrict points to this circle.
    pub circle: Option<CircleSelection>,
    /// Restrict points to this category.
    pub category: Option<String>,
}

impl Filter {
    /// A filter restricted to `circle` with no category.
    #[must_use]
    pub const fn within(circle: CircleSelection) -> Self {
        Self {
            circle: Some(circle),
            category: None,
        }
    }
}

/// Turns [`Filter`]s into SQL for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    table: String,
    geometry_column: String,
    category_column: String,
    base_filter: Option<String>,
}

impl QueryBuilder {
    /// Creates a builder for the configured dataset.
    #[must_use]
    pub fn new(dataset: &DatasetSettings) -> Self {
        Self {
            table: dataset.table.clone(),
            geometry_column: dataset.geometry_column.clone(),
            category_column: dataset.category_column.clone(),
            base_filter: dataset
                .base_filter
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(ToString::to_string),
        }
    }

    /// Column compared by [`Self::category_equals`].
    #[must_use]
    pub fn category_column(&self) -> &str {
        &self.category_column
    }

    /// Predicate matching points within `circle.radius_m` meters of the
    /// circle center. Coordinates are printed with 4 decimal digits.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Geometry`] for non-finite or out-of-range
    /// input.
    pub fn within_circle(&self, circle: &CircleSelection) -> Result<String, QueryError> {
        circle.validate()?;
        Ok(format!(
            "ST_DWithin({}::geography, ST_SetSRID(ST_MakePoint({:.4}, {:.4}), 4326)::geography, {:.2})",
            self.geometry_column, circle.center.lng, circle.center.lat, circle.radius_m
        ))
    }

    /// Predicate matching points whose category equals `key`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Category`] if the key is empty or contains
    /// control characters.
    pub fn category_equals(&self, key: &str) -> Result<String, QueryError> {
        Ok(format!("{} = {}", self.category_column, quote_literal(key)?))
    }

    /// Builds the full point query for `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the circle or category is invalid.
    pub fn build(&self, filter: &Filter) -> Result<String, QueryError> {
        let mut frags: Vec<String> = Vec::new();

        if let Some(base) = &self.base_filter {
            frags.push(format!("({base})"));
        }
        if let Some(circle) = &filter.circle {
            frags.push(self.within_circle(circle)?);
        }
        if let Some(category) = &filter.category {
            frags.push(self.category_equals(category)?);
        }

        let sql = format!("SELECT * FROM {}{}", self.table, where_clause(&frags));
        log::debug!("Built query: {sql}");
        Ok(sql)
    }
}

fn where_clause(frags: &[String]) -> String {
    if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    }
}

/// Quotes `key` as a SQL string literal, doubling embedded quotes.
///
/// # Errors
///
/// Returns [`QueryError::Category`] if the key is empty or contains
/// control characters.
pub fn quote_literal(key: &str) -> Result<String, QueryError> {
    if key.is_empty() {
        return Err(QueryError::Category {
            key: key.to_string(),
            message: "must not be empty",
        });
    }
    if key.chars().any(char::is_control) {
        return Err(QueryError::Category {
            key: key.to_string(),
            message: "must not contain control characters",
        });
    }
    Ok(format!("'{}'", key.replace('\'', "''")))
}

/// Wraps a point query in a grouped count.
///
/// Keys are cast to text so numeric region codes match `GeoJSON`
/// property strings. Ties are broken by key to keep results stable.
#[must_use]
pub fn aggregate_sql(query: &str, spec: &AggregateSpec) -> String {
    format!(
        "SELECT {col}::text AS key, {op}(*) AS value FROM ({query}) AS _q \
         GROUP BY {col} ORDER BY value DESC, key LIMIT {limit}",
        col = spec.group_by,
        op = spec.operation.as_ref().to_lowercase(),
        limit = spec.limit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_dashboard_models::{AggregateOperation, LatLng};

    fn dataset() -> DatasetSettings {
        DatasetSettings {
            table: "nyc_restaurants".to_string(),
            geometry_column: "the_geom".to_string(),
            category_column: "cuisine".to_string(),
            region_column: "zipcode".to_string(),
            base_filter: None,
        }
    }

    fn circle() -> CircleSelection {
        CircleSelection::new(LatLng::new(40.730_61, -73.986_64), 1000.0)
    }

    #[test]
    fn builds_circle_query() {
        let builder = QueryBuilder::new(&dataset());
        let sql = builder.build(&Filter::within(circle())).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM nyc_restaurants WHERE ST_DWithin(the_geom::geography, \
             ST_SetSRID(ST_MakePoint(-73.9866, 40.7306), 4326)::geography, 1000.00)"
        );
    }

    #[test]
    fn composes_base_circle_and_category() {
        let mut settings = dataset();
        settings.base_filter = Some("the_geom IS NOT NULL".to_string());
        let builder = QueryBuilder::new(&settings);
        let sql = builder
            .build(&Filter {
                circle: Some(circle()),
                category: Some("Pizza".to_string()),
            })
            .unwrap();
        assert!(sql.starts_with("SELECT * FROM nyc_restaurants WHERE (the_geom IS NOT NULL) AND ST_DWithin("));
        assert!(sql.ends_with(" AND cuisine = 'Pizza'"));
    }

    #[test]
    fn blank_base_filter_is_ignored() {
        let mut settings = dataset();
        settings.base_filter = Some("   ".to_string());
        let builder = QueryBuilder::new(&settings);
        assert_eq!(
            builder.build(&Filter::default()).unwrap(),
            "SELECT * FROM nyc_restaurants"
        );
    }

    #[test]
    fn escapes_category_quotes() {
        let builder = QueryBuilder::new(&dataset());
        assert_eq!(
            builder.category_equals("Children's").unwrap(),
            "cuisine = 'Children''s'"
        );
        assert_eq!(
            builder.category_equals("x' OR '1'='1").unwrap(),
            "cuisine = 'x'' OR ''1''=''1'"
        );
    }

    #[test]
    fn rejects_bad_category_keys() {
        let builder = QueryBuilder::new(&dataset());
        assert!(matches!(
            builder.category_equals(""),
            Err(QueryError::Category { .. })
        ));
        assert!(matches!(
            builder.category_equals("Pizza\n--"),
            Err(QueryError::Category { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_geometry() {
        let builder = QueryBuilder::new(&dataset());
        let bad = CircleSelection::new(LatLng::new(40.7, f64::NAN), 100.0);
        assert!(matches!(
            builder.build(&Filter::within(bad)),
            Err(QueryError::Geometry(_))
        ));
    }

    #[test]
    fn smallest_radius_prints_nonzero() {
        let builder = QueryBuilder::new(&dataset());
        let tiny = CircleSelection::new(LatLng::new(40.7, -73.9), 0.004);
        assert!(matches!(
            builder.build(&Filter::within(tiny)),
            Err(QueryError::Geometry(GeometryError::RadiusBelowMinimum(_)))
        ));

        let smallest = CircleSelection::new(LatLng::new(40.7, -73.9), 0.01);
        let sql = builder.build(&Filter::within(smallest)).unwrap();
        assert!(sql.ends_with(", 0.01)"));
        assert_eq!(builder.parse(&sql).unwrap().circle, Some(smallest));
    }

    #[test]
    fn aggregate_wraps_point_query() {
        let spec = AggregateSpec {
            group_by: "zipcode".to_string(),
            operation: AggregateOperation::Count,
            limit: 500,
        };
        assert_eq!(
            aggregate_sql("SELECT * FROM t", &spec),
            "SELECT zipcode::text AS key, count(*) AS value FROM (SELECT * FROM t) AS _q \
             GROUP BY zipcode ORDER BY value DESC, key LIMIT 500"
        );
    }
}

//! Recovers a [`Filter`] from SQL produced by [`QueryBuilder::build`].
//!
//! Only the exact shapes the builder emits are recognized. Numeric values
//! come back at the precision they were printed with (4 decimal digits
//! for coordinates, 2 for the radius).
//!
//! [`QueryBuilder::build`]: crate::QueryBuilder::build

use geo_dashboard_models::{CircleSelection, LatLng};
use regex::Regex;

use crate::{Filter, QueryBuilder, QueryError};

const CIRCLE_PATTERN: &str = r"ST_DWithin\([A-Za-z0-9_.]+::geography, ST_SetSRID\(ST_MakePoint\((-?[0-9]+(?:\.[0-9]+)?), (-?[0-9]+(?:\.[0-9]+)?)\), 4326\)::geography, ([0-9]+(?:\.[0-9]+)?)\)";

/// Parses the circle and category predicates out of `sql`.
///
/// The category comparison is only recognized as the last predicate,
/// where the builder puts it. A query without a `ST_DWithin` clause yields `circle: None`; one
/// without a category comparison yields `category: None`.
///
/// # Errors
///
/// Returns [`QueryError::Unrecognized`] if a matched number cannot be
/// parsed, or [`QueryError::Geometry`] if the recovered circle is invalid.
pub fn parse_filter(sql: &str, category_column: &str) -> Result<Filter, QueryError> {
    let circle_re = Regex::new(CIRCLE_PATTERN).map_err(|e| QueryError::Unrecognized {
        message: format!("circle pattern: {e}"),
    })?;
    let category_re = Regex::new(&format!(
        r"(?:^|[\s(]){} = '((?:[^']|'')*)'$",
        regex::escape(category_column)
    ))
    .map_err(|e| QueryError::Unrecognized {
        message: format!("category pattern: {e}"),
    })?;

    let circle = match circle_re.captures(sql) {
        Some(caps) => {
            let lng = parse_number(&caps[1])?;
            let lat = parse_number(&caps[2])?;
            let radius_m = parse_number(&caps[3])?;
            let circle = CircleSelection::new(LatLng::new(lat, lng), radius_m);
            circle.validate()?;
            Some(circle)
        }
        None => None,
    };

    let category = category_re
        .captures(sql)
        .map(|caps| caps[1].replace("''", "'"));

    Ok(Filter { circle, category })
}

fn parse_number(text: &str) -> Result<f64, QueryError> {
    text.parse().map_err(|e| QueryError::Unrecognized {
        message: format!("bad number '{text}': {e}"),
    })
}

impl QueryBuilder {
    /// Parses a query this builder produced. The base predicate is
    /// stripped first so that only the selection filters are recovered.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Unrecognized`] if the query lacks this
    /// builder's base predicate. See [`parse_filter`] for the rest.
    pub fn parse(&self, sql: &str) -> Result<Filter, QueryError> {
        let Some(base) = &self.base_filter else {
            return parse_filter(sql, self.category_column());
        };

        let prefix = format!(" WHERE ({base})");
        let Some(at) = sql.find(&prefix) else {
            return Err(QueryError::Unrecognized {
                message: format!("missing base predicate ({base})"),
            });
        };
        let rest = &sql[at + prefix.len()..];
        let selection = match rest.strip_prefix(" AND ") {
            Some(frags) => format!("{} WHERE {frags}", &sql[..at]),
            None => format!("{}{rest}", &sql[..at]),
        };
        parse_filter(&selection, self.category_column())
    }

    /// Interprets the base predicate as a [`Filter`] over point features.
    ///
    /// Only `<geometry> IS NOT NULL`, which every point satisfies, and
    /// `<category> = '<key>'` are understood.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Unrecognized`] for any other predicate.
    pub fn base_as_filter(&self) -> Result<Filter, QueryError> {
        let Some(base) = &self.base_filter else {
            return Ok(Filter::default());
        };
        if *base == format!("{} IS NOT NULL", self.geometry_column) {
            return Ok(Filter::default());
        }

        let filter = parse_filter(base, self.category_column())?;
        if filter.circle.is_none()
            && let Some(category) = &filter.category
            && *base == self.category_equals(category)?
        {
            return Ok(filter);
        }
        Err(QueryError::Unrecognized {
            message: format!("unsupported base predicate ({base})"),
        })
    }
}

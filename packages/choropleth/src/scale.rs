//! Equal-width threshold color scale.

use geo_dashboard_models::config::CHOROPLETH_BUCKETS;
use serde::{Deserialize, Serialize};

/// One bucket of the scale: values in `[lower, upper)` get `color`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    /// Inclusive lower bound.
    pub lower: f64,
    /// Exclusive upper bound (the last bin also holds the maximum).
    pub upper: f64,
    /// Fill color.
    pub color: String,
}

/// Maps counts to one of [`CHOROPLETH_BUCKETS`] colors.
///
/// `[0, max)` is split into equal-width bins whose inner edges are the
/// thresholds. A value below the first threshold gets the lightest color;
/// a value at or above the last threshold gets the darkest. When there is
/// no positive maximum the scale is degenerate: it has no thresholds and
/// every value maps to the lightest color.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdScale {
    max: f64,
    thresholds: Vec<f64>,
    colors: Vec<String>,
}

impl ThresholdScale {
    /// Builds the scale over `[0, max)` using `ramp`, lightest first.
    ///
    /// `ramp` should hold [`CHOROPLETH_BUCKETS`] colors; extra colors are
    /// ignored and a short ramp repeats its last color.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn equal_width(max: Option<u64>, ramp: &[String]) -> Self {
        let colors = fit_ramp(ramp);

        let Some(max) = max.filter(|m| *m > 0) else {
            return Self {
                max: 0.0,
                thresholds: Vec::new(),
                colors,
            };
        };

        let max = max as f64;
        let width = max / CHOROPLETH_BUCKETS as f64;
        let thresholds = (1..CHOROPLETH_BUCKETS).map(|i| width * i as f64).collect();

        Self {
            max,
            thresholds,
            colors,
        }
    }

    /// `true` when there is no positive maximum to scale over.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Upper end of the domain.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Inner bucket edges, ascending.
    #[must_use]
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Bucket index of `value`, in `0..CHOROPLETH_BUCKETS`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bucket(&self, value: u64) -> usize {
        let value = value as f64;
        self.thresholds.partition_point(|t| *t <= value)
    }

    /// Color of `value`.
    #[must_use]
    pub fn color(&self, value: u64) -> &str {
        &self.colors[self.bucket(value)]
    }

    /// The bins of a non-degenerate scale; empty when degenerate.
    #[must_use]
    pub fn bins(&self) -> Vec<Bin> {
        if self.is_degenerate() {
            return Vec::new();
        }
        let mut edges = Vec::with_capacity(CHOROPLETH_BUCKETS + 1);
        edges.push(0.0);
        edges.extend_from_slice(&self.thresholds);
        edges.push(self.max);

        edges
            .windows(2)
            .zip(&self.colors)
            .map(|(w, color)| Bin {
                lower: w[0],
                upper: w[1],
                color: color.clone(),
            })
            .collect()
    }
}

fn fit_ramp(ramp: &[String]) -> Vec<String> {
    if ramp.len() != CHOROPLETH_BUCKETS {
        log::warn!(
            "Color ramp has {} colors, expected {CHOROPLETH_BUCKETS}",
            ramp.len()
        );
    }
    let last = ramp.last().cloned().unwrap_or_else(|| "#cccccc".to_string());
    (0..CHOROPLETH_BUCKETS)
        .map(|i| ramp.get(i).cloned().unwrap_or_else(|| last.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Vec<String> {
        ["#c0", "#c1", "#c2", "#c3", "#c4"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn partitions_twelve_into_five_bins() {
        let scale = ThresholdScale::equal_width(Some(12), &ramp());
        assert!((scale.max() - 12.0).abs() < f64::EPSILON);
        let expected = [2.4, 4.8, 7.2, 9.6];
        for (t, e) in scale.thresholds().iter().zip(expected) {
            assert!((t - e).abs() < 1e-9, "threshold {t} != {e}");
        }

        let bins = scale.bins();
        assert_eq!(bins.len(), CHOROPLETH_BUCKETS);
        for bin in &bins {
            assert!((bin.upper - bin.lower - 2.4).abs() < 1e-9);
        }
        assert!(bins[0].lower.abs() < f64::EPSILON);
        assert!((bins[4].upper - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buckets_values() {
        let scale = ThresholdScale::equal_width(Some(12), &ramp());
        assert_eq!(scale.bucket(0), 0);
        assert_eq!(scale.color(0), "#c0");
        assert_eq!(scale.bucket(2), 0);
        assert_eq!(scale.bucket(3), 1);
        assert_eq!(scale.bucket(5), 2);
        assert_eq!(scale.bucket(12), 4);
        assert_eq!(scale.color(12), "#c4");
    }

    #[test]
    fn degenerate_without_positive_max() {
        for max in [None, Some(0)] {
            let scale = ThresholdScale::equal_width(max, &ramp());
            assert!(scale.is_degenerate());
            assert!(scale.bins().is_empty());
            assert_eq!(scale.bucket(0), 0);
            assert_eq!(scale.color(7), "#c0");
        }
    }

    #[test]
    fn short_ramp_repeats_last_color() {
        let scale = ThresholdScale::equal_width(Some(5), &["#a".to_string(), "#b".to_string()]);
        assert_eq!(scale.color(0), "#a");
        assert_eq!(scale.color(5), "#b");
    }
}

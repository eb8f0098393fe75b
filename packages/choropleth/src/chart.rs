//! Ranked bar chart of category counts.

use geo_dashboard_models::{ALL_CATEGORIES, CategoryCount};
use serde::{Deserialize, Serialize};

/// One bar of the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Category key; clicking the bar selects it.
    pub key: String,
    /// Count.
    pub value: u64,
    /// Bar length relative to the longest bar, in `[0, 1]`.
    pub fraction: f64,
}

/// Bars ranked by count, plus the highlighted category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarChart {
    /// Bars, largest first.
    pub bars: Vec<Bar>,
    /// Active category, [`ALL_CATEGORIES`] when none is highlighted.
    pub active_category: String,
}

impl BarChart {
    /// Ranks `counts` descending by value, ties by key.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(counts: &[CategoryCount]) -> Self {
        let mut ranked = counts.to_vec();
        ranked.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.key.cmp(&b.key)));

        let max = ranked.first().map_or(0, |c| c.value);
        let bars = ranked
            .into_iter()
            .map(|c| Bar {
                fraction: if max == 0 {
                    0.0
                } else {
                    c.value as f64 / max as f64
                },
                key: c.key,
                value: c.value,
            })
            .collect();

        Self {
            bars,
            active_category: ALL_CATEGORIES.to_string(),
        }
    }

    /// Moves the highlight without rebuilding the bars.
    pub fn restate(&mut self, active_category: &str) {
        active_category.clone_into(&mut self.active_category);
    }

    /// `true` if `key` is the highlighted bar.
    #[must_use]
    pub fn is_active(&self, key: &str) -> bool {
        self.active_category == key
    }
}

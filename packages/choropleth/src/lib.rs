#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Choropleth and bar chart models for the geo dashboard.
//!
//! Rendering itself happens elsewhere. This crate computes what gets
//! drawn: the equal-width threshold scale over the current region counts,
//! the per-region fill decisions, the legend, and the ranked bar chart.
//! All of it tolerates empty input so a filter that matches nothing still
//! produces a drawable (if blank) frame.

pub mod chart;
pub mod legend;
pub mod regions;
pub mod scale;

use geo_dashboard_models::Selection;
use geo_dashboard_models::config::MapSettings;
use serde::{Deserialize, Serialize};

use crate::legend::Legend;
use crate::regions::{RegionShapes, RegionStyle};
use crate::scale::ThresholdScale;

/// Everything the map needs for one redraw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoroplethFrame {
    /// Per-region fills, in shape order.
    pub regions: Vec<RegionStyle>,
    /// Legend matching the fills.
    pub legend: Legend,
}

impl ChoroplethFrame {
    /// Computes the frame for the current selection.
    #[must_use]
    pub fn draw(shapes: &RegionShapes, selection: &Selection, settings: &MapSettings) -> Self {
        let scale = ThresholdScale::equal_width(selection.max_count(), &settings.ramp);
        if scale.is_degenerate() {
            log::debug!("Redrawing map with a degenerate scale");
        }

        Self {
            regions: shapes.bind(&selection.counts, &scale, &settings.no_data_fill),
            legend: Legend::new(&scale, &settings.legend_label, &selection.active_category),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_dashboard_models::CategoryCount;
    use regions::RegionFill;

    fn settings() -> MapSettings {
        MapSettings {
            ramp: vec!["#1".into(), "#2".into(), "#3".into(), "#4".into(), "#5".into()],
            no_data_fill: "none".to_string(),
            legend_label: "Restaurants per zip code".to_string(),
        }
    }

    fn shapes() -> RegionShapes {
        let doc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "zip": "10001" }, "geometry": null },
                { "type": "Feature", "properties": { "zip": "10002" }, "geometry": null }
            ]
        });
        RegionShapes::parse(&doc.to_string(), "zip", None).unwrap()
    }

    #[test]
    fn draws_frame_with_legend_caption() {
        let selection = Selection {
            active_category: "Pizza".to_string(),
            counts: vec![CategoryCount::new("10001", 7)],
        };
        let frame = ChoroplethFrame::draw(&shapes(), &selection, &settings());
        assert_eq!(frame.legend.caption, "Restaurants per zip code: Pizza");
        assert_eq!(frame.legend.swatches.len(), 5);
        assert!(matches!(frame.regions[0].fill, RegionFill::Bucket { index: 4, .. }));
        assert!(matches!(frame.regions[1].fill, RegionFill::NoData { .. }));
    }

    #[test]
    fn empty_counts_draw_without_panicking() {
        let frame = ChoroplethFrame::draw(&shapes(), &Selection::default(), &settings());
        assert!(frame.legend.is_empty());
        assert_eq!(frame.regions.len(), 2);
    }
}

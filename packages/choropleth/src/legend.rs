//! Legend rebuilt from the scale on every redraw.

use serde::{Deserialize, Serialize};

use crate::scale::{Bin, ThresholdScale};

/// Swatches, axis ticks, and the caption naming the active category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    /// Caption, e.g. `"Restaurants per zip code: Pizza"`.
    pub caption: String,
    /// One swatch per bin; empty for a degenerate scale.
    pub swatches: Vec<Bin>,
    /// Axis tick values at the bin edges; empty for a degenerate scale.
    pub ticks: Vec<f64>,
}

impl Legend {
    /// Builds the legend for `scale`.
    #[must_use]
    pub fn new(scale: &ThresholdScale, label: &str, active_category: &str) -> Self {
        let swatches = scale.bins();
        let ticks = swatches
            .first()
            .map(|first| first.lower)
            .into_iter()
            .chain(swatches.iter().map(|bin| bin.upper))
            .collect();

        Self {
            caption: format!("{label}: {active_category}"),
            swatches,
            ticks,
        }
    }

    /// `true` when the legend has nothing to show but its caption.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }
}

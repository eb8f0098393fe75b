//! Where the engine's drawing decisions go.

use geo_dashboard_choropleth::ChoroplethFrame;
use geo_dashboard_choropleth::chart::BarChart;
use geo_dashboard_models::Caption;

/// Receives everything the dashboard draws.
///
/// The engine decides what to draw and when; a sink only renders it. All
/// calls happen on the engine's task, in order.
pub trait RenderSink: Send + 'static {
    /// Replaces the dashboard with a placeholder after a fatal startup error.
    fn show_placeholder(&mut self, message: &str);

    /// Updates the caption describing the circle.
    fn draw_caption(&mut self, caption: &Caption);

    /// Draws the bar chart. Called once per session.
    fn draw_chart(&mut self, chart: &BarChart);

    /// Moves the chart highlight without rebuilding its bars.
    fn restate_chart(&mut self, active_category: &str);

    /// Redraws the choropleth and its legend.
    fn draw_map(&mut self, frame: &ChoroplethFrame);

    /// Re-renders the point layer for the current query.
    fn draw_points(&mut self, query: &str);
}

/// A sink that only logs what it would draw.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl RenderSink for LogSink {
    fn show_placeholder(&mut self, message: &str) {
        log::error!("Dashboard unavailable: {message}");
    }

    fn draw_caption(&mut self, caption: &Caption) {
        log::debug!("Caption: {caption}");
    }

    fn draw_chart(&mut self, chart: &BarChart) {
        log::info!("Drew bar chart with {} bars", chart.bars.len());
    }

    fn restate_chart(&mut self, active_category: &str) {
        log::info!("Chart highlight: {active_category}");
    }

    fn draw_map(&mut self, frame: &ChoroplethFrame) {
        log::info!(
            "Drew {} regions ({})",
            frame.regions.len(),
            frame.legend.caption
        );
    }

    fn draw_points(&mut self, query: &str) {
        log::debug!("Point layer query: {query}");
    }
}

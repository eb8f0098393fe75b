#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Selection-driven query and view synchronization.
//!
//! A circle drawn on the map and a clicked category bar together decide
//! the data-source query. Every query change fans out to the aggregate
//! views: the category view feeds the bar chart exactly once, the region
//! view repaints the choropleth on every change.
//!
//! [`engine::Dashboard`] holds the state machine and never does I/O.
//! [`actor::spawn_dashboard`] runs it on a single tokio task against a
//! [`geo_dashboard_backend::DashboardBackend`], so all mutation of the
//! session happens in one place.

pub mod actor;
pub mod controller;
pub mod engine;
pub mod sink;
pub mod source;
pub mod views;

use geo_dashboard_choropleth::ChoroplethFrame;
use geo_dashboard_choropleth::chart::BarChart;
use geo_dashboard_models::config::ConfigError;
use geo_dashboard_models::{Caption, Selection};
use geo_dashboard_query::QueryError;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub use actor::{DashboardHandle, spawn_dashboard};
pub use engine::Dashboard;
pub use sink::{LogSink, RenderSink};

/// Errors that can occur while driving a dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The dashboard definition is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A selection could not be turned into a query.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// The dashboard task has stopped.
    #[error("Dashboard is no longer running")]
    Closed,
}

/// Lifecycle of a dashboard session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(tag = "state", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DashboardStatus {
    /// Waiting for the region shapes.
    Loading,
    /// Shapes loaded; events are processed.
    Ready,
    /// Startup failed; the placeholder is shown.
    Failed {
        /// Why startup failed.
        message: String,
    },
}

/// Serializable view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    /// Dashboard definition id.
    pub id: String,
    /// Dashboard title.
    pub title: String,
    /// Lifecycle state.
    pub status: DashboardStatus,
    /// Caption of the current circle.
    pub caption: Caption,
    /// Commit gate state, e.g. `"IDLE"`.
    pub gate: String,
    /// Active category and latest region counts.
    pub selection: Selection,
    /// Point-overlay query.
    pub query: String,
    /// Data-source generation of `query`.
    pub generation: u64,
    /// Bar chart, once built.
    pub chart: Option<BarChart>,
    /// Last choropleth frame, once drawn.
    pub map: Option<ChoroplethFrame>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_with_state_tag() {
        let failed = DashboardStatus::Failed {
            message: "no shapes".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "state": "failed", "message": "no shapes" })
        );
        assert_eq!(
            serde_json::to_value(DashboardStatus::Ready).unwrap(),
            serde_json::json!({ "state": "ready" })
        );
        assert_eq!(DashboardStatus::Loading.to_string(), "loading");
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Backends that serve region shapes and aggregate views.
//!
//! The dashboard engine only knows the [`DashboardBackend`] contract:
//! fetch the region shapes once, and compute a grouped count for a point
//! query. [`carto::CartoBackend`] talks to a hosted Carto SQL API;
//! [`memory::MemoryBackend`] evaluates the same queries over in-memory
//! point features.

pub mod carto;
pub mod memory;
pub mod retry;
pub mod shapes;
pub mod spatial;

use async_trait::async_trait;
use geo_dashboard_choropleth::regions::{RegionShapes, RegionShapesError};
use geo_dashboard_models::{AggregateRequest, CategoryCount};
use geo_dashboard_query::QueryError;
use thiserror::Error;

/// Errors that can occur while talking to a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (reading local data files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Region shapes could not be parsed.
    #[error(transparent)]
    Shapes(#[from] RegionShapesError),

    /// The backend could not interpret a query.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// The backend answered with something unusable.
    #[error("Response error: {message}")]
    Response {
        /// Description of what went wrong.
        message: String,
    },
}

/// The remote side of the dashboard.
#[async_trait]
pub trait DashboardBackend: Send + Sync {
    /// Fetches the region polygons used by the choropleth.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the shapes cannot be fetched or parsed.
    async fn region_shapes(&self) -> Result<RegionShapes, BackendError>;

    /// Computes `request.spec` over the points matched by `request.query`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the query is rejected or the response
    /// cannot be read.
    async fn aggregate(&self, request: &AggregateRequest)
    -> Result<Vec<CategoryCount>, BackendError>;
}

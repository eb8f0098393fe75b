#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the geo dashboard server.
//!
//! These mirror the map widget's events on the wire. They are kept apart
//! from the engine types so the HTTP contract can change independently.

use geo_dashboard_models::{CircleSelection, EditKind, GeometryEdit, LatLng};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned with 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// What went wrong.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A circle on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCircle {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
    /// Radius in meters.
    pub radius_m: f64,
}

impl From<ApiCircle> for CircleSelection {
    fn from(circle: ApiCircle) -> Self {
        Self::new(LatLng::new(circle.lat, circle.lng), circle.radius_m)
    }
}

/// Body of `POST /api/events/edit`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EditRequest {
    /// `"move"` or `"resize"`.
    pub kind: EditKind,
    /// The circle after the edit.
    #[serde(flatten)]
    pub circle: ApiCircle,
}

impl From<EditRequest> for GeometryEdit {
    fn from(request: EditRequest) -> Self {
        Self {
            kind: request.kind,
            circle: request.circle.into(),
        }
    }
}

/// Body of `POST /api/events/commit`: the circle as released.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommitRequest {
    /// The committed circle.
    #[serde(flatten)]
    pub circle: ApiCircle,
}

/// Body of `POST /api/events/category`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRequest {
    /// Clicked category key; `"All"` clears the filter.
    pub key: String,
}

/// Response to an accepted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAccepted {
    /// Data-source generation after the event was applied.
    pub generation: u64,
}

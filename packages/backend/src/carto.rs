//! Carto SQL API backend.
//!
//! Aggregates are computed server-side by wrapping the point query in a
//! grouped count and sending it to the SQL API as `GET ?q=`. Responses
//! carry a `rows` array of `{ "key": ..., "value": ... }` objects.

use async_trait::async_trait;
use geo_dashboard_choropleth::regions::RegionShapes;
use geo_dashboard_models::config::{DashboardConfig, RegionSettings};
use geo_dashboard_models::{AggregateRequest, CategoryCount};
use geo_dashboard_query::aggregate_sql;

use crate::{BackendError, DashboardBackend, retry, shapes};

/// A [`DashboardBackend`] backed by a Carto SQL API endpoint.
pub struct CartoBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    regions: RegionSettings,
}

impl CartoBackend {
    /// Creates a backend for the configured endpoint and region shapes.
    #[must_use]
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.carto.api_url.clone(),
            api_key: config.carto.api_key.clone(),
            regions: config.regions.clone(),
        }
    }

    /// Overrides the API key from the definition.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if api_key.is_some() {
            self.api_key = api_key;
        }
        self
    }

    async fn run_sql(&self, sql: &str) -> Result<serde_json::Value, BackendError> {
        retry::send_json(|| {
            let request = self.client.get(&self.api_url).query(&[("q", sql)]);
            match &self.api_key {
                Some(key) => request.query(&[("api_key", key)]),
                None => request,
            }
        })
        .await
    }
}

#[async_trait]
impl DashboardBackend for CartoBackend {
    async fn region_shapes(&self) -> Result<RegionShapes, BackendError> {
        shapes::fetch(&self.client, &self.regions).await
    }

    async fn aggregate(
        &self,
        request: &AggregateRequest,
    ) -> Result<Vec<CategoryCount>, BackendError> {
        let sql = aggregate_sql(&request.query, &request.spec);
        log::debug!(
            "{} aggregate (generation {}): {sql}",
            request.view,
            request.generation
        );
        let body = self.run_sql(&sql).await?;
        parse_rows(&body)
    }
}

/// Parses an SQL API response into counts.
///
/// Rows with a null key are skipped. Keys may be strings or numbers;
/// values must be non-negative integers.
///
/// # Errors
///
/// Returns [`BackendError::Response`] if the body reports an error, has
/// no `rows` array, or a row has an unusable value.
pub fn parse_rows(body: &serde_json::Value) -> Result<Vec<CategoryCount>, BackendError> {
    if let Some(error) = body.get("error") {
        return Err(BackendError::Response {
            message: format!("Carto error: {error}"),
        });
    }

    let rows = body
        .get("rows")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| BackendError::Response {
            message: "No rows array in SQL API response".to_string(),
        })?;

    let mut counts = Vec::with_capacity(rows.len());
    for row in rows {
        let key = match row.get("key") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::Null) | None => {
                log::debug!("Skipping aggregate row with null key");
                continue;
            }
            Some(other) => {
                return Err(BackendError::Response {
                    message: format!("Unexpected aggregate key {other}"),
                });
            }
        };

        let value = row
            .get("value")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| BackendError::Response {
                message: format!("Aggregate row '{key}' has no non-negative integer value"),
            })?;

        counts.push(CategoryCount { key, value });
    }

    Ok(counts)
}

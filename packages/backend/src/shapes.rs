//! Region shape document fetcher.
//!
//! Fetches a standard `GeoJSON` `FeatureCollection` from any URL that
//! returns it directly, and keys its features for the choropleth.

use geo_dashboard_choropleth::regions::RegionShapes;
use geo_dashboard_models::config::RegionSettings;

use crate::{BackendError, retry};

/// Downloads and parses the configured region shapes.
///
/// # Errors
///
/// Returns [`BackendError`] if the request fails or the document is not
/// a `FeatureCollection`.
pub async fn fetch(
    client: &reqwest::Client,
    settings: &RegionSettings,
) -> Result<RegionShapes, BackendError> {
    log::info!("Fetching region shapes from {}", settings.url);
    let body = retry::send_text(|| client.get(&settings.url)).await?;
    let shapes = parse(&body, settings)?;
    log::info!("Loaded {} region shapes", shapes.len());
    Ok(shapes)
}

/// Parses a region shape document with the configured key and name
/// properties.
///
/// # Errors
///
/// Returns [`BackendError::Shapes`] if the document is not a
/// `FeatureCollection`.
pub fn parse(text: &str, settings: &RegionSettings) -> Result<RegionShapes, BackendError> {
    Ok(RegionShapes::parse(
        text,
        &settings.key_property,
        settings.name_property.as_deref(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_configured_properties() {
        let settings = RegionSettings {
            url: "https://example.com/zips.geojson".to_string(),
            key_property: "postalCode".to_string(),
            name_property: Some("PO_NAME".to_string()),
        };
        let doc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "postalCode": "11201", "PO_NAME": "Brooklyn" },
                "geometry": null
            }]
        });
        let shapes = parse(&doc.to_string(), &settings).unwrap();
        let shape = shapes.iter().next().unwrap();
        assert_eq!(shape.key, "11201");
        assert_eq!(shape.name.as_deref(), Some("Brooklyn"));
    }

    #[test]
    fn rejects_non_geojson() {
        let settings = RegionSettings {
            url: String::new(),
            key_property: "postalCode".to_string(),
            name_property: None,
        };
        assert!(matches!(
            parse("<html></html>", &settings),
            Err(BackendError::Shapes(_))
        ));
    }
}

//! Google Geocoding and Places Nearby Search adapter.
//!
//! See:
//! - <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>
//! - <https://developers.google.com/maps/documentation/places/web-service/search-nearby>
//!
//! A nearby search returns at most 20 places per page and at most three
//! pages, so a single query never reports more than 60 places.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Coordinate, Place, ProviderConfig};
use crate::services::{PlacePage, PlaceSource};

/// Geocoding API response.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinate,
}

/// Nearby Search API response.
///
/// Results are kept as raw JSON so every provider field survives into the
/// snapshot.
#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Map a response status onto the crawler's error taxonomy.
///
/// `paging` marks follow-up requests carrying a page token; the provider
/// answers `INVALID_REQUEST` until a fresh token becomes valid, so that case
/// is worth retrying.
fn check_status(status: &str, error_message: Option<&str>, paging: bool) -> Result<()> {
    let message = error_message.unwrap_or("no details").to_string();
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "REQUEST_DENIED" => Err(AppError::config(format!(
            "provider rejected the request (check the API key): {message}"
        ))),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(AppError::provider(status, message, true)),
        "INVALID_REQUEST" => Err(AppError::provider(status, message, paging)),
        other => Err(AppError::provider(other, message, false)),
    }
}

/// Place source backed by the Google Maps web services.
pub struct GooglePlacesSource {
    client: Client,
    base_url: Url,
    api_key: String,
    place_type: String,
}

impl GooglePlacesSource {
    /// Create a source from provider settings and an API key.
    pub fn new(client: Client, config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_key: api_key.into(),
            place_type: config.place_type.clone(),
        })
    }

    fn geocode_url(&self, area_code: &str) -> Result<Url> {
        let mut url = self.base_url.join("geocode/json")?;
        url.query_pairs_mut()
            .append_pair("address", area_code)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    fn nearby_url(&self, center: Coordinate, radius_m: u32, page_token: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.join("place/nearbysearch/json")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("location", &center.to_query())
                .append_pair("radius", &radius_m.to_string())
                .append_pair("type", &self.place_type)
                .append_pair("key", &self.api_key);
            if let Some(token) = page_token {
                query.append_pair("pagetoken", token);
            }
        }
        Ok(url)
    }

    /// GET a URL and return the body; errors never echo the URL (it holds the key).
    async fn get_text(&self, url: Url) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Http(e.without_url()))?;
        response
            .text()
            .await
            .map_err(|e| AppError::Http(e.without_url()))
    }
}

fn parse_geocode(area_code: &str, body: &str) -> Result<Coordinate> {
    let response: GeocodeResponse = serde_json::from_str(body)?;
    if response.status == "ZERO_RESULTS" {
        return Err(AppError::geocode(area_code, "Invalid area code: no results"));
    }
    check_status(&response.status, response.error_message.as_deref(), false)?;

    response
        .results
        .into_iter()
        .next()
        .map(|r| r.geometry.location)
        .ok_or_else(|| AppError::geocode(area_code, "Invalid area code: no results"))
}

fn parse_nearby(body: &str, paging: bool) -> Result<PlacePage> {
    let response: NearbyResponse = serde_json::from_str(body)?;
    check_status(&response.status, response.error_message.as_deref(), paging)?;

    let places = response
        .results
        .into_iter()
        .map(Place::from_value)
        .collect::<Result<Vec<_>>>()?;

    Ok(PlacePage {
        places,
        next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
    })
}

#[async_trait]
impl PlaceSource for GooglePlacesSource {
    async fn geocode(&self, area_code: &str) -> Result<Coordinate> {
        let body = self.get_text(self.geocode_url(area_code)?).await?;
        parse_geocode(area_code, &body)
    }

    async fn fetch_page(
        &self,
        center: Coordinate,
        radius_m: u32,
        page_token: Option<&str>,
    ) -> Result<PlacePage> {
        let url = self.nearby_url(center, radius_m, page_token)?;
        let body = self.get_text(url).await?;
        parse_nearby(&body, page_token.is_some())
    }
}

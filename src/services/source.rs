// src/services/source.rs

//! Contract between the crawl engine and a place provider.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Coordinate, Place};

/// One page of a nearby search.
#[derive(Debug, Clone, Default)]
pub struct PlacePage {
    pub places: Vec<Place>,
    /// Cursor for the next page; `None` once the result set is exhausted.
    pub next_page_token: Option<String>,
}

/// A provider of geocoding and paginated nearby search.
///
/// Implementations make exactly one upstream request per call. Pacing,
/// retries and timeouts are applied by the caller.
#[async_trait]
pub trait PlaceSource: Send + Sync {
    /// Resolve a postal or administrative code to a coordinate.
    ///
    /// Failure is reported as [`AppError::Geocode`](crate::error::AppError::Geocode).
    async fn geocode(&self, area_code: &str) -> Result<Coordinate>;

    /// Fetch one page of places within `radius_m` of `center`.
    async fn fetch_page(
        &self,
        center: Coordinate,
        radius_m: u32,
        page_token: Option<&str>,
    ) -> Result<PlacePage>;
}

//! Shared fixtures for crawl behaviour tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hexcrawl::error::{AppError, Result};
use hexcrawl::grid::{Resolution, Tile, cell_at};
use hexcrawl::models::{Coordinate, CrawlerConfig, Place};
use hexcrawl::services::{PlacePage, PlaceSource};

/// Center of ZIP 94402 (San Mateo, CA).
pub const SAN_MATEO: Coordinate = Coordinate {
    lat: 37.5522,
    lng: -122.3270,
};

/// Places per page, as the real provider sends them.
pub const PAGE_SIZE: usize = 20;

/// One recorded `fetch_page` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub center: Coordinate,
    pub radius_m: u32,
    pub page_token: Option<String>,
}

type Responder = dyn Fn(Coordinate, u32, usize) -> Result<Vec<Place>> + Send + Sync;

/// In-memory place source driven by a closure.
///
/// The responder receives the tile center, the query radius and the number
/// of calls made so far (including this one), and returns the full result
/// set for the tile; the source splits it into pages of [`PAGE_SIZE`].
pub struct ScriptedSource {
    center: Coordinate,
    responder: Box<Responder>,
    stall: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    geocode_calls: Mutex<usize>,
}

impl ScriptedSource {
    pub fn new(
        responder: impl Fn(Coordinate, u32, usize) -> Result<Vec<Place>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            center: SAN_MATEO,
            responder: Box::new(responder),
            stall: None,
            calls: Mutex::new(Vec::new()),
            geocode_calls: Mutex::new(0),
        }
    }

    /// Make every page request hang for `stall` before answering.
    pub fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// First-page calls only, i.e. one per tile query attempt.
    pub fn tile_queries(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.page_token.is_none())
            .collect()
    }

    pub fn geocode_calls(&self) -> usize {
        *self.geocode_calls.lock().unwrap()
    }
}

#[async_trait]
impl PlaceSource for ScriptedSource {
    async fn geocode(&self, _area_code: &str) -> Result<Coordinate> {
        *self.geocode_calls.lock().unwrap() += 1;
        Ok(self.center)
    }

    async fn fetch_page(
        &self,
        center: Coordinate,
        radius_m: u32,
        page_token: Option<&str>,
    ) -> Result<PlacePage> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                center,
                radius_m,
                page_token: page_token.map(str::to_string),
            });
            calls.len()
        };

        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }

        let all = (self.responder)(center, radius_m, count)?;
        let page: usize = page_token
            .map(|t| t.trim_start_matches("page-").parse().unwrap())
            .unwrap_or(0);
        let places: Vec<Place> = all.into_iter().skip(page * PAGE_SIZE).take(PAGE_SIZE + 1).collect();
        let has_more = places.len() > PAGE_SIZE;

        Ok(PlacePage {
            places: places.into_iter().take(PAGE_SIZE).collect(),
            next_page_token: has_more.then(|| format!("page-{}", page + 1)),
        })
    }
}

/// `n` distinct places belonging to the tile at `center`.
pub fn places_at(center: Coordinate, n: usize) -> Vec<Place> {
    (0..n)
        .map(|i| Place::new(format!("{center}#{i}"), format!("Place {i} near {center}"), center))
        .collect()
}

/// A transient provider failure.
pub fn over_query_limit() -> AppError {
    AppError::provider("OVER_QUERY_LIMIT", "You have exceeded your rate-limit", true)
}

/// Crawler settings with no pacing or backoff delays.
pub fn fast_config() -> CrawlerConfig {
    CrawlerConfig {
        request_delay_ms: 0,
        retry_base_delay_ms: 0,
        retry_max_delay_ms: 0,
        ..CrawlerConfig::default()
    }
}

/// Tile containing `coord` at `level`.
pub fn tile_at(coord: Coordinate, level: u8) -> Tile {
    Tile::new(cell_at(coord, Resolution::new(level).unwrap()).unwrap())
}

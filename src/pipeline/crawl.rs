// src/pipeline/crawl.rs

//! Recursive area-covering crawl.
//!
//! The area around a center is tiled into hexagons; every unvisited tile is
//! queried once, draining all result pages. A tile whose query comes back
//! with the provider's cap is assumed truncated and is re-tiled one
//! resolution finer before the crawl moves on to the next sibling.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::grid::{Resolution, Tile, tile_centers};
use crate::models::{Coordinate, CrawlerConfig, Place};
use crate::services::{Permit, PlaceSource, RateLimiter, RetryPolicy};
use crate::storage::{CrawlState, Merge};

/// How a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Every tile was visited or recorded as failed
    Completed,
    /// Cancellation was requested before the traversal finished
    Interrupted,
}

/// A tile given up on after its retries ran out.
#[derive(Debug, Clone)]
pub struct FailedTile {
    pub center: Coordinate,
    pub resolution: u8,
    pub error: String,
}

/// Counters for a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub tiles_queried: usize,
    pub tiles_skipped: usize,
    pub tiles_saturated: usize,
    pub pages_fetched: usize,
    pub places_added: usize,
    pub duplicates: usize,
    pub finest_resolution: Option<u8>,
    pub failed: Vec<FailedTile>,
    pub interrupted: bool,
}

impl Default for CrawlReport {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            tiles_queried: 0,
            tiles_skipped: 0,
            tiles_saturated: 0,
            pages_fetched: 0,
            places_added: 0,
            duplicates: 0,
            finest_resolution: None,
            failed: Vec::new(),
            interrupted: false,
        }
    }
}

impl CrawlReport {
    fn reach(&mut self, resolution: Resolution) {
        let level = resolution.level();
        self.finest_resolution = Some(self.finest_resolution.map_or(level, |l| l.max(level)));
    }

    /// Log the run summary.
    pub fn log_summary(&self) {
        let elapsed = self
            .end_time
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.start_time);
        log::info!("[SUMMARY] Crawl results");
        log::info!("    Tiles queried: {}", self.tiles_queried);
        log::info!("    Tiles skipped (already visited): {}", self.tiles_skipped);
        log::info!("    Tiles saturated: {}", self.tiles_saturated);
        log::info!("    Tiles failed: {}", self.failed.len());
        log::info!("    Pages fetched: {}", self.pages_fetched);
        log::info!("    New places: {}", self.places_added);
        log::info!("    Duplicate places: {}", self.duplicates);
        if let Some(level) = self.finest_resolution {
            log::info!("    Finest resolution reached: {}", level);
        }
        log::info!("    Elapsed: {}s", elapsed.num_seconds());
        for tile in &self.failed {
            log::warn!(
                "    Failed tile {} @ resolution {}: {}",
                tile.center,
                tile.resolution,
                tile.error
            );
        }
    }
}

/// Result of draining one tile.
enum Fetched {
    Complete(Vec<Place>),
    Interrupted,
}

/// Walks an area tile by tile against one place source.
///
/// Owns everything the traversal needs besides the crawl state itself: the
/// source, the shared rate limiter, the retry policy and the cancellation
/// token.
pub struct AreaCrawler {
    source: Arc<dyn PlaceSource>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    call_timeout: Duration,
    saturation_threshold: usize,
    cancel: CancellationToken,
}

impl AreaCrawler {
    /// Create a crawler with pacing, retry and saturation settings from `config`.
    pub fn new(source: Arc<dyn PlaceSource>, config: &CrawlerConfig, cancel: CancellationToken) -> Self {
        Self {
            source,
            limiter: Arc::new(RateLimiter::new(config.request_delay())),
            retry: RetryPolicy::from(config),
            call_timeout: config.timeout(),
            saturation_threshold: config.saturation_threshold.max(1),
            cancel,
        }
    }

    /// Resolve an area code, retrying transient failures.
    ///
    /// Exhausted retries are reported as a geocoding failure, which ends the run.
    pub async fn geocode(&self, area_code: &str) -> Result<Option<Coordinate>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = {
                let Some(_permit) = self.acquire().await else {
                    return Ok(None);
                };
                self.with_timeout(self.source.geocode(area_code)).await
            };

            match result {
                Ok(center) => {
                    log::info!("Geocoded {} to {}", area_code, center);
                    return Ok(Some(center));
                }
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    log::warn!("Geocoding {} failed (attempt {}): {}", area_code, attempt, e);
                    if !self.backoff(attempt).await {
                        return Ok(None);
                    }
                }
                Err(e @ (AppError::Geocode { .. } | AppError::Config(_))) => return Err(e),
                Err(e) => return Err(AppError::geocode(area_code, e)),
            }
        }
    }

    /// Cover `radius_m` around `center` at `resolution`, refining saturated tiles.
    ///
    /// Tiles already in `state.visited` are skipped. Each tile is queried
    /// with a radius of one hexagon edge, independent of `radius_m`, which
    /// only controls how many tiles are generated.
    pub fn search_area<'a>(
        &'a self,
        center: Coordinate,
        resolution: Resolution,
        radius_m: f64,
        state: &'a mut CrawlState,
        report: &'a mut CrawlReport,
    ) -> BoxFuture<'a, Result<Traversal>> {
        async move {
            log::info!("Searching radius... {} r={}m resolution {}", center, radius_m, resolution);
            report.reach(resolution);

            let hex_radius = resolution.hex_radius_m();
            let tiles = tile_centers(center, radius_m, resolution)?;
            let total = tiles.len();

            for (i, tile) in tiles.into_iter().enumerate() {
                if self.cancel.is_cancelled() {
                    return Ok(Traversal::Interrupted);
                }

                log::info!("{}/{} @ {} (resolution {})", i + 1, total, tile.center, resolution);
                if state.visited.contains(tile.cell) {
                    log::debug!("  - skipping {}", tile.cell);
                    report.tiles_skipped += 1;
                    continue;
                }

                let places = match self.fetch_tile(&tile, hex_radius, report).await {
                    Ok(Fetched::Complete(places)) => places,
                    Ok(Fetched::Interrupted) => return Ok(Traversal::Interrupted),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        log::warn!(
                            "Giving up on tile {} @ resolution {}: {}",
                            tile.center,
                            resolution,
                            e
                        );
                        report.failed.push(FailedTile {
                            center: tile.center,
                            resolution: resolution.level(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };
                report.tiles_queried += 1;

                let found = places.len();
                log::info!(
                    "Found a total of {} places at {} radius={}m",
                    found,
                    tile.center,
                    hex_radius
                );
                Self::merge_places(places, state, report);

                if found >= self.saturation_threshold {
                    report.tiles_saturated += 1;
                    let finer = resolution.finer().ok_or(AppError::TooDense {
                        center: tile.center,
                        resolution: resolution.level(),
                    })?;
                    log::warn!(
                        "Found maximum number of places, recursing into {} radius={}m at resolution {}",
                        tile.center,
                        hex_radius,
                        finer
                    );
                    let failed_before = report.failed.len();
                    let refined = self
                        .search_area(tile.center, finer, f64::from(hex_radius), state, report)
                        .await?;
                    if refined == Traversal::Interrupted {
                        return Ok(Traversal::Interrupted);
                    }
                    // a failed child is only reachable through its parent
                    if report.failed.len() > failed_before {
                        log::warn!(
                            "Leaving {} @ resolution {} unvisited: {} refined tile(s) failed",
                            tile.center,
                            resolution,
                            report.failed.len() - failed_before
                        );
                        continue;
                    }
                }

                state.visited.insert(tile.cell);
            }

            Ok(Traversal::Completed)
        }
        .boxed()
    }

    fn merge_places(places: Vec<Place>, state: &mut CrawlState, report: &mut CrawlReport) {
        for place in places {
            let (id, name) = (place.id.clone(), place.name.clone());
            let vicinity = place.vicinity.clone().unwrap_or_default();
            let location = place.location;
            match state.places.merge(place) {
                Merge::Added => {
                    log::debug!("{:<30} {:<40} {}", name, vicinity, location);
                    report.places_added += 1;
                }
                Merge::Duplicate => {
                    log::debug!("Skipping duplicate {:<30} {:<40} ({})", name, vicinity, id);
                    report.duplicates += 1;
                }
            }
        }
    }

    /// Drain every page for one tile, retrying the whole tile on transient errors.
    async fn fetch_tile(
        &self,
        tile: &Tile,
        radius_m: u32,
        report: &mut CrawlReport,
    ) -> Result<Fetched> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.drain_pages(tile.center, radius_m, report).await {
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    log::warn!(
                        "Tile {} @ resolution {} failed (attempt {}/{}): {}",
                        tile.center,
                        tile.level(),
                        attempt,
                        self.retry.max_attempts,
                        e
                    );
                    if !self.backoff(attempt).await {
                        return Ok(Fetched::Interrupted);
                    }
                }
                Err(e) => {
                    return Err(if e.is_fatal() {
                        e
                    } else {
                        AppError::crawl(
                            format!("tile {} @ resolution {}", tile.center, tile.level()),
                            e,
                        )
                    });
                }
                other => return other,
            }
        }
    }

    async fn drain_pages(
        &self,
        center: Coordinate,
        radius_m: u32,
        report: &mut CrawlReport,
    ) -> Result<Fetched> {
        let mut places = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = {
                let Some(_permit) = self.acquire().await else {
                    return Ok(Fetched::Interrupted);
                };
                self.with_timeout(self.source.fetch_page(center, radius_m, token.as_deref()))
                    .await?
            };
            report.pages_fetched += 1;
            places.extend(page.places);

            match page.next_page_token {
                Some(next) => {
                    log::debug!("Next page token for {}: {}", center, next);
                    token = Some(next);
                }
                None => return Ok(Fetched::Complete(places)),
            }
        }
    }

    /// Wait for the rate limiter unless cancellation comes first.
    async fn acquire(&self) -> Option<Permit<'_>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            permit = self.limiter.acquire() => Some(permit),
            _ = self.cancel.cancelled() => None,
        }
    }

    /// Sleep before retry number `attempt`; false if cancelled meanwhile.
    async fn backoff(&self, attempt: u32) -> bool {
        let delay = self.retry.delay_after(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    async fn with_timeout<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| AppError::Timeout {
                secs: self.call_timeout.as_secs(),
            })?
    }
}

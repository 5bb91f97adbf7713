// src/pipeline/run.rs

//! Crawl run: load snapshots, geocode, traverse, always flush.

use chrono::Utc;

use crate::error::Result;
use crate::grid::Resolution;
use crate::pipeline::crawl::{AreaCrawler, CrawlReport, Traversal};
use crate::storage::{CrawlState, SnapshotStore};

/// What to crawl.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Postal or administrative code to geocode
    pub area_code: String,
    /// Radius around the geocoded center to tile, in meters
    pub radius_m: u32,
    /// Starting resolution
    pub resolution: Resolution,
}

/// Run one crawl from the saved state to a flushed snapshot.
///
/// The snapshot is flushed whether the traversal completes, is interrupted
/// or fails. A traversal error takes precedence over a flush error; both are
/// logged.
pub async fn run_crawler(
    crawler: &AreaCrawler,
    store: &dyn SnapshotStore,
    request: &CrawlRequest,
) -> Result<CrawlReport> {
    let mut state = store.load().await?;
    let mut report = CrawlReport::default();

    log::info!(
        "Crawling {} with radius {}m from resolution {}",
        request.area_code,
        request.radius_m,
        request.resolution
    );

    let traversal = traverse(crawler, request, &mut state, &mut report).await;
    report.end_time = Some(Utc::now());

    match &traversal {
        Ok(Traversal::Interrupted) => {
            log::warn!("Interrupt detected, flushing storage.");
            report.interrupted = true;
        }
        Ok(Traversal::Completed) => {}
        Err(e) => log::error!("Crawl aborted: {}. Flushing storage before exit.", e),
    }

    let flushed = store.flush(&state).await;
    report.log_summary();

    match flushed {
        Ok(summary) => {
            log::info!(
                "Saved {} places to {}",
                summary.place_count,
                summary.places_location
            );
            log::info!(
                "Saved {} visited cells to {}",
                summary.visited_count,
                summary.visited_location
            );
        }
        Err(e) => {
            log::error!("Flush failed: {}", e);
            traversal?;
            return Err(e);
        }
    }

    traversal?;
    Ok(report)
}

async fn traverse(
    crawler: &AreaCrawler,
    request: &CrawlRequest,
    state: &mut CrawlState,
    report: &mut CrawlReport,
) -> Result<Traversal> {
    let Some(center) = crawler.geocode(&request.area_code).await? else {
        return Ok(Traversal::Interrupted);
    };
    crawler
        .search_area(
            center,
            request.resolution,
            f64::from(request.radius_m),
            state,
            report,
        )
        .await
}

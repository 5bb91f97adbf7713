//! Pipeline entry points for crawler operations.
//!
//! - `AreaCrawler::search_area`: recursive hexagonal traversal of an area
//! - `run_crawler`: load state, geocode, traverse and flush

pub mod crawl;
pub mod run;

pub use crawl::{AreaCrawler, CrawlReport, FailedTile, Traversal};
pub use run::{CrawlRequest, run_crawler};

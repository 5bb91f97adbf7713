//! hexcrawl CLI
//!
//! Crawls the places around a postal code by tiling it into hexagons.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hexcrawl::{
    error::Result,
    grid::Resolution,
    models::Config,
    pipeline::{self, AreaCrawler, CrawlRequest},
    services::GooglePlacesSource,
    storage::{LocalStorage, SnapshotKey},
    utils::{http, validate_area_code},
};
use tokio_util::sync::CancellationToken;

/// hexcrawl - adaptive hexagonal place crawler
#[derive(Parser, Debug)]
#[command(name = "hexcrawl", version, about = "Crawl every place around an area code")]
struct Cli {
    /// Postal or administrative code to crawl around
    area_code: String,

    /// Radius in meters to start with
    #[arg(short, long, default_value_t = 1000)]
    radius: u32,

    /// Resolution to start with; use a higher one for denser areas
    #[arg(long, default_value_t = 8)]
    resolution: u8,

    /// Path to the configuration file
    #[arg(short, long, default_value = "hexcrawl.toml")]
    config: PathBuf,

    /// Directory for the snapshot files (overrides storage.data_dir)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Place type to search for (overrides provider.place_type)
    #[arg(long)]
    place_type: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on the first Ctrl-C.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Keyboard interrupt detected, finishing the current request...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    if let Some(dir) = cli.storage_dir {
        config.storage.data_dir = dir;
    }
    if let Some(place_type) = cli.place_type {
        config.provider.place_type = place_type;
    }
    config.validate()?;
    config.crawler.check_radius(cli.radius)?;

    let api_key = config.provider.api_key()?;
    let area_code = validate_area_code(&cli.area_code)?.to_string();
    let resolution = Resolution::new(cli.resolution)?;

    log::info!("hexcrawl starting...");

    let client = http::create_async_client(&config.provider, &config.crawler)?;
    let source = GooglePlacesSource::new(client, &config.provider, api_key)?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let crawler = AreaCrawler::new(Arc::new(source), &config.crawler, cancel);
    let storage = LocalStorage::new(
        &config.storage.data_dir,
        SnapshotKey::new(&area_code, resolution, cli.radius),
    );
    let request = CrawlRequest {
        area_code,
        radius_m: cli.radius,
        resolution,
    };

    let report = pipeline::run_crawler(&crawler, &storage, &request).await?;

    if report.interrupted {
        log::info!("Interrupted; rerun the same command to resume.");
    } else {
        log::info!("Crawl complete!");
    }

    Ok(())
}

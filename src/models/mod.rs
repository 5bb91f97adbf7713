// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod coordinate;
mod place;

// Re-export all public types
pub use config::{Config, CrawlerConfig, ProviderConfig, StorageConfig};
pub use coordinate::Coordinate;
pub use place::Place;

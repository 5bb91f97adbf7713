//! Service layer for the crawler application.
//!
//! This module contains:
//! - The place source contract (`PlaceSource`) and its Google implementation
//! - Provider call pacing (`RateLimiter`)
//! - Retry backoff for transient provider failures (`RetryPolicy`)

mod google;
mod limiter;
mod retry;
mod source;

pub use google::GooglePlacesSource;
pub use limiter::{Permit, RateLimiter};
pub use retry::RetryPolicy;
pub use source::{PlacePage, PlaceSource};

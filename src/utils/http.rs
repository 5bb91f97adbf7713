// src/utils/http.rs

//! HTTP client utilities.

use reqwest::Client;

use crate::error::Result;
use crate::models::{CrawlerConfig, ProviderConfig};

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(provider: &ProviderConfig, crawler: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&provider.user_agent)
        .timeout(crawler.timeout())
        .build()?;
    Ok(client)
}

// src/utils/http.rs

//! HTTP client utilities.

use crate::error::Result;
use crate::models::FeedConfig;

/// Create a configured asynchronous HTTP client for the feed.
pub fn create_client(config: &FeedConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

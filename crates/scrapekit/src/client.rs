//! One-shot entry points
//!
//! Each call builds a default [`Pipeline`], retrieves a single address and
//! closes the browser session again. Long-running callers should keep a
//! [`Pipeline`] or [`Tool`](crate::Tool) instead so the session is reused.

use crate::error::ScrapeError;
use crate::pipeline::Pipeline;
use crate::types::{ContentRecord, ScrapeOptions};

/// Scrape a URL with default options
pub async fn scrape(url: &str) -> Result<ContentRecord, ScrapeError> {
    scrape_with_options(url, &ScrapeOptions::default()).await
}

/// Scrape a URL with custom options
pub async fn scrape_with_options(
    url: &str,
    options: &ScrapeOptions,
) -> Result<ContentRecord, ScrapeError> {
    let pipeline = Pipeline::with_defaults();
    let result = pipeline.fetch(url, options).await;
    pipeline.shutdown().await;
    result
}

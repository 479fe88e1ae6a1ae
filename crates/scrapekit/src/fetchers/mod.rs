//! Static (lightweight) document fetching
//!
//! Design: a [`Fetcher`] performs one request/response cycle without any
//! script execution. The pipeline owns one behind an `Arc<dyn Fetcher>` so
//! tests can substitute canned markup for the network.

mod http;

pub use http::HttpFetcher;

use crate::error::FetchError;
use crate::types::{FetchRequest, FetchedDocument};
use async_trait::async_trait;

/// Trait for the static retrieval tier
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &'static str;

    /// Fetch the raw document at `request.url`
    ///
    /// Fails on timeout, connection failure, transport error or a
    /// non-2xx status.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument, FetchError>;
}

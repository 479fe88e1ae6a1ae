//! Concurrent batch scraping
//!
//! Every address runs as its own unit of work that settles into a
//! [`BatchItem`]; failures never escape a unit, and the batch returns only
//! once all units have settled.

use crate::error::ScrapeError;
use crate::format::{render, OutputFormat};
use crate::headers::HeaderStore;
use crate::pipeline::Pipeline;
use crate::rules::RuleRegistry;
use crate::types::{BatchItem, ScrapeOptions};
use futures::future::join_all;
use tracing::{debug, warn};

/// Options shared by every item of a scrape
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Retrieval options; stored domain headers are merged underneath
    pub scrape: ScrapeOptions,
    /// Rule set applied after extraction
    pub rule_set: Option<String>,
    pub format: OutputFormat,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scrape(mut self, options: ScrapeOptions) -> Self {
        self.scrape = options;
        self
    }

    pub fn rule_set(mut self, name: impl Into<String>) -> Self {
        self.rule_set = Some(name.into());
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Everything a scrape needs, borrowed from its owner
#[derive(Clone, Copy)]
pub struct ScrapeContext<'a> {
    pub pipeline: &'a Pipeline,
    pub rules: &'a RuleRegistry,
    pub headers: &'a HeaderStore,
}

impl<'a> ScrapeContext<'a> {
    /// Retrieve, optionally apply a rule set, and format a single address
    pub async fn scrape(&self, url: &str, options: &BatchOptions) -> Result<String, ScrapeError> {
        let mut scrape = options.scrape.clone();
        scrape.headers = self.headers.merged(url, &options.scrape.headers);

        let record = self.pipeline.fetch(url, &scrape).await?;
        let record = match options.rule_set.as_deref() {
            Some(name) => self.rules.apply(name, &record)?,
            None => record,
        };
        Ok(render(&record, options.format))
    }

    /// Scrape every address concurrently, one entry per input in input order
    pub async fn run_batch(&self, urls: &[String], options: &BatchOptions) -> Vec<BatchItem> {
        debug!(count = urls.len(), "Starting batch");

        let units = urls.iter().map(|url| async move {
            match self.scrape(url, options).await {
                Ok(content) => BatchItem::success(url.as_str(), content),
                Err(e) => {
                    warn!(url = %url, error = %e, "Batch item failed");
                    BatchItem::failure(url.as_str(), e)
                }
            }
        });

        let items = join_all(units).await;
        debug!(
            succeeded = items.iter().filter(|item| item.success).count(),
            failed = items.iter().filter(|item| !item.success).count(),
            "Batch settled"
        );
        items
    }
}

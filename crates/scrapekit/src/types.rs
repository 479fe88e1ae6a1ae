//! Core types for ScrapeKit

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Which retrieval tier produced the markup of a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalTier {
    /// Plain HTTP GET, no script execution
    #[default]
    Static,
    /// Full browser render
    Rendered,
}

impl fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalTier::Static => write!(f, "static"),
            RetrievalTier::Rendered => write!(f, "rendered"),
        }
    }
}

/// Structured result of extracting a document
///
/// Records are created once per pipeline run and never mutated afterwards;
/// the rule engine derives a new record instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Origin URL or inline document address
    pub url: String,
    /// Best-effort page title
    pub title: String,
    /// Normalized primary text
    pub body_text: String,
    /// Markup that was parsed, kept so rules can re-parse it
    pub raw_markup: String,
    /// Absolute, deduplicated outbound links in document order
    pub links: Vec<String>,
    /// Absolute, deduplicated image references in document order
    pub images: Vec<String>,
    /// Page meta entries plus rule-engine keys
    pub metadata: Map<String, Value>,
    /// Extraction timestamp
    pub retrieved_at: DateTime<Utc>,
    /// Tier that produced `raw_markup`
    pub retrieved_via: RetrievalTier,
    /// Base64 PNG screenshot, when one was captured while rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// Per-request options for the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScrapeOptions {
    /// Skip the static fetch and render in a browser
    #[serde(default)]
    pub force_render: bool,

    /// Extra request headers (override stored domain headers)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Timeout in milliseconds for each retrieval tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// CSS selector to wait for after a browser navigation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_selector: Option<String>,

    /// Capture a full-page screenshot when rendering
    #[serde(default)]
    pub screenshot: bool,
}

impl ScrapeOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use the browser tier
    pub fn force_render(mut self) -> Self {
        self.force_render = true;
        self
    }

    /// Add a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the per-tier timeout
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Wait for a selector after navigation
    pub fn wait_selector(mut self, selector: impl Into<String>) -> Self {
        self.wait_selector = Some(selector.into());
        self
    }

    /// Capture a screenshot when rendering
    pub fn screenshot(mut self) -> Self {
        self.screenshot = true;
        self
    }
}

/// Input to a [`Fetcher`](crate::Fetcher)
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout_ms: u64,
}

/// Raw document returned by the static tier
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub markup: String,
    pub status_code: u16,
    pub content_type: Option<String>,
}

/// Input to a [`Renderer`](crate::Renderer)
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout_ms: u64,
    pub wait_selector: Option<String>,
    pub screenshot: bool,
}

/// Markup read from a rendered page
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub markup: String,
    /// PNG bytes, when requested
    pub screenshot: Option<Vec<u8>>,
}

/// Outcome of one address in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub url: String,
    pub success: bool,
    /// Formatted output for successful items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Error message for failed items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn success(url: impl Into<String>, content: String) -> Self {
        Self {
            url: url.into(),
            success: true,
            content: Some(content),
            error: None,
        }
    }

    pub fn failure(url: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            success: false,
            content: None,
            error: Some(error.to_string()),
        }
    }
}

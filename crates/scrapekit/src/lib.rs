//! ScrapeKit - adaptive web scraping library
//!
//! Retrieves a document with a plain HTTP GET when that is enough and
//! escalates to a headless browser when it is not, extracts a structured
//! [`ContentRecord`] from the markup, and optionally re-derives it with a
//! named set of CSS [rules](rules).
//!
//! ## Retrieval tiers
//!
//! The [`Pipeline`] composes two tiers behind traits:
//! - [`Fetcher`] - static tier, [`HttpFetcher`] by default
//! - [`Renderer`] - browser tier, [`ChromiumRenderer`] by default
//!
//! The browser tier is used when the caller forces it, for `data:` and
//! `file:` addresses, when the static markup asks for JavaScript, and when
//! the static fetch fails. The browser session is shared and stays open
//! until [`Pipeline::shutdown`] is called.
//!
//! ## Tools
//!
//! [`Tool`] bundles a pipeline with a [`RuleRegistry`] and a
//! [`HeaderStore`] and exposes them as JSON-argument tools
//! (`scrape_url`, `create_rule_set`, `set_domain_headers`, `batch_scrape`,
//! `list_rule_sets`, `get_rule_set`).

pub mod batch;
pub mod client;
pub mod config;
mod error;
pub mod extract;
pub mod fetchers;
pub mod format;
pub mod headers;
pub mod pipeline;
pub mod renderer;
pub mod rules;
mod tool;
mod types;

pub use batch::{BatchOptions, ScrapeContext};
pub use client::{scrape, scrape_with_options};
pub use config::{PipelineConfig, RendererConfig};
pub use error::{FetchError, RenderError, ScrapeError};
pub use extract::{normalize_text, ContentExtractor};
pub use fetchers::{Fetcher, HttpFetcher};
pub use format::OutputFormat;
pub use headers::{normalize_domain, HeaderStore};
pub use pipeline::{needs_rendering, Pipeline};
pub use renderer::{ChromiumRenderer, DisabledRenderer, Renderer};
pub use rules::{ExtractionRule, RuleRegistry, RuleSet};
pub use tool::{
    BatchScrapeRequest, CreateRuleSetRequest, GetRuleSetRequest, ListRuleSetsRequest, ScrapeArgs,
    ScrapeUrlRequest, SetDomainHeadersRequest, Tool, ToolBuilder, ToolDefinition, ToolOutput,
};
pub use types::{
    BatchItem, ContentRecord, FetchRequest, FetchedDocument, RenderRequest, RenderedDocument,
    RetrievalTier, ScrapeOptions,
};

/// User agent of the static tier
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// User agent applied to browser pages
pub const RENDER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Tool description for LLM consumption
pub const TOOL_DESCRIPTION: &str = r#"Scrapes web pages and extracts structured content.

- Plain HTTP first, headless browser when the page needs JavaScript
- Extracts title, main text, links, images and meta tags
- Custom CSS rule sets for site-specific extraction
- Concurrent batch scraping with per-page errors"#;

/// Extended documentation for LLM consumption (llmtxt)
pub const TOOL_LLMTXT: &str = r##"# ScrapeKit Tools

Scrapes web pages, escalating from a plain HTTP request to a headless
Chrome/Chromium browser when needed, and extracts structured content.

## Retrieval
- A plain HTTP GET is tried first.
- The browser is used instead when `force_render` is set, when the address
  is a `data:` or `file:` URL, when the page asks to enable JavaScript, or
  when the HTTP request fails.
- An error is returned only when both attempts fail; it names both causes.

## Tools

### scrape_url
- `url` (required): address to scrape
- `force_render` (optional): always use the browser
- `headers` (optional): request headers, override stored domain headers
- `timeout_ms` (optional): timeout per attempt (default 30000)
- `wait_selector` (optional): CSS selector to wait for after navigation
- `screenshot` (optional): capture a full-page PNG (browser only, base64 in JSON output)
- `rule_set` (optional): rule set applied after extraction
- `format` (optional): markdown (default), text, html or json

### create_rule_set
- `name` (required): rule set name, replaces an existing one
- `rules` (required): object with optional `title`, `content`, `links`,
  `images` selectors, an `exclude` selector list and a `custom` map of
  field name to selector
- `description` (optional)

A `links` or `images` selector replaces the whole list, even when it matches
nothing. A `custom` selector matching one element yields a string, several
elements a list, none omits the field. Results appear in the JSON output
under `metadata.customData`.

Built-in rule sets: blog, news, product, documentation, forum.

### set_domain_headers
- `domain` (required): domain or URL
- `headers` (required): headers sent with every request to the domain

### batch_scrape
- `urls` (required): addresses scraped concurrently
- Same options as scrape_url, applied to every address
- Returns a JSON list of `{url, success, content | error}` in input order

### list_rule_sets / get_rule_set
- List registered rule sets, or show one by `name`

## Examples

### Scrape a page as markdown
```json
{"url": "https://example.com"}
```

### Scrape a single-page app
```json
{"url": "https://app.example.com", "force_render": true, "wait_selector": "#root h1"}
```

### Product page with the built-in rule set
```json
{"url": "https://shop.example.com/item/1", "rule_set": "product", "format": "json"}
```

## Error Handling
- Missing required fields return `Error: Missing required parameter: <name>`
- Unknown rule sets and formats return an error instead of partial output
- In batch mode each failing page is reported in its own entry
"##;

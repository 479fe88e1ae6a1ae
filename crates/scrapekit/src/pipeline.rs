//! Retrieval strategy selection
//!
//! Design: try the cheap static tier first and escalate to the browser
//! when the caller forces it, when the address is an inline document, when
//! the static markup looks script-dependent, or when the static fetch
//! fails. A suspect static result is returned only when the escalated
//! render fails.

use crate::config::{PipelineConfig, RendererConfig};
use crate::error::{FetchError, ScrapeError};
use crate::extract::ContentExtractor;
use crate::fetchers::{Fetcher, HttpFetcher};
use crate::renderer::{ChromiumRenderer, Renderer};
use crate::types::{ContentRecord, FetchRequest, RenderRequest, RetrievalTier, ScrapeOptions};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// True when `markup` contains one of `phrases` (case-insensitive)
///
/// `phrases` must already be lower-case.
pub fn needs_rendering(markup: &str, phrases: &[String]) -> bool {
    let lower = markup.to_lowercase();
    phrases.iter().any(|phrase| lower.contains(phrase.as_str()))
}

/// True for addresses that carry their document inline or locally
pub fn is_inline_document(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("data:") || lower.starts_with("file:")
}

/// Two-tier retrieval pipeline
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    renderer: Arc<dyn Renderer>,
    extractor: ContentExtractor,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline from explicit tiers
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        renderer: Arc<dyn Renderer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            extractor: ContentExtractor::new(config.min_content_length),
            config,
        }
    }

    /// Create a pipeline with the HTTP fetcher and a Chromium renderer
    pub fn with_defaults() -> Self {
        Self::with_config(PipelineConfig::default(), RendererConfig::default())
    }

    /// Create a pipeline with the built-in tiers and custom settings
    pub fn with_config(config: PipelineConfig, renderer: RendererConfig) -> Self {
        Self::new(
            Arc::new(HttpFetcher::with_user_agent(config.user_agent.clone())),
            Arc::new(ChromiumRenderer::new(renderer)),
            config,
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Retrieve `url` and extract a content record
    ///
    /// Fails only when every attempted tier failed.
    pub async fn fetch(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<ContentRecord, ScrapeError> {
        if url.trim().is_empty() {
            return Err(ScrapeError::MissingParameter("url"));
        }

        if is_inline_document(url) {
            debug!(url, "Inline document, rendering");
            return self.fetch_rendered(url, options, None).await;
        }

        if options.force_render {
            debug!(url, "Rendering forced by caller");
            return self.fetch_rendered(url, options, None).await;
        }

        let request = FetchRequest {
            url: url.to_string(),
            headers: options.headers.clone(),
            timeout_ms: self.timeout_ms(options),
        };

        match self.fetcher.fetch(&request).await {
            Ok(document) => {
                if needs_rendering(&document.markup, &self.config.js_phrases) {
                    warn!(url, "Static markup looks script-dependent, escalating to browser");
                    match self.fetch_rendered(url, options, None).await {
                        Ok(record) => return Ok(record),
                        Err(e) => {
                            warn!(url, error = %e, "Escalated render failed, keeping static result");
                        }
                    }
                } else {
                    debug!(url, fetcher = self.fetcher.name(), "Using static result");
                }

                let mut record = self.extractor.extract(&document.markup, url);
                record
                    .metadata
                    .insert("httpStatus".to_string(), Value::from(document.status_code));
                if let Some(content_type) = document.content_type {
                    record
                        .metadata
                        .insert("contentType".to_string(), Value::String(content_type));
                }
                Ok(record)
            }
            Err(e) => {
                warn!(url, error = %e, "Static fetch failed, falling back to browser");
                self.fetch_rendered(url, options, Some(e)).await
            }
        }
    }

    /// Release the renderer's session
    pub async fn shutdown(&self) {
        if let Err(e) = self.renderer.shutdown().await {
            warn!(error = %e, "Renderer shutdown failed");
        }
    }

    async fn fetch_rendered(
        &self,
        url: &str,
        options: &ScrapeOptions,
        fetch_error: Option<FetchError>,
    ) -> Result<ContentRecord, ScrapeError> {
        let request = RenderRequest {
            url: url.to_string(),
            headers: options.headers.clone(),
            timeout_ms: self.timeout_ms(options),
            wait_selector: options.wait_selector.clone(),
            screenshot: options.screenshot,
        };

        let document = self
            .renderer
            .render(&request)
            .await
            .map_err(|render| ScrapeError::Retrieval {
                fetch: fetch_error,
                render,
            })?;

        debug!(url, renderer = self.renderer.name(), "Using rendered result");
        let mut record = self.extractor.extract(&document.markup, url);
        record.retrieved_via = RetrievalTier::Rendered;
        record.screenshot = document.screenshot.map(|png| BASE64.encode(png));
        Ok(record)
    }

    fn timeout_ms(&self, options: &ScrapeOptions) -> u64 {
        options.timeout_ms.unwrap_or(self.config.default_timeout_ms)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FixedRenderer, StaticPages};
    use super::*;
    use std::sync::atomic::Ordering;

    const STATIC_PAGE: &str = "<html><head><title>Static Marker</title></head><body><p>Plain page</p></body></html>";
    const JS_PAGE: &str = "<html><head><title>Static Marker</title></head><body><noscript>Please Enable JavaScript to continue.</noscript><div id=\"root\"></div></body></html>";
    const RENDERED_PAGE: &str = "<html><head><title>Rendered Marker</title></head><body><p>Hydrated</p></body></html>";

    fn pipeline(fetcher: Arc<StaticPages>, renderer: Arc<FixedRenderer>) -> Pipeline {
        Pipeline::new(fetcher, renderer, PipelineConfig::default())
    }

    #[test]
    fn test_needs_rendering() {
        let phrases = PipelineConfig::default().js_phrases;
        assert!(needs_rendering(JS_PAGE, &phrases));
        assert!(needs_rendering("<p>JAVASCRIPT IS REQUIRED</p>", &phrases));
        assert!(!needs_rendering(STATIC_PAGE, &phrases));
        assert!(!needs_rendering("", &phrases));
    }

    #[test]
    fn test_is_inline_document() {
        assert!(is_inline_document("data:text/html,<h1>x</h1>"));
        assert!(is_inline_document("DATA:text/html;base64,PGgxPg=="));
        assert!(is_inline_document("file:///tmp/page.html"));
        assert!(!is_inline_document("https://example.com"));
    }

    #[tokio::test]
    async fn test_static_result_used_for_plain_page() {
        let fetcher = Arc::new(StaticPages::default().with("https://a.test/", STATIC_PAGE));
        let renderer = Arc::new(FixedRenderer::returning(RENDERED_PAGE));
        let p = pipeline(fetcher.clone(), renderer.clone());

        let record = p.fetch("https://a.test/", &ScrapeOptions::new()).await.unwrap();
        assert_eq!(record.title, "Static Marker");
        assert_eq!(record.retrieved_via, RetrievalTier::Static);
        assert_eq!(record.metadata["httpStatus"], 200);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_js_dependent_page_escalates() {
        let fetcher = Arc::new(StaticPages::default().with("https://a.test/", JS_PAGE));
        let renderer = Arc::new(FixedRenderer::returning(RENDERED_PAGE));
        let p = pipeline(fetcher.clone(), renderer.clone());

        let record = p.fetch("https://a.test/", &ScrapeOptions::new()).await.unwrap();
        assert_eq!(record.title, "Rendered Marker");
        assert_eq!(record.retrieved_via, RetrievalTier::Rendered);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_js_page_keeps_static_result_when_render_fails() {
        let fetcher = Arc::new(StaticPages::default().with("https://a.test/", JS_PAGE));
        let renderer = Arc::new(FixedRenderer::failing());
        let p = pipeline(fetcher.clone(), renderer.clone());

        let record = p.fetch("https://a.test/", &ScrapeOptions::new()).await.unwrap();
        assert_eq!(record.title, "Static Marker");
        assert_eq!(record.retrieved_via, RetrievalTier::Static);
        assert_eq!(record.metadata["httpStatus"], 200);
        assert_eq!(record.metadata["contentType"], "text/html");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_render_skips_fetch() {
        let fetcher = Arc::new(StaticPages::default().with("https://a.test/", STATIC_PAGE));
        let renderer = Arc::new(FixedRenderer::returning(RENDERED_PAGE));
        let p = pipeline(fetcher.clone(), renderer.clone());

        let record = p
            .fetch("https://a.test/", &ScrapeOptions::new().force_render())
            .await
            .unwrap();
        assert_eq!(record.title, "Rendered Marker");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_inline_document_skips_fetch() {
        let fetcher = Arc::new(StaticPages::default());
        let renderer = Arc::new(FixedRenderer::returning(RENDERED_PAGE));
        let p = pipeline(fetcher.clone(), renderer.clone());

        let record = p
            .fetch("data:text/html,<h1>Inline</h1>", &ScrapeOptions::new())
            .await
            .unwrap();
        assert_eq!(record.retrieved_via, RetrievalTier::Rendered);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_render() {
        let fetcher = Arc::new(StaticPages::default());
        let renderer = Arc::new(FixedRenderer::returning(RENDERED_PAGE));
        let p = pipeline(fetcher.clone(), renderer.clone());

        let record = p.fetch("https://down.test/", &ScrapeOptions::new()).await.unwrap();
        assert_eq!(record.title, "Rendered Marker");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_tiers_failing_reports_both() {
        let fetcher = Arc::new(StaticPages::default());
        let renderer = Arc::new(FixedRenderer::failing());
        let p = pipeline(fetcher, renderer);

        let err = p
            .fetch("https://down.test/", &ScrapeOptions::new().timeout_ms(1234))
            .await
            .unwrap_err();
        match &err {
            ScrapeError::Retrieval { fetch, .. } => assert!(fetch.is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("HTTP status 404"));
        assert!(message.contains("Navigation timed out after 1234ms"));
    }

    #[tokio::test]
    async fn test_forced_render_failure_has_no_fetch_error() {
        let p = pipeline(
            Arc::new(StaticPages::default()),
            Arc::new(FixedRenderer::failing()),
        );
        let err = p
            .fetch("https://a.test/", &ScrapeOptions::new().force_render())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Retrieval { fetch: None, .. }));
    }

    #[tokio::test]
    async fn test_screenshot_encoded() {
        let p = pipeline(
            Arc::new(StaticPages::default()),
            Arc::new(FixedRenderer::returning(RENDERED_PAGE)),
        );
        let record = p
            .fetch("https://a.test/", &ScrapeOptions::new().force_render().screenshot())
            .await
            .unwrap();
        assert_eq!(record.screenshot.as_deref(), Some("iVBORw=="));
    }

    #[tokio::test]
    async fn test_headers_passed_to_fetcher() {
        let fetcher = Arc::new(StaticPages::default().with("https://a.test/", STATIC_PAGE));
        let p = pipeline(fetcher.clone(), Arc::new(FixedRenderer::failing()));

        p.fetch("https://a.test/", &ScrapeOptions::new().header("Cookie", "id=7"))
            .await
            .unwrap();
        let seen = fetcher.seen_headers.lock().unwrap();
        assert_eq!(seen[0].get("Cookie"), Some(&"id=7".to_string()));
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let p = pipeline(
            Arc::new(StaticPages::default()),
            Arc::new(FixedRenderer::failing()),
        );
        let err = p.fetch("  ", &ScrapeOptions::new()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::MissingParameter("url")));
    }

    #[tokio::test]
    async fn test_shutdown_delegates_to_renderer() {
        let renderer = Arc::new(FixedRenderer::failing());
        let p = pipeline(Arc::new(StaticPages::default()), renderer.clone());
        p.shutdown().await;
        assert_eq!(renderer.shutdowns.load(Ordering::SeqCst), 1);
    }
}

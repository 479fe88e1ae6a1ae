//! Integration tests for ScrapeKit using wiremock

use async_trait::async_trait;
use scrapekit::rules::apply_rule;
use scrapekit::{
    extract::extract, scrape, BatchOptions, DisabledRenderer, ExtractionRule, FetchError,
    FetchRequest, Fetcher, HttpFetcher, OutputFormat, Pipeline, PipelineConfig, RenderError,
    RenderRequest, RenderedDocument, Renderer, RetrievalTier, ScrapeError, ScrapeOptions, Tool,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Static Article</title>
    <meta name="description" content="An article served as plain HTML">
</head>
<body>
    <nav><a href="/home">Home</a></nav>
    <article>
        <h1>Static Article</h1>
        <p>This article is served as plain HTML and needs no script to read.
        It is long enough to be picked as the main content container.</p>
        <img src="/img/cover.png">
    </article>
    <footer>Footer text</footer>
</body>
</html>"#;

const SPA_SHELL: &str = r#"<!DOCTYPE html>
<html>
<head><title>App Shell</title></head>
<body>
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>
</body>
</html>"#;

const HYDRATED: &str = r#"<html><head><title>Rendered Marker</title></head>
<body><div id="root"><p>Hydrated content</p></div></body></html>"#;

/// Browser stand-in that serves fixed markup and counts calls
struct MarkerRenderer {
    calls: AtomicUsize,
}

impl MarkerRenderer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Renderer for MarkerRenderer {
    fn name(&self) -> &'static str {
        "marker"
    }

    async fn render(&self, _request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RenderedDocument {
            markup: HYDRATED.to_string(),
            screenshot: None,
        })
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        Ok(())
    }
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fetch_request(url: String) -> FetchRequest {
    FetchRequest {
        url,
        headers: HashMap::new(),
        timeout_ms: 5_000,
    }
}

#[tokio::test]
async fn test_http_fetcher_get() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/article", 200, ARTICLE).await;

    let doc = HttpFetcher::new()
        .fetch(&fetch_request(format!("{}/article", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(doc.status_code, 200);
    assert_eq!(doc.content_type, Some("text/html".to_string()));
    assert!(doc.markup.contains("Static Article"));
}

#[tokio::test]
async fn test_http_fetcher_caller_user_agent_wins() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "CustomBot/2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut request = fetch_request(format!("{}/", mock_server.uri()));
    request
        .headers
        .insert("User-Agent".to_string(), "CustomBot/2.0".to_string());

    let doc = HttpFetcher::new().fetch(&request).await.unwrap();
    assert_eq!(doc.markup, "ok");
}

#[tokio::test]
async fn test_http_fetcher_non_text_payload_is_stringified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"slides": 3}"#, "application/json"),
        )
        .mount(&mock_server)
        .await;

    let doc = HttpFetcher::new()
        .fetch(&fetch_request(format!("{}/data.json", mock_server.uri())))
        .await
        .unwrap();
    assert_eq!(doc.markup, r#"{"slides": 3}"#);
    assert_eq!(doc.content_type, Some("application/json".to_string()));
}

#[tokio::test]
async fn test_http_fetcher_error_status() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/missing", 404, "not here").await;

    let result = HttpFetcher::new()
        .fetch(&fetch_request(format!("{}/missing", mock_server.uri())))
        .await;
    assert!(matches!(result, Err(FetchError::HttpStatus(404))));
}

#[tokio::test]
async fn test_http_fetcher_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut request = fetch_request(format!("{}/slow", mock_server.uri()));
    request.timeout_ms = 200;

    let result = HttpFetcher::new().fetch(&request).await;
    assert!(matches!(result, Err(FetchError::Timeout(200))));
}

#[tokio::test]
async fn test_pipeline_uses_static_page() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/article", 200, ARTICLE).await;

    let renderer = MarkerRenderer::new();
    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new()),
        renderer.clone(),
        PipelineConfig::default(),
    );

    let url = format!("{}/article", mock_server.uri());
    let record = pipeline.fetch(&url, &ScrapeOptions::new()).await.unwrap();

    assert_eq!(record.retrieved_via, RetrievalTier::Static);
    assert_eq!(record.title, "Static Article");
    assert!(record.body_text.contains("needs no script"));
    assert!(!record.body_text.contains("Footer text"));
    assert!(!record.body_text.contains("Home"));
    assert_eq!(
        record.images,
        vec![format!("{}/img/cover.png", mock_server.uri())]
    );
    assert_eq!(
        record.metadata["description"],
        "An article served as plain HTML"
    );
    assert_eq!(record.metadata["httpStatus"], 200);
    assert_eq!(record.metadata["contentType"], "text/html");
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pipeline_escalates_script_dependent_page() {
    init_tracing();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/app", 200, SPA_SHELL).await;

    let renderer = MarkerRenderer::new();
    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new()),
        renderer.clone(),
        PipelineConfig::default(),
    );

    let record = pipeline
        .fetch(&format!("{}/app", mock_server.uri()), &ScrapeOptions::new())
        .await
        .unwrap();

    assert_eq!(record.title, "Rendered Marker");
    assert_eq!(record.retrieved_via, RetrievalTier::Rendered);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pipeline_without_browser_keeps_script_dependent_page() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/app", 200, SPA_SHELL).await;

    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new()),
        Arc::new(DisabledRenderer),
        PipelineConfig::default(),
    );

    let record = pipeline
        .fetch(&format!("{}/app", mock_server.uri()), &ScrapeOptions::new())
        .await
        .unwrap();

    assert_eq!(record.title, "App Shell");
    assert_eq!(record.retrieved_via, RetrievalTier::Static);
    assert_eq!(record.metadata["httpStatus"], 200);
}

#[tokio::test]
async fn test_pipeline_custom_phrases() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/app", 200, SPA_SHELL).await;

    // Without the default phrases the shell is accepted as-is
    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new()),
        MarkerRenderer::new(),
        PipelineConfig::default().js_phrases(["Loading spinner"]),
    );

    let record = pipeline
        .fetch(&format!("{}/app", mock_server.uri()), &ScrapeOptions::new())
        .await
        .unwrap();
    assert_eq!(record.title, "App Shell");
}

#[tokio::test]
async fn test_pipeline_falls_back_on_server_error() {
    init_tracing();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/broken", 500, "boom").await;

    let renderer = MarkerRenderer::new();
    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new()),
        renderer.clone(),
        PipelineConfig::default(),
    );

    let record = pipeline
        .fetch(&format!("{}/broken", mock_server.uri()), &ScrapeOptions::new())
        .await
        .unwrap();
    assert_eq!(record.title, "Rendered Marker");
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pipeline_reports_both_failures() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/broken", 500, "boom").await;

    let pipeline = Pipeline::new(
        Arc::new(HttpFetcher::new()),
        Arc::new(DisabledRenderer),
        PipelineConfig::default(),
    );

    let err = pipeline
        .fetch(&format!("{}/broken", mock_server.uri()), &ScrapeOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScrapeError::Retrieval {
            fetch: Some(FetchError::HttpStatus(500)),
            ..
        }
    ));
    let message = err.to_string();
    assert!(message.contains("HTTP status 500"));
    assert!(message.contains("browser rendering is disabled"));
}

#[tokio::test]
async fn test_one_shot_scrape() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/article", 200, ARTICLE).await;

    let record = scrape(&format!("{}/article", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(record.title, "Static Article");
}

#[tokio::test]
async fn test_tool_batch_keeps_input_order() {
    init_tracing();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/a", 200, ARTICLE).await;
    serve(&mock_server, "/b", 404, "gone").await;
    serve(&mock_server, "/c", 200, ARTICLE).await;

    let tool = Tool::builder().disable_browser().build();
    let urls: Vec<String> = ["/a", "/b", "/c"]
        .iter()
        .map(|p| format!("{}{}", mock_server.uri(), p))
        .collect();

    let items = tool
        .batch(&urls, &BatchOptions::new().format(OutputFormat::Text))
        .await;

    assert_eq!(items.len(), 3);
    for (item, url) in items.iter().zip(&urls) {
        assert_eq!(&item.url, url);
    }
    assert!(items[0].success);
    assert!(!items[1].success);
    assert!(items[1].error.as_deref().unwrap().contains("HTTP status 404"));
    assert!(items[2].success);
    assert!(items[2]
        .content
        .as_deref()
        .unwrap()
        .starts_with("Static Article"));
}

#[tokio::test]
async fn test_tool_domain_headers_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("x-api-key", "k-123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tool = Tool::builder().disable_browser().build();
    let out = tool
        .call(
            "set_domain_headers",
            json!({"domain": mock_server.uri(), "headers": {"X-Api-Key": "k-123"}}),
        )
        .await;
    assert!(!out.is_error, "{}", out.text);

    let out = tool
        .call(
            "scrape_url",
            json!({"url": format!("{}/private", mock_server.uri()), "format": "text"}),
        )
        .await;
    assert!(!out.is_error, "{}", out.text);
    assert!(out.text.starts_with("Static Article"));
}

#[tokio::test]
async fn test_tool_rule_set_round_trip() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/article", 200, ARTICLE).await;

    let tool = Tool::builder().disable_browser().build();
    let out = tool
        .call(
            "create_rule_set",
            json!({
                "name": "headline-only",
                "rules": {"content": "article h1", "links": ".does-not-exist"},
                "description": "Just the headline"
            }),
        )
        .await;
    assert!(!out.is_error, "{}", out.text);

    let out = tool
        .call(
            "scrape_url",
            json!({
                "url": format!("{}/article", mock_server.uri()),
                "rule_set": "headline-only",
                "format": "json"
            }),
        )
        .await;
    let record: Value = serde_json::from_str(&out.text).unwrap();
    assert_eq!(record["body_text"], "Static Article");
    assert_eq!(record["links"], json!([]));
    assert_eq!(record["metadata"]["appliedRuleSet"], "headline-only");
    assert_eq!(record["metadata"]["customData"], json!({}));
}

#[test]
fn test_absent_rule_selectors_preserve_record() {
    let record = extract(ARTICLE, "https://news.example.com/a");
    let rule = ExtractionRule {
        title: Some(".missing-title".to_string()),
        content: Some(".missing-body".to_string()),
        ..Default::default()
    };

    let applied = apply_rule("noop", &rule, &record).unwrap();
    assert_eq!(applied.title, record.title);
    assert_eq!(applied.body_text, record.body_text);
    assert_eq!(applied.links, record.links);
    assert_eq!(applied.retrieved_at, record.retrieved_at);
}

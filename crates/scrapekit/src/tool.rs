//! Tool builder and contract for ScrapeKit
//!
//! Exposes the pipeline, rule registry and header store as named tools that
//! take a JSON argument object and always answer with text. Failures are
//! reported as `Error: <message>` with `is_error` set, never propagated.

use crate::batch::{BatchOptions, ScrapeContext};
use crate::config::{PipelineConfig, RendererConfig};
use crate::error::ScrapeError;
use crate::fetchers::{Fetcher, HttpFetcher};
use crate::format::{to_pretty_json, OutputFormat};
use crate::headers::HeaderStore;
use crate::pipeline::Pipeline;
use crate::renderer::{ChromiumRenderer, DisabledRenderer, Renderer};
use crate::rules::{ExtractionRule, RuleRegistry};
use crate::types::{BatchItem, ScrapeOptions};
use crate::{TOOL_DESCRIPTION, TOOL_LLMTXT};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub const SCRAPE_URL: &str = "scrape_url";
pub const CREATE_RULE_SET: &str = "create_rule_set";
pub const SET_DOMAIN_HEADERS: &str = "set_domain_headers";
pub const BATCH_SCRAPE: &str = "batch_scrape";
pub const LIST_RULE_SETS: &str = "list_rule_sets";
pub const GET_RULE_SET: &str = "get_rule_set";

/// Options shared by `scrape_url` and `batch_scrape`
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScrapeArgs {
    #[serde(flatten)]
    pub options: ScrapeOptions,

    /// Rule set applied after extraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,

    /// Output format: markdown (default), text, html or json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ScrapeArgs {
    fn batch_options(self) -> Result<BatchOptions, ScrapeError> {
        let format = match self.format.as_deref() {
            Some(tag) => tag.parse()?,
            None => OutputFormat::default(),
        };
        Ok(BatchOptions {
            scrape: self.options,
            rule_set: self.rule_set,
            format,
        })
    }
}

/// Arguments of `scrape_url`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScrapeUrlRequest {
    /// Address to scrape (http(s), data: or file:)
    pub url: String,
    #[serde(flatten)]
    pub args: ScrapeArgs,
}

/// Arguments of `create_rule_set`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateRuleSetRequest {
    /// Rule set name; an existing set with this name is replaced
    pub name: String,
    pub rules: ExtractionRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Arguments of `set_domain_headers`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetDomainHeadersRequest {
    /// Domain or address; scheme, port and path are ignored
    pub domain: String,
    /// Headers sent with every request to the domain
    pub headers: HashMap<String, String>,
}

/// Arguments of `batch_scrape`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchScrapeRequest {
    /// Addresses scraped concurrently
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub args: ScrapeArgs,
}

/// Arguments of `get_rule_set`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetRuleSetRequest {
    pub name: String,
}

/// Arguments of `list_rule_sets`
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListRuleSetsRequest {}

/// Name, description and input schema of one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Text result of a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    fn error(err: &ScrapeError) -> Self {
        Self {
            text: format!("Error: {err}"),
            is_error: true,
        }
    }
}

/// Builder for configuring the ScrapeKit tool
pub struct ToolBuilder {
    pipeline_config: PipelineConfig,
    renderer_config: RendererConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    renderer: Option<Arc<dyn Renderer>>,
    disable_browser: bool,
    builtin_rules: bool,
}

impl Default for ToolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolBuilder {
    /// Create a builder with default settings and the built-in rule sets
    pub fn new() -> Self {
        Self {
            pipeline_config: PipelineConfig::default(),
            renderer_config: RendererConfig::default(),
            fetcher: None,
            renderer: None,
            disable_browser: false,
            builtin_rules: true,
        }
    }

    /// Set the user agent of the static tier
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.pipeline_config.user_agent = ua.into();
        self
    }

    /// Set the timeout used when a request gives none
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.pipeline_config.default_timeout_ms = timeout_ms;
        self
    }

    /// Use an explicit browser executable
    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.renderer_config.chrome_executable = Some(path.into());
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    pub fn renderer_config(mut self, config: RendererConfig) -> Self {
        self.renderer_config = config;
        self
    }

    /// Replace the static tier
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the browser tier
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Never launch a browser; render attempts fail immediately
    pub fn disable_browser(mut self) -> Self {
        self.disable_browser = true;
        self
    }

    /// Start with an empty rule registry
    pub fn without_builtin_rules(mut self) -> Self {
        self.builtin_rules = false;
        self
    }

    /// Build the tool
    pub fn build(self) -> Tool {
        let fetcher = self.fetcher.unwrap_or_else(|| {
            Arc::new(HttpFetcher::with_user_agent(
                self.pipeline_config.user_agent.clone(),
            ))
        });
        let renderer: Arc<dyn Renderer> = match self.renderer {
            Some(renderer) => renderer,
            None if self.disable_browser => Arc::new(DisabledRenderer),
            None => Arc::new(ChromiumRenderer::new(self.renderer_config)),
        };
        let rules = if self.builtin_rules {
            RuleRegistry::with_builtins()
        } else {
            RuleRegistry::new()
        };

        Tool {
            pipeline: Pipeline::new(fetcher, renderer, self.pipeline_config),
            rules,
            headers: HeaderStore::new(),
        }
    }
}

/// Configured ScrapeKit tool set
pub struct Tool {
    pipeline: Pipeline,
    rules: RuleRegistry,
    headers: HeaderStore,
}

impl Default for Tool {
    fn default() -> Self {
        ToolBuilder::new().build()
    }
}

impl Tool {
    /// Create a new tool builder
    pub fn builder() -> ToolBuilder {
        ToolBuilder::new()
    }

    /// Get tool description
    pub fn description(&self) -> &'static str {
        TOOL_DESCRIPTION
    }

    /// Get full documentation (llmtxt)
    pub fn llmtxt(&self) -> &'static str {
        TOOL_LLMTXT
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    /// Every tool with its input schema
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SCRAPE_URL,
                description: "Scrape a page, escalating to a headless browser when needed, and return its content",
                input_schema: schema_value(schema_for!(ScrapeUrlRequest)),
            },
            ToolDefinition {
                name: CREATE_RULE_SET,
                description: "Register (or replace) a named set of CSS extraction rules",
                input_schema: schema_value(schema_for!(CreateRuleSetRequest)),
            },
            ToolDefinition {
                name: SET_DOMAIN_HEADERS,
                description: "Store headers sent with every request to a domain",
                input_schema: schema_value(schema_for!(SetDomainHeadersRequest)),
            },
            ToolDefinition {
                name: BATCH_SCRAPE,
                description: "Scrape many pages concurrently; failures are reported per page",
                input_schema: schema_value(schema_for!(BatchScrapeRequest)),
            },
            ToolDefinition {
                name: LIST_RULE_SETS,
                description: "List registered rule sets",
                input_schema: schema_value(schema_for!(ListRuleSetsRequest)),
            },
            ToolDefinition {
                name: GET_RULE_SET,
                description: "Show the rules of a registered rule set",
                input_schema: schema_value(schema_for!(GetRuleSetRequest)),
            },
        ]
    }

    /// Input schema of the named tool
    pub fn input_schema(&self, name: &str) -> Option<Value> {
        self.definitions()
            .into_iter()
            .find(|def| def.name == name)
            .map(|def| def.input_schema)
    }

    /// Run the named tool, converting any failure into an error output
    pub async fn call(&self, name: &str, arguments: Value) -> ToolOutput {
        match self.execute(name, arguments).await {
            Ok(text) => ToolOutput::ok(text),
            Err(e) => {
                debug!(tool = name, error = %e, "Tool call failed");
                ToolOutput::error(&e)
            }
        }
    }

    /// Run the named tool
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<String, ScrapeError> {
        match name {
            SCRAPE_URL => {
                let req: ScrapeUrlRequest = parse_args(arguments, &["url"])?;
                self.scrape(&req.url, &req.args.batch_options()?).await
            }
            CREATE_RULE_SET => {
                let req: CreateRuleSetRequest = parse_args(arguments, &["name", "rules"])?;
                self.rules
                    .register(req.name.as_str(), req.rules, req.description)?;
                Ok(format!("Rule set '{}' registered", req.name))
            }
            SET_DOMAIN_HEADERS => {
                let req: SetDomainHeadersRequest = parse_args(arguments, &["domain", "headers"])?;
                let count = req.headers.len();
                let domain = self.headers.set(&req.domain, req.headers);
                Ok(format!("Stored {count} header(s) for {domain}"))
            }
            BATCH_SCRAPE => {
                let req: BatchScrapeRequest = parse_args(arguments, &["urls"])?;
                let items = self.batch(&req.urls, &req.args.batch_options()?).await;
                Ok(to_pretty_json(&items))
            }
            LIST_RULE_SETS => {
                let sets: Vec<Value> = self
                    .rules
                    .list()
                    .into_iter()
                    .filter_map(|name| self.rules.get(&name))
                    .map(|set| json!({ "name": set.name, "description": set.description }))
                    .collect();
                Ok(to_pretty_json(&sets))
            }
            GET_RULE_SET => {
                let req: GetRuleSetRequest = parse_args(arguments, &["name"])?;
                let set = self
                    .rules
                    .get(&req.name)
                    .ok_or(ScrapeError::UnknownRuleSet(req.name))?;
                Ok(to_pretty_json(&set))
            }
            other => Err(ScrapeError::UnknownTool(other.to_string())),
        }
    }

    /// Scrape a single address into formatted text
    pub async fn scrape(&self, url: &str, options: &BatchOptions) -> Result<String, ScrapeError> {
        self.context().scrape(url, options).await
    }

    /// Scrape many addresses concurrently
    pub async fn batch(&self, urls: &[String], options: &BatchOptions) -> Vec<BatchItem> {
        self.context().run_batch(urls, options).await
    }

    /// Close the browser session, if one was started
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }

    fn context(&self) -> ScrapeContext<'_> {
        ScrapeContext {
            pipeline: &self.pipeline,
            rules: &self.rules,
            headers: &self.headers,
        }
    }
}

fn schema_value(schema: schemars::schema::RootSchema) -> Value {
    serde_json::to_value(schema).unwrap_or_default()
}

/// Check required fields are present and non-empty, then decode
fn parse_args<T: DeserializeOwned>(
    arguments: Value,
    required: &[&'static str],
) -> Result<T, ScrapeError> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };

    for &field in required {
        let present = match arguments.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(ScrapeError::MissingParameter(field));
        }
    }

    serde_json::from_value(arguments).map_err(|e| ScrapeError::InvalidArguments(e.to_string()))
}

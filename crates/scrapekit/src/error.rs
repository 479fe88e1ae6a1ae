//! Error types for ScrapeKit

use thiserror::Error;

/// Errors from the lightweight HTTP tier
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or has a scheme the HTTP client cannot fetch
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrl,

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Request exceeded its timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    ConnectError(#[source] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),
}

impl FetchError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout_ms)
        } else if err.is_connect() {
            FetchError::ConnectError(err)
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::RequestError(err.to_string())
        }
    }
}

/// Errors from the browser rendering tier
#[derive(Debug, Error)]
pub enum RenderError {
    /// No usable browser executable was found
    #[error("No Chrome/Chromium executable found (set SCRAPEKIT_CHROME_PATH)")]
    BrowserNotFound,

    /// Downloading a browser build failed
    #[error("Failed to provision a browser: {0}")]
    Provision(String),

    /// Browser process could not be launched
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// Page could not be opened or configured
    #[error("Page setup failed: {0}")]
    Page(String),

    /// Navigation did not reach DOM readiness in time
    #[error("Navigation timed out after {0}ms")]
    NavigationTimeout(u64),

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Wait selector never appeared
    #[error("Timed out waiting for selector '{selector}'")]
    WaitTimeout { selector: String },

    /// Rendered markup or screenshot could not be read
    #[error("Failed to read rendered page: {0}")]
    Content(String),
}

/// Errors surfaced to callers of the pipeline, rule engine and tool
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A required request field is absent or empty
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Every retrieval tier failed
    #[error("{}", retrieval_message(.fetch, .render))]
    Retrieval {
        fetch: Option<FetchError>,
        render: RenderError,
    },

    /// No rule set is registered under this name
    #[error("Unknown rule set: {0}")]
    UnknownRuleSet(String),

    /// A rule selector could not be parsed
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    /// Output format tag is not recognized
    #[error("Unsupported format: {0} (expected markdown, text, html or json)")]
    UnsupportedFormat(String),

    /// Tool arguments could not be decoded
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Requested tool does not exist
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

fn retrieval_message(fetch: &Option<FetchError>, render: &RenderError) -> String {
    match fetch {
        Some(fetch) => format!(
            "Failed to retrieve document. Static fetch: {fetch}. Browser render: {render}"
        ),
        None => format!("Failed to retrieve document. Browser render: {render}"),
    }
}

//! Tunable parameters for the pipeline and the browser renderer
//!
//! The heuristic thresholds here are empirical; none of them is derived
//! from anything deeper, so they are all overridable.

use crate::{DEFAULT_USER_AGENT, RENDER_USER_AGENT};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding an explicit browser executable path
pub const CHROME_PATH_ENV: &str = "SCRAPEKIT_CHROME_PATH";

/// Phrases in static markup that indicate a no-script fallback page
pub const DEFAULT_JS_PHRASES: &[&str] = &[
    "enable javascript",
    "javascript is required",
    "javascript is disabled",
    "please enable js",
    "requires javascript",
    "you need to enable javascript",
    "this app works best with javascript enabled",
];

/// Default timeout for each retrieval tier
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Minimum stripped text length for a content container to be accepted
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 100;

/// Settings for the strategy selector and extractor
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout applied when the caller gives none
    pub default_timeout_ms: u64,
    /// Lower-case phrases that trigger browser escalation
    pub js_phrases: Vec<String>,
    /// Minimum text length for a content container candidate
    pub min_content_length: usize,
    /// User agent for the static tier
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            js_phrases: DEFAULT_JS_PHRASES.iter().map(|p| p.to_string()).collect(),
            min_content_length: DEFAULT_MIN_CONTENT_LENGTH,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Replace the escalation phrase list (matched case-insensitively)
    pub fn js_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.js_phrases = phrases
            .into_iter()
            .map(|p| p.into().to_lowercase())
            .collect();
        self
    }

    pub fn min_content_length(mut self, len: usize) -> Self {
        self.min_content_length = len;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }
}

/// Settings for the shared browser session
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Explicit executable; probed when `None`
    pub chrome_executable: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// User agent applied to every page
    pub user_agent: String,
    /// Delay before reading markup when no wait selector is given
    pub quiescence_delay: Duration,
    /// Upper bound for waiting on a caller-supplied selector
    pub selector_timeout: Duration,
    /// Extra command line arguments for the browser process
    pub extra_args: Vec<String>,
    /// Download a browser when none is installed
    pub provision_browser: bool,
    /// Download location; `~/.scrapekit/chromium` when `None`
    pub provision_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chrome_executable: std::env::var_os(CHROME_PATH_ENV).map(PathBuf::from),
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: RENDER_USER_AGENT.to_string(),
            quiescence_delay: Duration::from_millis(2000),
            selector_timeout: Duration::from_secs(10),
            extra_args: Vec::new(),
            provision_browser: true,
            provision_dir: None,
        }
    }
}

impl RendererConfig {
    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn quiescence_delay(mut self, delay: Duration) -> Self {
        self.quiescence_delay = delay;
        self
    }

    pub fn selector_timeout(mut self, timeout: Duration) -> Self {
        self.selector_timeout = timeout;
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn provision_browser(mut self, enabled: bool) -> Self {
        self.provision_browser = enabled;
        self
    }

    pub fn provision_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.provision_dir = Some(dir.into());
        self
    }

    /// Directory a downloaded browser is installed into
    pub fn resolved_provision_dir(&self) -> Option<PathBuf> {
        self.provision_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".scrapekit").join("chromium")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.default_timeout_ms, 30_000);
        assert_eq!(config.min_content_length, 100);
        assert!(config.js_phrases.iter().any(|p| p == "enable javascript"));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_js_phrases_are_lowercased() {
        let config = PipelineConfig::default().js_phrases(["Turn On JavaScript"]);
        assert_eq!(config.js_phrases, vec!["turn on javascript".to_string()]);
    }

    #[test]
    fn test_renderer_builder() {
        let config = RendererConfig::default()
            .chrome_executable("/opt/chrome/chrome")
            .viewport(1280, 720)
            .quiescence_delay(Duration::from_millis(500))
            .arg("--lang=en-US");

        assert_eq!(
            config.chrome_executable,
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
        assert_eq!((config.viewport_width, config.viewport_height), (1280, 720));
        assert_eq!(config.quiescence_delay, Duration::from_millis(500));
        assert_eq!(config.extra_args, vec!["--lang=en-US".to_string()]);
        assert_ne!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.provision_browser);
    }

    #[test]
    fn test_provision_dir() {
        let config = RendererConfig::default();
        if let Some(dir) = config.resolved_provision_dir() {
            assert!(dir.ends_with(".scrapekit/chromium"));
        }

        let config = config.provision_dir("/srv/browsers").provision_browser(false);
        assert_eq!(
            config.resolved_provision_dir(),
            Some(PathBuf::from("/srv/browsers"))
        );
        assert!(!config.provision_browser);
    }
}

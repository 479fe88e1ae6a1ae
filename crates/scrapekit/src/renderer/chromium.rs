//! Chromium renderer using chromiumoxide
//!
//! One browser process is launched lazily on the first render and shared by
//! every later call; each call gets its own page. When no installed browser
//! is found, a Chromium build is downloaded once per process. A session
//! whose browser died is replaced on the next render.

use super::Renderer;
use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::types::{RenderRequest, RenderedDocument};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use chromiumoxide_fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between selector probes while waiting for readiness
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between `document.readyState` checks after navigation
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reports the previous blank page as still loading until navigation commits
const READY_STATE_SCRIPT: &str =
    "location.href === 'about:blank' ? 'loading' : document.readyState";

/// Find a local Chrome/Chromium executable
///
/// Order: explicit override, platform install locations, a browser
/// provisioned under `~/.scrapekit/chromium/`, then `PATH`.
pub fn find_browser(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "Configured browser executable does not exist");
    }

    let installed: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    };
    if let Some(path) = installed.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Some(path);
    }

    if let Some(home) = dirs::home_dir() {
        let root = home.join(".scrapekit/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                root.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            ]
        } else if cfg!(target_os = "windows") {
            vec![root.join("chrome-win64/chrome.exe")]
        } else {
            vec![root.join("chrome-linux64/chrome"), root.join("chrome")]
        };
        if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
            return Some(path);
        }
    }

    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser", "chrome"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Download a Chromium build into `dir` and return its executable
///
/// An existing installation in `dir` is reused without downloading.
pub async fn provision_browser(dir: &Path) -> Result<PathBuf, RenderError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RenderError::Provision(format!("{}: {e}", dir.display())))?;

    let options = BrowserFetcherOptions::builder()
        .with_path(dir)
        .build()
        .map_err(|e| RenderError::Provision(e.to_string()))?;

    info!(dir = %dir.display(), "No installed browser found, provisioning Chromium");
    let installation = BrowserFetcher::new(options)
        .fetch()
        .await
        .map_err(|e| RenderError::Provision(e.to_string()))?;

    info!(path = %installation.executable_path.display(), "Browser provisioned");
    Ok(installation.executable_path)
}

/// True once `document.readyState` has left `loading`
fn dom_ready(state: &str) -> bool {
    matches!(state, "interactive" | "complete")
}

/// Take the session out of `slot` when `alive` says it is gone
fn evict_dead<S>(slot: &mut Option<S>, alive: impl Fn(&S) -> bool) -> Option<S> {
    match slot.as_ref() {
        Some(session) if !alive(session) => slot.take(),
        _ => None,
    }
}

/// Running browser plus the task draining its CDP event stream
struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Session {
    /// The handler stream ends when the browser connection is lost
    fn is_alive(&self) -> bool {
        !self.handler.is_finished()
    }

    fn discard(self) {
        self.handler.abort();
        // Dropping the browser kills its child process
        drop(self.browser);
    }
}

/// Chromium-based renderer with a lazily launched shared session
pub struct ChromiumRenderer {
    config: RendererConfig,
    executable: OnceCell<PathBuf>,
    session: RwLock<Option<Session>>,
}

impl ChromiumRenderer {
    /// Create a renderer; no browser is started until the first render
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            executable: OnceCell::new(),
            session: RwLock::new(None),
        }
    }

    /// True while a browser session is running
    pub async fn is_running(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Resolve the browser executable, provisioning one if needed
    ///
    /// A resolved path is kept for the life of the renderer; a failed
    /// provisioning attempt is retried on the next call.
    pub async fn executable(&self) -> Result<&Path, RenderError> {
        let path = self
            .executable
            .get_or_try_init(|| async {
                if let Some(path) = find_browser(self.config.chrome_executable.as_deref()) {
                    debug!(path = %path.display(), "Using installed browser");
                    return Ok(path);
                }
                if !self.config.provision_browser {
                    return Err(RenderError::BrowserNotFound);
                }
                let dir = self
                    .config
                    .resolved_provision_dir()
                    .ok_or(RenderError::BrowserNotFound)?;
                provision_browser(&dir).await
            })
            .await?;
        Ok(path.as_path())
    }

    async fn launch(&self) -> Result<Session, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .viewport(Some(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }));
        for arg in &self.config.extra_args {
            builder = builder.arg(arg.as_str());
        }
        builder = builder.chrome_executable(self.executable().await?);
        let browser_config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler error");
                }
            }
        });

        info!("Browser session launched");
        Ok(Session { browser, handler })
    }

    /// Open a page in the shared session
    ///
    /// Launches the session on first use and relaunches it when the
    /// browser has died or no longer opens pages.
    async fn open_page(&self) -> Result<Page, RenderError> {
        {
            let guard = self.session.read().await;
            if let Some(session) = guard.as_ref().filter(|s| s.is_alive()) {
                match new_blank_page(&session.browser).await {
                    Ok(page) => return Ok(page),
                    Err(e) => warn!(error = %e, "Browser session refused a new page"),
                }
            }
        }

        let mut guard = self.session.write().await;
        if let Some(dead) = evict_dead(&mut *guard, Session::is_alive) {
            warn!("Browser session ended unexpectedly, relaunching");
            dead.discard();
        }
        if let Some(session) = guard.as_ref() {
            // Another render may have relaunched while we waited for the lock
            if let Ok(page) = new_blank_page(&session.browser).await {
                return Ok(page);
            }
            if let Some(stale) = guard.take() {
                warn!("Discarding unresponsive browser session");
                stale.discard();
            }
        }

        let session = self.launch().await?;
        let page = new_blank_page(&session.browser).await;
        *guard = Some(session);
        page
    }

    /// Navigate and wait until the DOM has been parsed
    async fn navigate(&self, page: &Page, url: &str, timeout_ms: u64) -> Result<(), RenderError> {
        let ready = async {
            let response = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            if let Some(error) = response.result.error_text.clone() {
                return Err(RenderError::Navigation(error));
            }

            loop {
                match page.evaluate(READY_STATE_SCRIPT).await {
                    Ok(result) => {
                        if result.into_value::<String>().is_ok_and(|state| dom_ready(&state)) {
                            return Ok(());
                        }
                    }
                    // The execution context is replaced while the document commits
                    Err(e) => debug!(error = %e, "readyState not available yet"),
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(Duration::from_millis(timeout_ms), ready)
            .await
            .map_err(|_| RenderError::NavigationTimeout(timeout_ms))?
    }

    async fn render_page(
        &self,
        page: &Page,
        request: &RenderRequest,
    ) -> Result<RenderedDocument, RenderError> {
        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;

        if !request.headers.is_empty() {
            let headers = Headers::new(serde_json::json!(request.headers));
            page.execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(|e| RenderError::Page(e.to_string()))?;
        }

        self.navigate(page, &request.url, request.timeout_ms).await?;

        match request.wait_selector.as_deref() {
            Some(selector) => self.wait_for_selector(page, selector).await?,
            None => tokio::time::sleep(self.config.quiescence_delay).await,
        }

        let markup = page
            .content()
            .await
            .map_err(|e| RenderError::Content(e.to_string()))?;

        let screenshot = if request.screenshot {
            let params = ScreenshotParams::builder().full_page(true).build();
            Some(
                page.screenshot(params)
                    .await
                    .map_err(|e| RenderError::Content(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(RenderedDocument { markup, screenshot })
    }

    async fn wait_for_selector(&self, page: &Page, selector: &str) -> Result<(), RenderError> {
        let deadline = Instant::now() + self.config.selector_timeout;
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RenderError::WaitTimeout {
                    selector: selector.to_string(),
                });
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }
}

impl Default for ChromiumRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

async fn new_blank_page(browser: &Browser) -> Result<Page, RenderError> {
    browser
        .new_page("about:blank")
        .await
        .map_err(|e| RenderError::Page(e.to_string()))
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
        let page = self.open_page().await?;
        debug!(url = %request.url, "Rendering page");

        let result = self.render_page(&page, request).await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close page");
        }
        result
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        let Some(mut session) = self.session.write().await.take() else {
            return Ok(());
        };
        if !session.is_alive() {
            session.discard();
            info!("Browser session already ended");
            return Ok(());
        }

        if let Err(e) = session.browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = session.browser.wait().await {
            warn!(error = %e, "Failed waiting for browser exit");
        }
        session.handler.abort();
        info!("Browser session closed");
        Ok(())
    }
}

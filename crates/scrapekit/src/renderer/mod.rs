//! Browser rendering tier
//!
//! A [`Renderer`] executes page script in a real browser before reading
//! the markup. Implementations own whatever long-lived engine handle they
//! need; the handle is released only by an explicit [`Renderer::shutdown`].

mod chromium;

pub use chromium::{find_browser, ChromiumRenderer};

use crate::error::RenderError;
use crate::types::{RenderRequest, RenderedDocument};
use async_trait::async_trait;

/// Trait for the heavyweight retrieval tier
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &'static str;

    /// Navigate to `request.url` in a fresh page and return the final markup
    ///
    /// The page is closed before returning, whatever the outcome.
    async fn render(&self, request: &RenderRequest) -> Result<RenderedDocument, RenderError>;

    /// Release the engine handle
    ///
    /// Must be called by the owning process before exit. Rendering after
    /// shutdown starts a new session.
    async fn shutdown(&self) -> Result<(), RenderError>;
}

/// Renderer used when no browser should be started
///
/// Every render fails, so the pipeline degrades to static-only retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl Renderer for DisabledRenderer {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn render(&self, _request: &RenderRequest) -> Result<RenderedDocument, RenderError> {
        Err(RenderError::Launch(
            "browser rendering is disabled".to_string(),
        ))
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        Ok(())
    }
}

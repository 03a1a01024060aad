//! Renderer abstraction for the primary fetch state
//!
//! A renderer turns a page URL into fully rendered HTML, typically by driving
//! a headless browser with a per-platform authenticated profile. No browser
//! binding ships with this crate; callers plug one in through [`Renderer`].

use crate::error::RenderError;
use crate::platform::PlatformKind;
use async_trait::async_trait;
use std::time::Duration;

/// One render call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub url: String,
    /// Selects the browsing profile
    pub platform: PlatformKind,
    pub timeout: Duration,
    /// `Cookie` header value to seed the context with
    pub cookie_header: Option<String>,
}

/// A page rendering engine
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render the page and return its final HTML
    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError>;
}

/// Renderer used when no browser is available.
///
/// Every call fails, so fetches run through the degraded HTTP path.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn render(&self, _request: &RenderRequest) -> Result<String, RenderError> {
        Err(RenderError::Unavailable("no browser backend configured".to_string()))
    }
}

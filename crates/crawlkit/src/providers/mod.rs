//! Platform providers
//!
//! Design: one tagged variant per platform behind [`Provider`]. Each variant
//! owns the platform's extraction rules; the primary/degraded fetch state
//! machine lives once in [`Provider::fetch_and_parse`].

mod bilibili;
mod weibo;
mod weixin;
mod xiaohongshu;
mod zhihu;

pub use bilibili::BilibiliProvider;
pub use weibo::WeiboProvider;
pub use weixin::WeixinProvider;
pub use xiaohongshu::{XiaohongshuProvider, XiaohongshuTarget};
pub use zhihu::{ZhihuProvider, ZhihuTarget};

use crate::content::{MediaReference, NormalizedContent};
use crate::convert::{clean_whitespace, element_text, escape_html, first_text, select_first, text_of};
use crate::error::{CrawlError, RenderError};
use crate::http::PageSource;
use crate::platform::PlatformKind;
use crate::render::{RenderRequest, Renderer};
use chrono::Utc;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, warn};

/// Title selectors every platform falls back to in the degraded state
const GENERIC_TITLE_SELECTORS: &[&str] = &["meta[property=\"og:title\"]", "title"];

/// Options that shape extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Sub-items kept, taken first-N in display order
    pub max_items: usize,
}

/// Fields extracted from a rendered page
#[derive(Debug, Clone, Default)]
pub(crate) struct Extraction {
    pub title: String,
    pub author: String,
    pub text: String,
    pub markdown: String,
    pub html: String,
    pub media: Vec<MediaReference>,
    pub extras: serde_json::Value,
}

/// Reduced selector set for the degraded state
///
/// The first selector with a non-empty match wins for each field.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DegradedRules {
    pub title: &'static [&'static str],
    pub author: &'static [&'static str],
    pub body: &'static [&'static str],
}

/// Per-platform extraction rules
pub(crate) trait Extractor: Send + Sync {
    fn platform(&self) -> PlatformKind;

    /// Stable identifier of the target within its platform
    fn source_id(&self) -> String;

    /// Page the renderer (and the degraded fetch) loads
    fn page_url(&self) -> String;

    /// Extract structured content from rendered HTML
    ///
    /// Returns a description of what was missing when the page does not
    /// carry the expected structure.
    fn extract(&self, html: &str, options: &ExtractOptions) -> Result<Extraction, String>;

    fn degraded_rules(&self) -> DegradedRules;
}

/// Collaborators and budgets for one provider call
pub struct ProviderContext<'a> {
    pub renderer: &'a dyn Renderer,
    pub pages: &'a dyn PageSource,
    pub render_timeout: Duration,
    pub degraded_timeout: Duration,
    pub cookie_header: Option<&'a str>,
}

/// A resolved target bound to its platform's extraction rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Zhihu(ZhihuProvider),
    Weibo(WeiboProvider),
    Weixin(WeixinProvider),
    Xiaohongshu(XiaohongshuProvider),
    Bilibili(BilibiliProvider),
}

impl Provider {
    fn extractor(&self) -> &dyn Extractor {
        match self {
            Provider::Zhihu(p) => p,
            Provider::Weibo(p) => p,
            Provider::Weixin(p) => p,
            Provider::Xiaohongshu(p) => p,
            Provider::Bilibili(p) => p,
        }
    }

    pub fn platform(&self) -> PlatformKind {
        self.extractor().platform()
    }

    pub fn source_id(&self) -> String {
        self.extractor().source_id()
    }

    pub fn page_url(&self) -> String {
        self.extractor().page_url()
    }

    /// Fetch the target and normalize it
    ///
    /// Tries the renderer first. When that fails (error, timeout or no
    /// matching content), falls back to a plain HTTP fetch with reduced
    /// selectors and marks the result degraded. Fails with
    /// [`CrawlError::ExtractionFailed`] when both states fail.
    pub async fn fetch_and_parse(
        &self,
        ctx: &ProviderContext<'_>,
        options: &ExtractOptions,
    ) -> Result<NormalizedContent, CrawlError> {
        let url = self.page_url();
        let platform = self.platform();

        let primary = match self.fetch_primary(ctx, &url, options).await {
            Ok(content) => {
                debug!(%url, %platform, media = content.media.len(), "Primary extraction succeeded");
                return Ok(content);
            }
            Err(e) => e,
        };

        warn!(%url, %platform, error = %primary, "Primary fetch failed, switching to degraded fetch");

        match self.fetch_degraded(ctx, &url).await {
            Ok(content) => Ok(content),
            Err(degraded) => {
                warn!(%url, %platform, error = %degraded, "Degraded fetch failed");
                Err(CrawlError::ExtractionFailed { primary, degraded })
            }
        }
    }

    async fn fetch_primary(
        &self,
        ctx: &ProviderContext<'_>,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<NormalizedContent, String> {
        let request = RenderRequest {
            url: url.to_string(),
            platform: self.platform(),
            timeout: ctx.render_timeout,
            cookie_header: ctx.cookie_header.map(str::to_string),
        };

        let html = match tokio::time::timeout(ctx.render_timeout, ctx.renderer.render(&request)).await
        {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => return Err(CrawlError::RenderFailed(e.to_string()).to_string()),
            Err(_) => {
                let timeout = RenderError::Timeout(ctx.render_timeout);
                return Err(CrawlError::RenderFailed(timeout.to_string()).to_string());
            }
        };

        let extraction = self
            .extractor()
            .extract(&html, options)
            .map_err(|e| format!("rendered page did not match: {}", e))?;
        Ok(self.normalize(extraction, false))
    }

    async fn fetch_degraded(&self, ctx: &ProviderContext<'_>, url: &str) -> Result<NormalizedContent, String> {
        let html = ctx
            .pages
            .fetch_html(url, ctx.degraded_timeout, ctx.cookie_header)
            .await
            .map_err(|e| e.to_string())?;

        let extraction = extract_degraded(&html, self.extractor().degraded_rules())?;
        Ok(self.normalize(extraction, true))
    }

    fn normalize(&self, extraction: Extraction, degraded: bool) -> NormalizedContent {
        NormalizedContent {
            platform: self.platform(),
            source_id: self.source_id(),
            source_url: self.page_url(),
            title: extraction.title,
            author: extraction.author,
            text: extraction.text,
            markdown: extraction.markdown,
            html: extraction.html,
            media: extraction.media,
            extras: extraction.extras,
            degraded,
            fetched_at: Utc::now(),
        }
    }
}

/// Apply reduced selectors to a raw page: title, author and body text only
fn extract_degraded(html: &str, rules: DegradedRules) -> Result<Extraction, String> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let body = rules
        .body
        .iter()
        .filter_map(|css| select_first(root, css))
        .map(element_text)
        .find(|text| !text.is_empty())
        .ok_or_else(|| "no body selector matched the raw page".to_string())?;

    let title = first_text(root, rules.title)
        .or_else(|| {
            GENERIC_TITLE_SELECTORS.iter().find_map(|css| {
                let el = select_first(root, css)?;
                let value = match el.value().attr("content") {
                    Some(content) => clean_whitespace(content),
                    None => text_of(el),
                };
                Some(value).filter(|v| !v.is_empty())
            })
        })
        .unwrap_or_default();
    let author = first_text(root, rules.author).unwrap_or_default();

    let html = body
        .split("\n\n")
        .map(|para| format!("<p>{}</p>", escape_html(para)))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Extraction {
        title,
        author,
        markdown: body.clone(),
        text: body,
        html,
        media: Vec::new(),
        extras: serde_json::Value::Null,
    })
}

/// Markup of a list of sections wrapped as a standalone article
pub(crate) fn article_html(title: &str, sections: &[String]) -> String {
    format!(
        "<article>\n<h1>{}</h1>\n{}\n</article>",
        escape_html(title),
        sections.join("\n")
    )
}

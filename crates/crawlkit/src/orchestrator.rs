//! Acquisition orchestrator
//!
//! Single fetch: validate, route, login gate, cache lookup, provider, media,
//! storage, cache fill. Batch fetch runs single fetches under a concurrency
//! bound and slots results back into input order.

use crate::cache::{cache_key, CacheStore};
use crate::config::CrawlerConfig;
use crate::content::NormalizedContent;
use crate::error::{CrawlError, PageError};
use crate::http::{build_client, HttpPageSource, PageSource};
use crate::media::{MediaDownloader, MediaReport};
use crate::platform::PlatformKind;
use crate::providers::{ExtractOptions, ProviderContext};
use crate::render::{NoopRenderer, Renderer};
use crate::router::PlatformRouter;
use crate::session::SessionManager;
use crate::storage::{PersistOptions, StorageManager};
use crate::types::{BatchResult, BatchSummary, FetchIssue, FetchRequest, FetchResult, OutputFormat};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Builder for a [`Crawler`]
#[derive(Default)]
pub struct CrawlerBuilder {
    config: CrawlerConfig,
    renderer: Option<Arc<dyn Renderer>>,
    pages: Option<Arc<dyn PageSource>>,
    cache: Option<Arc<CacheStore>>,
    client: Option<reqwest::Client>,
}

impl CrawlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: CrawlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Renderer for the primary state; without one every fetch is degraded
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Raw page source for the degraded state
    pub fn page_source(mut self, pages: Arc<dyn PageSource>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// HTTP client for media downloads and the default page source
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<Crawler, PageError> {
        let client = match self.client {
            Some(client) => client,
            None => build_client(&self.config.user_agent)?,
        };
        let pages = self
            .pages
            .unwrap_or_else(|| Arc::new(HttpPageSource::new(client.clone())));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(CacheStore::memory(self.config.cache_ttl)));

        Ok(Crawler {
            router: PlatformRouter::new(),
            renderer: self.renderer.unwrap_or_else(|| Arc::new(NoopRenderer)),
            pages,
            cache,
            media: MediaDownloader::from_config(client, &self.config),
            storage: StorageManager::new(),
            config: self.config,
        })
    }
}

/// Top-level entry point
pub struct Crawler {
    router: PlatformRouter,
    renderer: Arc<dyn Renderer>,
    pages: Arc<dyn PageSource>,
    cache: Arc<CacheStore>,
    media: MediaDownloader,
    storage: StorageManager,
    config: CrawlerConfig,
}

impl Crawler {
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::new()
    }

    /// Crawler with the cache backend named by `config.redis_url`
    pub async fn from_config(config: CrawlerConfig) -> Result<Self, PageError> {
        let cache = match &config.redis_url {
            Some(url) => {
                CacheStore::connect_redis(url, config.cache_ttl, config.cache_reconnect_interval)
                    .await
            }
            None => CacheStore::memory(config.cache_ttl),
        };
        Self::builder()
            .cache(Arc::new(cache))
            .config(config)
            .build()
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn router(&self) -> &PlatformRouter {
        &self.router
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Acquire one target
    ///
    /// Never fails: every error is reported through [`FetchResult::error`].
    /// The whole call, media and storage included, is bounded by
    /// `fetch_timeout`; on expiry any staged files are removed.
    pub async fn fetch(&self, request: &FetchRequest, sessions: &dyn SessionManager) -> FetchResult {
        let started = Instant::now();
        let platform = self.router.platform_of(&request.target);

        let outcome = tokio::time::timeout(
            self.config.fetch_timeout,
            self.fetch_inner(request, sessions, started),
        )
        .await
        .unwrap_or(Err(CrawlError::Timeout(self.config.fetch_timeout)));

        match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!(url = %request.target, kind = %err.kind(), error = %err, "Fetch failed");
                FetchResult::failure(request, platform, &err, elapsed_ms(started))
            }
        }
    }

    async fn fetch_inner(
        &self,
        request: &FetchRequest,
        sessions: &dyn SessionManager,
        started: Instant,
    ) -> Result<FetchResult, CrawlError> {
        request.validate()?;
        let provider = self.router.resolve(&request.target)?;
        let platform = provider.platform();
        let cookie_header = request.cookie_header();

        if cookie_header.is_none() {
            ensure_session(platform, sessions).await?;
        }

        let key = cache_key(request);
        if let Some(content) = self.cached(&key).await {
            info!(url = %request.target, %platform, "Served from cache");
            return Ok(FetchResult {
                target: request.target.clone(),
                success: true,
                platform: Some(platform),
                from_cache: true,
                degraded: content.degraded,
                save_images: request.save_images && !content.degraded,
                output_format: effective_format(request.output_format, content.degraded),
                content: Some(content),
                warnings: self.cache_warnings(),
                elapsed_ms: elapsed_ms(started),
                ..Default::default()
            });
        }

        let ctx = ProviderContext {
            renderer: self.renderer.as_ref(),
            pages: self.pages.as_ref(),
            render_timeout: self.config.render_timeout,
            degraded_timeout: self.config.degraded_timeout,
            cookie_header: cookie_header.as_deref(),
        };
        let options = ExtractOptions {
            max_items: request.max_items,
        };
        let mut content = provider.fetch_and_parse(&ctx, &options).await?;

        let degraded = content.degraded;
        let save_images = request.save_images && !degraded;
        let output_format = effective_format(request.output_format, degraded);
        if degraded && (request.save_images || request.output_format != OutputFormat::Text) {
            info!(
                url = %request.target,
                "Degraded content: media download and rich formatting disabled"
            );
        }

        let destination = request
            .destination
            .clone()
            .unwrap_or_else(|| self.config.download_dir.clone());

        if !request.force_save {
            if let Some(record) = self.storage.existing(&destination, &content).await {
                debug!(dir = %record.directory.display(), "Existing record kept");
                return Ok(FetchResult {
                    target: request.target.clone(),
                    success: true,
                    platform: Some(platform),
                    degraded,
                    save_images,
                    output_format,
                    content: Some(content),
                    record: Some(record),
                    warnings: self.cache_warnings(),
                    elapsed_ms: elapsed_ms(started),
                    ..Default::default()
                });
            }
        }

        let staging = self.storage.stage(&destination, platform).await?;
        let media: Option<MediaReport> = if save_images && !content.media.is_empty() {
            Some(
                self.media
                    .download_all(
                        &mut content.media,
                        staging.path(),
                        Some(content.source_url.as_str()),
                    )
                    .await,
            )
        } else {
            None
        };

        let record = self
            .storage
            .commit(
                staging,
                &content,
                &destination,
                PersistOptions {
                    output_format,
                    force_save: request.force_save,
                },
            )
            .await?;

        if !degraded {
            match serde_json::to_string(&content) {
                Ok(json) => self.cache.put(&key, &json).await,
                Err(e) => warn!(error = %e, "Could not serialize content for the cache"),
            }
        }

        let mut warnings = self.cache_warnings();
        if let Some(report) = media.as_ref().filter(|r| !r.is_complete()) {
            warnings.push(FetchIssue::from(&CrawlError::MediaPartialFailure {
                failed: report.skipped.len(),
                total: report.total,
            }));
        }

        info!(
            url = %request.target,
            %platform,
            degraded,
            elapsed_ms = elapsed_ms(started),
            "Fetch complete"
        );
        Ok(FetchResult {
            target: request.target.clone(),
            success: true,
            platform: Some(platform),
            from_cache: false,
            degraded,
            save_images,
            output_format,
            content: Some(content),
            record: Some(record),
            media,
            warnings,
            error: None,
            elapsed_ms: elapsed_ms(started),
        })
    }

    async fn cached(&self, key: &str) -> Option<NormalizedContent> {
        let raw = self.cache.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(key, error = %e, "Dropping unreadable cache entry");
                self.cache.invalidate(key).await;
                None
            }
        }
    }

    fn cache_warnings(&self) -> Vec<FetchIssue> {
        if self.cache.is_degraded() {
            vec![FetchIssue::from(&CrawlError::CacheBackendDegraded(
                "using in-memory fallback".to_string(),
            ))]
        } else {
            Vec::new()
        }
    }

    /// Acquire many targets, at most `max_concurrent` at a time
    ///
    /// `max_concurrent` is clamped to `1..=config.max_concurrency`. Results
    /// come back in input order regardless of completion order.
    pub async fn batch_fetch(
        &self,
        requests: Vec<FetchRequest>,
        max_concurrent: usize,
        sessions: &dyn SessionManager,
    ) -> BatchResult {
        let limit = max_concurrent.clamp(1, self.config.max_concurrency.max(1));
        let total = requests.len();
        info!(total, concurrency = limit, "Starting batch");

        let mut slots: Vec<Option<FetchResult>> = (0..total).map(|_| None).collect();
        let mut completions = stream::iter(requests.iter().enumerate())
            .map(|(index, request)| async move { (index, self.fetch(request, sessions).await) })
            .buffer_unordered(limit);
        while let Some((index, result)) = completions.next().await {
            debug!(index, success = result.success, "Batch item finished");
            slots[index] = Some(result);
        }

        let results: Vec<FetchResult> = slots.into_iter().flatten().collect();
        let summary = BatchSummary::from_results(&results);
        info!(
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            "Batch complete"
        );
        BatchResult { results, summary }
    }
}

/// Login gate for platforms that need a session
async fn ensure_session(
    platform: PlatformKind,
    sessions: &dyn SessionManager,
) -> Result<(), CrawlError> {
    if !platform.requires_login() || sessions.is_online(platform).await {
        return Ok(());
    }
    info!(%platform, "No session, attempting login");
    if sessions.login(platform).await {
        Ok(())
    } else {
        Err(CrawlError::AuthRequired {
            platform: platform.to_string(),
        })
    }
}

fn effective_format(requested: OutputFormat, degraded: bool) -> OutputFormat {
    if degraded {
        OutputFormat::Text
    } else {
        requested
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::{OfflineSessions, StaticSessions};

    fn crawler() -> Crawler {
        Crawler::builder().build().unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_target() {
        let result = crawler()
            .fetch(&FetchRequest::new("https://example.com/page"), &OfflineSessions)
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::Unsupported));
        assert!(result.platform.is_none());
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let result = crawler()
            .fetch(&FetchRequest::new("  "), &OfflineSessions)
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidRequest));
    }

    #[tokio::test]
    async fn test_login_gate() {
        let request = FetchRequest::new("xhs_keyword:coffee");
        let result = crawler().fetch(&request, &OfflineSessions).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::AuthRequired));
        assert_eq!(result.platform, Some(PlatformKind::Xiaohongshu));

        assert!(ensure_session(PlatformKind::Xiaohongshu, &StaticSessions::new([]).with_login(true))
            .await
            .is_ok());
        assert!(ensure_session(PlatformKind::Zhihu, &OfflineSessions).await.is_ok());
    }

    #[test]
    fn test_effective_format() {
        assert_eq!(effective_format(OutputFormat::Html, true), OutputFormat::Text);
        assert_eq!(effective_format(OutputFormat::Html, false), OutputFormat::Html);
    }
}

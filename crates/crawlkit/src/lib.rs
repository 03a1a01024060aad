//! CrawlKit - multi-platform content acquisition
//!
//! Resolves a URL (or a pseudo-URL such as `xhs_keyword:coffee`) to a
//! platform provider, fetches and normalizes the content, downloads the
//! media it references and stores everything under a stable directory
//! layout. Results are memoized in a cache with a pluggable backend.
//!
//! ## Pipeline
//!
//! - [`PlatformRouter`] maps targets to a [`Provider`]
//! - [`Provider::fetch_and_parse`] tries a [`Renderer`] first and falls back
//!   to a plain HTTP fetch with reduced selectors (degraded content)
//! - [`MediaDownloader`] streams assets under a size cap
//! - [`StorageManager`] writes the record directory and the platform index
//! - [`CacheStore`] memoizes results, falling back to memory when the
//!   durable backend is unreachable
//! - [`Crawler`] ties it together for single and batch fetches
//!
//! ```no_run
//! use crawlkit::{Crawler, FetchRequest, OfflineSessions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::builder().build()?;
//! let result = crawler
//!     .fetch(&FetchRequest::new("https://zhuanlan.zhihu.com/p/123"), &OfflineSessions)
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
mod config;
mod content;
mod convert;
mod error;
pub mod http;
pub mod media;
mod orchestrator;
mod platform;
pub mod providers;
pub mod render;
mod router;
pub mod session;
pub mod storage;
mod types;

pub use cache::{cache_key, CacheBackend, CacheStore, MemoryBackend, RedisBackend};
pub use config::CrawlerConfig;
pub use content::{MediaKind, MediaReference, NormalizedContent};
pub use convert::{clean_whitespace, filter_excessive_newlines};
pub use error::{CacheError, CrawlError, ErrorKind, PageError, RenderError};
pub use http::{HttpPageSource, PageSource};
pub use media::{MediaDownloader, MediaReport, MediaSkip, SkippedMedia};
pub use orchestrator::{Crawler, CrawlerBuilder};
pub use platform::PlatformKind;
pub use providers::{ExtractOptions, Provider, ProviderContext};
pub use render::{NoopRenderer, RenderRequest, Renderer};
pub use router::{PlatformInfo, PlatformRouter, PlatformSummary, XHS_KEYWORD_PREFIX};
pub use session::{OfflineSessions, SessionManager, StaticSessions};
pub use storage::{IndexEntry, PersistOptions, PlatformIndex, RecordStatus, StorageManager, StorageRecord};
pub use types::{
    BatchResult, BatchSummary, Cookie, Credentials, FetchIssue, FetchRequest, FetchResult,
    OutputFormat, DEFAULT_MAX_ITEMS,
};

/// Default User-Agent string, a desktop browser so pages serve their full markup
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

//! Crawler configuration

use crate::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for a [`Crawler`](crate::Crawler)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub user_agent: String,
    /// Budget for one renderer call (primary state)
    pub render_timeout: Duration,
    /// Budget for the plain HTTP page fetch (degraded state)
    pub degraded_timeout: Duration,
    /// Overall budget for one target, media and storage included
    pub fetch_timeout: Duration,
    /// Budget for one media asset
    pub media_timeout: Duration,
    /// Assets above this size are skipped
    pub max_media_bytes: u64,
    /// Parallel asset downloads within one target
    pub media_concurrency: usize,
    pub cache_ttl: Duration,
    /// Minimum spacing between durable cache reconnect attempts
    pub cache_reconnect_interval: Duration,
    /// Upper bound on parallel fetches (one renderer context each)
    pub max_concurrency: usize,
    /// Storage root used when a request carries no destination
    pub download_dir: PathBuf,
    /// Durable cache backend; in-memory only when unset
    pub redis_url: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            render_timeout: Duration::from_secs(30),
            degraded_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(180),
            media_timeout: Duration::from_secs(15),
            max_media_bytes: 10 * 1024 * 1024,
            media_concurrency: 4,
            cache_ttl: Duration::from_secs(3600),
            cache_reconnect_interval: Duration::from_secs(30),
            max_concurrency: 3,
            download_dir: PathBuf::from("downloads"),
            redis_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.max_media_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: CrawlerConfig =
            serde_json::from_str(r#"{"max_concurrency": 5, "redis_url": "redis://localhost"}"#)
                .unwrap();
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost"));
        assert_eq!(config.media_concurrency, 4);
    }
}

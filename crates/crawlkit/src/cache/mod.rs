//! Result cache with a pluggable durable backend
//!
//! Design: [`CacheBackend`] is implemented by [`MemoryBackend`] and
//! [`RedisBackend`]. [`CacheStore`] wraps an optional durable backend and a
//! process-local memory backend. Backend connectivity errors never leave the
//! store; they flip it into degraded mode and the memory path is used instead.

mod memory;
mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

use crate::error::CacheError;
use crate::types::FetchRequest;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Prefix of every cache key
pub const KEY_PREFIX: &str = "crawl:";

/// Key/value store with per-entry expiry
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// `Ok(None)` means absent or expired; `Err` means the backend is unreachable
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Normalize a target for key derivation
///
/// URL targets are re-serialized (lowercase host, default port dropped) without
/// their fragment. Anything else is only trimmed.
pub fn normalize_target(target: &str) -> String {
    let trimmed = target.trim();
    match Url::parse(trimmed) {
        Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
            url.set_fragment(None);
            url.to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Deterministic key over the target and the flags that shape the output
///
/// `force_save` and the destination only affect storage and are left out.
pub fn cache_key(request: &FetchRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_target(&request.target));
    hasher.update("\n");
    hasher.update(if request.save_images { "1" } else { "0" });
    hasher.update("\n");
    hasher.update(request.output_format.as_str());
    hasher.update("\n");
    hasher.update(request.max_items.to_string());
    format!("{}{:x}", KEY_PREFIX, hasher.finalize())
}

/// Reconnect policy for a durable backend that failed at startup
struct Reconnect {
    redis_url: String,
    interval: Duration,
    last_attempt: Mutex<Instant>,
}

/// Fallback cache: durable backend first, memory when it is unavailable
pub struct CacheStore {
    durable: RwLock<Option<Arc<dyn CacheBackend>>>,
    memory: MemoryBackend,
    ttl: Duration,
    degraded: AtomicBool,
    reconnect: Option<Reconnect>,
}

impl CacheStore {
    /// Memory-only store
    pub fn memory(ttl: Duration) -> Self {
        Self {
            durable: RwLock::new(None),
            memory: MemoryBackend::new(),
            ttl,
            degraded: AtomicBool::new(false),
            reconnect: None,
        }
    }

    /// Store over an already connected durable backend
    pub fn with_backend(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            durable: RwLock::new(Some(backend)),
            ..Self::memory(ttl)
        }
    }

    /// Connect to Redis, starting degraded if it is unreachable
    ///
    /// While degraded, a reconnect is attempted at most once per
    /// `reconnect_interval` on subsequent operations.
    pub async fn connect_redis(redis_url: &str, ttl: Duration, reconnect_interval: Duration) -> Self {
        let mut store = Self::memory(ttl);
        match RedisBackend::connect(redis_url).await {
            Ok(backend) => {
                info!("Connected to durable cache backend");
                store.durable = RwLock::new(Some(Arc::new(backend)));
            }
            Err(e) => {
                store.mark_degraded(&e);
            }
        }
        store.reconnect = Some(Reconnect {
            redis_url: redis_url.to_string(),
            interval: reconnect_interval,
            last_attempt: Mutex::new(Instant::now()),
        });
        store
    }

    /// True while the memory fallback is in use
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mark_degraded(&self, err: &CacheError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(error = %err, "Cache backend degraded, using in-memory fallback");
        }
    }

    fn mark_healthy(&self) {
        if self.degraded.swap(false, Ordering::SeqCst) {
            info!("Cache backend recovered");
        }
    }

    /// Durable backend, reconnecting first if the startup connect failed
    async fn durable(&self) -> Option<Arc<dyn CacheBackend>> {
        if let Some(backend) = self.durable.read().await.clone() {
            return Some(backend);
        }
        let reconnect = self.reconnect.as_ref()?;
        {
            let mut last = reconnect.last_attempt.lock().await;
            if last.elapsed() < reconnect.interval {
                return None;
            }
            *last = Instant::now();
        }

        debug!("Retrying durable cache connection");
        match RedisBackend::connect(&reconnect.redis_url).await {
            Ok(backend) => {
                let backend: Arc<dyn CacheBackend> = Arc::new(backend);
                *self.durable.write().await = Some(backend.clone());
                self.mark_healthy();
                Some(backend)
            }
            Err(e) => {
                debug!(error = %e, "Durable cache still unreachable");
                None
            }
        }
    }

    /// Look up a key; misses and backend failures both return `None`
    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(durable) = self.durable().await {
            match durable.get(key).await {
                Ok(Some(value)) => {
                    self.mark_healthy();
                    return Some(value);
                }
                Ok(None) => self.mark_healthy(),
                Err(e) => self.mark_degraded(&e),
            }
        }
        // Entries written during an outage live only in memory
        self.memory.get(key).await.ok().flatten()
    }

    /// Store a value with the configured TTL
    pub async fn put(&self, key: &str, value: &str) {
        self.put_with_ttl(key, value, self.ttl).await
    }

    pub async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(durable) = self.durable().await {
            match durable.set(key, value, ttl).await {
                Ok(()) => {
                    self.mark_healthy();
                    return;
                }
                Err(e) => self.mark_degraded(&e),
            }
        }
        let _ = self.memory.set(key, value, ttl).await;
    }

    /// Remove a key from both tiers
    pub async fn invalidate(&self, key: &str) {
        if let Some(durable) = self.durable().await {
            match durable.delete(key).await {
                Ok(()) => self.mark_healthy(),
                Err(e) => self.mark_degraded(&e),
            }
        }
        let _ = self.memory.delete(key).await;
    }
}

#[async_trait]
impl CacheBackend for CacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(CacheStore::get(self, key).await)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.put_with_ttl(key, value, ttl).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.invalidate(key).await;
        Ok(())
    }
}

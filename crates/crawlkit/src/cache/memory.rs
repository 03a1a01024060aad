//! Process-local cache backend

use super::CacheBackend;
use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory map with lazy expiry
///
/// Expired entries are dropped when they are next read.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                debug!(key, "Memory cache entry expired");
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = MemoryBackend::new();
        backend.set("a", "1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap().as_deref(), Some("1"));
        backend.delete("a").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped_on_read() {
        let backend = MemoryBackend::new();
        backend.set("a", "1", Duration::ZERO).await.unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get("a").await.unwrap(), None);
        assert!(backend.is_empty());
    }
}

//! Per-platform `index.json` ledger

use super::fs::write_atomic;
use crate::error::CrawlError;
use crate::platform::PlatformKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Summary of one stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub record_id: String,
    /// Record directory name, relative to the platform directory
    pub directory: String,
    pub title: String,
    pub author: String,
    pub preview: String,
    pub degraded: bool,
    pub updated_at: DateTime<Utc>,
}

/// Source id to record ledger for one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformIndex {
    pub platform: PlatformKind,
    pub last_updated: Option<DateTime<Utc>>,
    pub total: usize,
    #[serde(default)]
    pub entries: BTreeMap<String, IndexEntry>,
}

impl PlatformIndex {
    pub fn new(platform: PlatformKind) -> Self {
        Self {
            platform,
            last_updated: None,
            total: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Read an index file; a missing file yields an empty index
    ///
    /// An unreadable document is logged and replaced by an empty index, so one
    /// corrupt ledger cannot block every later write for the platform.
    pub async fn load(path: &Path, platform: PlatformKind) -> Result<Self, CrawlError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(platform)),
            Err(e) => return Err(CrawlError::storage(path, e)),
        };
        match serde_json::from_slice::<PlatformIndex>(&raw) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Ignoring unreadable platform index");
                Ok(Self::new(platform))
            }
        }
    }

    pub fn get(&self, source_id: &str) -> Option<&IndexEntry> {
        self.entries.get(source_id)
    }

    /// Insert or replace the live entry for a source id
    pub fn upsert(&mut self, source_id: impl Into<String>, entry: IndexEntry) {
        self.last_updated = Some(entry.updated_at);
        self.entries.insert(source_id.into(), entry);
        self.total = self.entries.len();
    }

    pub async fn save(&self, path: &Path) -> Result<(), CrawlError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| CrawlError::storage(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        write_atomic(path, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> IndexEntry {
        IndexEntry {
            record_id: "abc".to_string(),
            directory: format!("{}_abc", title),
            title: title.to_string(),
            author: "me".to_string(),
            preview: String::new(),
            degraded: false,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_entry_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut index = PlatformIndex::load(&path, PlatformKind::Zhihu).await.unwrap();
        assert_eq!(index.total, 0);
        index.upsert("question:1", entry("first"));
        index.upsert("question:1", entry("second"));
        index.save(&path).await.unwrap();

        let reloaded = PlatformIndex::load(&path, PlatformKind::Zhihu).await.unwrap();
        assert_eq!(reloaded.total, 1);
        assert_eq!(reloaded.get("question:1").unwrap().title, "second");
        assert!(reloaded.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_index_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{not json").unwrap();
        let index = PlatformIndex::load(&path, PlatformKind::Weibo).await.unwrap();
        assert!(index.entries.is_empty());
        assert_eq!(index.platform, PlatformKind::Weibo);
    }
}

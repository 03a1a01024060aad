//! On-disk record layout
//!
//! ```text
//! <destination>/<platform>/index.json
//! <destination>/<platform>/<safe_title>_<id12>/
//!     <safe_title>.txt
//!     <safe_title>.md | <safe_title>.html
//!     metadata.json
//!     images/  attachments/
//! ```
//!
//! A record is assembled in a staging directory and moved into place in one
//! rename. Rewrites of an existing record replace each file atomically.
//! Index updates for one platform directory are serialized by an async mutex.

mod fs;
mod index;

pub use self::fs::{is_staging_name, sanitize_title, write_atomic, StagingGuard, MAX_TITLE_CHARS};
pub use self::index::{IndexEntry, PlatformIndex};

use self::fs::remove_file_if_exists;
use crate::content::{MediaKind, NormalizedContent};
use crate::error::CrawlError;
use crate::platform::PlatformKind;
use crate::types::OutputFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const METADATA_FILE: &str = "metadata.json";
pub const INDEX_FILE: &str = "index.json";
/// Prefix of an asset directory being replaced by a rewrite
const RETIRED_PREFIX: &str = ".retired-";
/// Longest index preview, in characters
pub const PREVIEW_CHARS: usize = 200;

/// Rendering files of a record, relative to its directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFiles {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// What a persist call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Created,
    Rewritten,
    /// Record was already present and left untouched
    Existing,
}

/// A persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub record_id: String,
    pub directory: PathBuf,
    pub platform: PlatformKind,
    pub source_id: String,
    pub title: String,
    pub files: RecordFiles,
    pub status: RecordStatus,
}

/// Storage behavior for one persist call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOptions {
    pub output_format: OutputFormat,
    pub force_save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MediaEntry {
    url: String,
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Statistics {
    images_count: usize,
    attachments_count: usize,
    content_length: usize,
    markdown_length: usize,
}

/// `metadata.json` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RecordMetadata {
    record_id: String,
    platform: PlatformKind,
    source_id: String,
    source_url: String,
    title: String,
    author: String,
    degraded: bool,
    output_format: OutputFormat,
    fetched_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    files: RecordFiles,
    media: Vec<MediaEntry>,
    statistics: Statistics,
    #[serde(default)]
    extras: serde_json::Value,
}

impl RecordMetadata {
    fn build(
        content: &NormalizedContent,
        record_id: &str,
        files: &RecordFiles,
        output_format: OutputFormat,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: record_id.to_string(),
            platform: content.platform,
            source_id: content.source_id.clone(),
            source_url: content.source_url.clone(),
            title: content.title.clone(),
            author: content.author.clone(),
            degraded: content.degraded,
            output_format,
            fetched_at: content.fetched_at,
            created_at,
            updated_at: Utc::now(),
            files: files.clone(),
            media: content
                .media
                .iter()
                .map(|m| MediaEntry {
                    url: m.url.clone(),
                    role: m.role.clone(),
                    local_path: m.local_path.clone(),
                })
                .collect(),
            statistics: Statistics {
                images_count: content.resolved_count(MediaKind::Image),
                attachments_count: content.resolved_count(MediaKind::Video),
                content_length: content.text.chars().count(),
                markdown_length: content.markdown.chars().count(),
            },
            extras: content.extras.clone(),
        }
    }

    fn to_json(&self, path: &Path) -> Result<Vec<u8>, CrawlError> {
        serde_json::to_vec_pretty(self).map_err(|e| {
            CrawlError::storage(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    async fn load(path: &Path) -> Option<Self> {
        let raw = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

/// Stable 12-hex-digit id over platform, source id and title
pub fn record_id(platform: PlatformKind, source_id: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(platform.as_str());
    hasher.update("\n");
    hasher.update(source_id);
    hasher.update("\n");
    hasher.update(title);
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

/// `<destination>/<platform>`
pub fn platform_dir(destination: &Path, platform: PlatformKind) -> PathBuf {
    destination.join(platform.as_str())
}

/// Deterministic record directory for a content item
pub fn record_dir(destination: &Path, content: &NormalizedContent) -> PathBuf {
    let id = record_id(content.platform, &content.source_id, &content.title);
    platform_dir(destination, content.platform).join(format!("{}_{}", sanitize_title(&content.title), id))
}

fn record_files(safe_title: &str, format: OutputFormat) -> RecordFiles {
    RecordFiles {
        text: format!("{}.txt", safe_title),
        markdown: (format == OutputFormat::Markdown).then(|| format!("{}.md", safe_title)),
        html: (format == OutputFormat::Html).then(|| format!("{}.html", safe_title)),
    }
}

fn html_document(content: &NormalizedContent) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        crate::convert::escape_html(&content.title),
        content.html_with_local_paths()
    )
}

/// Owns the on-disk layout and the platform indexes
#[derive(Default)]
pub struct StorageManager {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl StorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn platform_lock(&self, platform_dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(platform_dir.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Record already stored for this content, if any
    pub async fn existing(
        &self,
        destination: &Path,
        content: &NormalizedContent,
    ) -> Option<StorageRecord> {
        let directory = record_dir(destination, content);
        let metadata = RecordMetadata::load(&directory.join(METADATA_FILE)).await?;
        Some(StorageRecord {
            record_id: metadata.record_id,
            directory,
            platform: metadata.platform,
            source_id: metadata.source_id,
            title: metadata.title,
            files: metadata.files,
            status: RecordStatus::Existing,
        })
    }

    /// Open a staging directory to download media into before [`commit`](Self::commit)
    pub async fn stage(
        &self,
        destination: &Path,
        platform: PlatformKind,
    ) -> Result<StagingGuard, CrawlError> {
        StagingGuard::create(&platform_dir(destination, platform)).await
    }

    /// Persist content without media downloads
    pub async fn persist(
        &self,
        content: &NormalizedContent,
        destination: &Path,
        options: PersistOptions,
    ) -> Result<StorageRecord, CrawlError> {
        if !options.force_save {
            if let Some(record) = self.existing(destination, content).await {
                debug!(dir = %record.directory.display(), "Record exists, skipping write");
                return Ok(record);
            }
        }
        let staging = self.stage(destination, content.platform).await?;
        self.commit(staging, content, destination, options).await
    }

    /// Write renderings into `staging` and move the record into place
    ///
    /// `staging` may already hold downloaded `images/` and `attachments/`.
    pub async fn commit(
        &self,
        staging: StagingGuard,
        content: &NormalizedContent,
        destination: &Path,
        options: PersistOptions,
    ) -> Result<StorageRecord, CrawlError> {
        let record_id = record_id(content.platform, &content.source_id, &content.title);
        let safe_title = sanitize_title(&content.title);
        let files = record_files(&safe_title, options.output_format);
        let platform_dir = platform_dir(destination, content.platform);
        let directory = platform_dir.join(format!("{}_{}", safe_title, record_id));

        write_file(&staging.path().join(&files.text), content.text.as_bytes()).await?;
        if let Some(name) = &files.markdown {
            write_file(
                &staging.path().join(name),
                content.markdown_with_local_paths().as_bytes(),
            )
            .await?;
        }
        if let Some(name) = &files.html {
            write_file(&staging.path().join(name), html_document(content).as_bytes()).await?;
        }

        let lock = self.platform_lock(&platform_dir);
        let _held = lock.lock().await;

        let existing = RecordMetadata::load(&directory.join(METADATA_FILE)).await;
        let exists = existing.is_some() || tokio::fs::metadata(&directory).await.is_ok();

        let status = if exists && !options.force_save {
            debug!(dir = %directory.display(), "Record exists, discarding staged write");
            return Ok(StorageRecord {
                record_id,
                directory,
                platform: content.platform,
                source_id: content.source_id.clone(),
                title: content.title.clone(),
                files: existing.map(|m| m.files).unwrap_or(files),
                status: RecordStatus::Existing,
            });
        } else if exists {
            let created_at = existing.map(|m| m.created_at).unwrap_or_else(Utc::now);
            let metadata =
                RecordMetadata::build(content, &record_id, &files, options.output_format, created_at);
            self.rewrite_in_place(staging, &directory, &files, &safe_title, &metadata)
                .await?;
            RecordStatus::Rewritten
        } else {
            let metadata =
                RecordMetadata::build(content, &record_id, &files, options.output_format, Utc::now());
            let metadata_path = staging.path().join(METADATA_FILE);
            write_file(&metadata_path, &metadata.to_json(&metadata_path)?).await?;
            tokio::fs::rename(staging.path(), &directory)
                .await
                .map_err(|e| CrawlError::storage(&directory, e))?;
            staging.commit();
            RecordStatus::Created
        };

        let index_path = platform_dir.join(INDEX_FILE);
        let mut index = PlatformIndex::load(&index_path, content.platform).await?;
        index.upsert(
            content.source_id.clone(),
            IndexEntry {
                record_id: record_id.clone(),
                directory: format!("{}_{}", safe_title, record_id),
                title: content.title.clone(),
                author: content.author.clone(),
                preview: content.preview(PREVIEW_CHARS),
                degraded: content.degraded,
                updated_at: Utc::now(),
            },
        );
        index.save(&index_path).await?;

        info!(
            platform = %content.platform,
            source_id = %content.source_id,
            dir = %directory.display(),
            ?status,
            "Persisted record"
        );
        Ok(StorageRecord {
            record_id,
            directory,
            platform: content.platform,
            source_id: content.source_id.clone(),
            title: content.title.clone(),
            files,
            status,
        })
    }

    /// Replace an existing record's files one by one from `staging`
    async fn rewrite_in_place(
        &self,
        staging: StagingGuard,
        directory: &Path,
        files: &RecordFiles,
        safe_title: &str,
        metadata: &RecordMetadata,
    ) -> Result<(), CrawlError> {
        let rendered = [Some(&files.text), files.markdown.as_ref(), files.html.as_ref()];
        for name in rendered.into_iter().flatten() {
            let target = directory.join(name);
            tokio::fs::rename(staging.path().join(name), &target)
                .await
                .map_err(|e| CrawlError::storage(&target, e))?;
        }
        // Renderings of formats no longer requested
        for ext in ["md", "html"] {
            let name = format!("{}.{}", safe_title, ext);
            if !rendered.iter().flatten().any(|f| **f == name) {
                remove_file_if_exists(&directory.join(&name)).await?;
            }
        }

        let staging = swap_asset_dirs(staging, directory).await?;

        let metadata_path = directory.join(METADATA_FILE);
        write_atomic(&metadata_path, &metadata.to_json(&metadata_path)?).await?;
        // Staging is now empty; dropping the guard removes it
        drop(staging);
        Ok(())
    }

    /// Platform index under `destination`
    pub async fn load_index(
        &self,
        destination: &Path,
        platform: PlatformKind,
    ) -> Result<PlatformIndex, CrawlError> {
        PlatformIndex::load(&platform_dir(destination, platform).join(INDEX_FILE), platform).await
    }

    /// Index entry for one source id
    pub async fn lookup(
        &self,
        destination: &Path,
        platform: PlatformKind,
        source_id: &str,
    ) -> Result<Option<IndexEntry>, CrawlError> {
        let index = self.load_index(destination, platform).await?;
        Ok(index.get(source_id).cloned())
    }
}

/// Replace the record's asset directories with the staged ones
///
/// The swap runs to completion on a blocking thread that owns `staging`, so
/// cancelling the caller cannot leave the record between the two renames.
async fn swap_asset_dirs(staging: StagingGuard, directory: &Path) -> Result<StagingGuard, CrawlError> {
    let target = directory.to_path_buf();
    let task = tokio::task::spawn_blocking(move || {
        let result = swap_asset_dirs_blocking(staging.path(), &target);
        (staging, result)
    });
    match task.await {
        Ok((staging, result)) => result.map(|()| staging),
        Err(e) => Err(CrawlError::storage(
            directory,
            std::io::Error::new(std::io::ErrorKind::Other, e),
        )),
    }
}

fn swap_asset_dirs_blocking(staging: &Path, directory: &Path) -> Result<(), CrawlError> {
    for kind in [MediaKind::Image, MediaKind::Video] {
        let fresh = staging.join(kind.subdir());
        let current = directory.join(kind.subdir());
        let retired = directory.join(format!("{}{}-{}", RETIRED_PREFIX, kind.subdir(), Uuid::new_v4().simple()));

        let had_current = current.is_dir();
        if had_current {
            std::fs::rename(&current, &retired).map_err(|e| CrawlError::storage(&current, e))?;
        }
        if fresh.is_dir() {
            if let Err(e) = std::fs::rename(&fresh, &current) {
                if had_current {
                    if let Err(restore) = std::fs::rename(&retired, &current) {
                        warn!(dir = %current.display(), error = %restore, "Could not restore asset directory");
                    }
                }
                return Err(CrawlError::storage(&current, e));
            }
        }
        if had_current {
            if let Err(e) = std::fs::remove_dir_all(&retired) {
                warn!(dir = %retired.display(), error = %e, "Could not remove retired asset directory");
            }
        }
    }
    Ok(())
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), CrawlError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| CrawlError::storage(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MediaReference;

    fn content(title: &str) -> NormalizedContent {
        NormalizedContent {
            platform: PlatformKind::Zhihu,
            source_id: "question:42".to_string(),
            source_url: "https://www.zhihu.com/question/42".to_string(),
            title: title.to_string(),
            author: "zhihu user".to_string(),
            text: "body text".to_string(),
            markdown: "# T\n\n![](https://pic.example/a.jpg)".to_string(),
            html: "<p>body</p>".to_string(),
            media: vec![MediaReference::new(
                "https://pic.example/a.jpg",
                "question image",
                MediaKind::Image,
            )],
            extras: serde_json::json!({"answers": []}),
            degraded: false,
            fetched_at: Utc::now(),
        }
    }

    fn options(format: OutputFormat, force_save: bool) -> PersistOptions {
        PersistOptions {
            output_format: format,
            force_save,
        }
    }

    #[test]
    fn test_record_dir_is_deterministic() {
        let a = record_dir(Path::new("/data"), &content("What: is it?"));
        let b = record_dir(Path::new("/data"), &content("What: is it?"));
        assert_eq!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("What_ is it_"));
        assert_eq!(name.len(), "What_ is it_".len() + 12);
        assert!(a.starts_with("/data/zhihu"));
    }

    #[tokio::test]
    async fn test_persist_creates_layout() {
        let dest = tempfile::tempdir().unwrap();
        let storage = StorageManager::new();
        let record = storage
            .persist(&content("Title"), dest.path(), options(OutputFormat::Markdown, true))
            .await
            .unwrap();

        assert_eq!(record.status, RecordStatus::Created);
        assert!(record.directory.join("Title.txt").exists());
        assert!(record.directory.join("Title.md").exists());
        assert!(!record.directory.join("Title.html").exists());

        let meta: serde_json::Value =
            serde_json::from_slice(&std::fs::read(record.directory.join(METADATA_FILE)).unwrap()).unwrap();
        assert_eq!(meta["source_id"], "question:42");
        assert_eq!(meta["degraded"], false);
        assert_eq!(meta["statistics"]["images_count"], 0);

        let entry = storage
            .lookup(dest.path(), PlatformKind::Zhihu, "question:42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.record_id, record.record_id);
        assert_eq!(entry.preview, "body text");

        let leftovers: Vec<_> = std::fs::read_dir(dest.path().join("zhihu"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| is_staging_name(n))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_persist_without_force_does_not_rewrite() {
        let dest = tempfile::tempdir().unwrap();
        let storage = StorageManager::new();
        let item = content("Stable");
        let first = storage
            .persist(&item, dest.path(), options(OutputFormat::Markdown, false))
            .await
            .unwrap();
        let text_path = first.directory.join(&first.files.text);
        let meta_path = first.directory.join(METADATA_FILE);
        let before = (
            std::fs::metadata(&text_path).unwrap().modified().unwrap(),
            std::fs::metadata(&meta_path).unwrap().modified().unwrap(),
            std::fs::read(&meta_path).unwrap(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = storage
            .persist(&item, dest.path(), options(OutputFormat::Markdown, false))
            .await
            .unwrap();

        assert_eq!(second.status, RecordStatus::Existing);
        assert_eq!(second.directory, first.directory);
        assert_eq!(second.files, first.files);
        let after = (
            std::fs::metadata(&text_path).unwrap().modified().unwrap(),
            std::fs::metadata(&meta_path).unwrap().modified().unwrap(),
            std::fs::read(&meta_path).unwrap(),
        );
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_force_save_rewrites_and_drops_stale_format() {
        let dest = tempfile::tempdir().unwrap();
        let storage = StorageManager::new();
        let mut item = content("Edited");
        let first = storage
            .persist(&item, dest.path(), options(OutputFormat::Markdown, true))
            .await
            .unwrap();
        std::fs::create_dir_all(first.directory.join("images")).unwrap();
        std::fs::write(first.directory.join("images/old.jpg"), b"old").unwrap();

        item.text = "new body".to_string();
        let second = storage
            .persist(&item, dest.path(), options(OutputFormat::Html, true))
            .await
            .unwrap();

        assert_eq!(second.status, RecordStatus::Rewritten);
        assert_eq!(second.directory, first.directory);
        assert_eq!(
            std::fs::read_to_string(second.directory.join("Edited.txt")).unwrap(),
            "new body"
        );
        assert!(second.directory.join("Edited.html").exists());
        assert!(!second.directory.join("Edited.md").exists());
        assert!(!second.directory.join("images").exists());

        let index = storage.load_index(dest.path(), PlatformKind::Zhihu).await.unwrap();
        assert_eq!(index.total, 1);
    }

    #[tokio::test]
    async fn test_commit_moves_staged_media() {
        let dest = tempfile::tempdir().unwrap();
        let storage = StorageManager::new();
        let mut item = content("With media");

        let staging = storage.stage(dest.path(), PlatformKind::Zhihu).await.unwrap();
        std::fs::create_dir_all(staging.path().join("images")).unwrap();
        std::fs::write(staging.path().join("images/a.jpg"), b"jpg").unwrap();
        item.media[0].local_path = Some("images/a.jpg".to_string());

        let record = storage
            .commit(staging, &item, dest.path(), options(OutputFormat::Markdown, true))
            .await
            .unwrap();
        assert!(record.directory.join("images/a.jpg").exists());
        let md = std::fs::read_to_string(record.directory.join("With media.md")).unwrap();
        assert!(md.contains("](images/a.jpg)"));
    }

    #[tokio::test]
    async fn test_html_output_points_at_downloaded_images() {
        let dest = tempfile::tempdir().unwrap();
        let storage = StorageManager::new();
        let mut item = content("Gallery");
        item.html = r#"<p>intro</p><img data-src="https://pic.example/a.jpg" src="data:image/gif;base64,xx"><img src="/rel.png">"#.to_string();
        item.media = vec![
            MediaReference::new("https://pic.example/a.jpg", "question image", MediaKind::Image),
            MediaReference::new("https://www.zhihu.com/rel.png", "question image", MediaKind::Image),
        ];

        let staging = storage.stage(dest.path(), PlatformKind::Zhihu).await.unwrap();
        std::fs::create_dir_all(staging.path().join("images")).unwrap();
        std::fs::write(staging.path().join("images/a.jpg"), b"jpg").unwrap();
        std::fs::write(staging.path().join("images/rel.png"), b"png").unwrap();
        item.media[0].local_path = Some("images/a.jpg".to_string());
        item.media[1].local_path = Some("images/rel.png".to_string());

        let record = storage
            .commit(staging, &item, dest.path(), options(OutputFormat::Html, true))
            .await
            .unwrap();
        let html = std::fs::read_to_string(record.directory.join("Gallery.html")).unwrap();
        assert!(html.contains(r#"<img src="images/a.jpg">"#), "{}", html);
        assert!(html.contains(r#"<img src="images/rel.png">"#), "{}", html);
        assert!(!html.contains("data:image"));
        assert!(record.directory.join("images/rel.png").exists());
    }

    #[tokio::test]
    async fn test_cancelled_rewrite_keeps_asset_directory() {
        let dest = tempfile::tempdir().unwrap();
        let storage = StorageManager::new();
        let item = content("Swapped");
        let first = storage
            .persist(&item, dest.path(), options(OutputFormat::Text, true))
            .await
            .unwrap();
        std::fs::create_dir_all(first.directory.join("images")).unwrap();
        std::fs::write(first.directory.join("images/a.jpg"), b"old").unwrap();

        // Drop the rewrite after every possible number of polls
        for polls in 1..40 {
            let staging = storage.stage(dest.path(), PlatformKind::Zhihu).await.unwrap();
            std::fs::create_dir_all(staging.path().join("images")).unwrap();
            std::fs::write(staging.path().join("images/a.jpg"), b"new").unwrap();
            {
                let mut rewrite = Box::pin(storage.commit(
                    staging,
                    &item,
                    dest.path(),
                    options(OutputFormat::Text, true),
                ));
                for _ in 0..polls {
                    if futures::poll!(rewrite.as_mut()).is_ready() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;

            assert!(
                first.directory.join("images/a.jpg").exists(),
                "images missing after {} polls",
                polls
            );
            let retired = std::fs::read_dir(&first.directory)
                .unwrap()
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with(RETIRED_PREFIX))
                .count();
            assert_eq!(retired, 0, "retired directory left after {} polls", polls);
        }
    }

    #[tokio::test]
    async fn test_concurrent_persist_keeps_every_index_entry() {
        let dest = tempfile::tempdir().unwrap();
        let storage = Arc::new(StorageManager::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let storage = storage.clone();
            let root = dest.path().to_path_buf();
            handles.push(tokio::spawn(async move {
                let mut item = content(&format!("Item {}", i));
                item.source_id = format!("question:{}", i);
                storage
                    .persist(&item, &root, options(OutputFormat::Text, true))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let index = storage.load_index(dest.path(), PlatformKind::Zhihu).await.unwrap();
        assert_eq!(index.total, 8);
    }
}

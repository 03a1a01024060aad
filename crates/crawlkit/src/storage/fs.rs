//! Filesystem helpers: atomic replace, title sanitizing, staging directories

use crate::error::CrawlError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest sanitized title, in characters
pub const MAX_TITLE_CHARS: usize = 50;

const STAGING_PREFIX: &str = ".staging-";

/// Make a title safe to use as a file and directory name
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => ' ',
            c => c,
        })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    let mut last = None;
    for c in replaced.chars() {
        if (c == ' ' || c == '_') && last == Some(c) {
            continue;
        }
        collapsed.push(c);
        last = Some(c);
    }

    let capped: String = collapsed
        .trim_matches(|c| c == ' ' || c == '.' || c == '_')
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let trimmed = capped.trim_end_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CrawlError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| CrawlError::storage(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CrawlError::storage(path, e));
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub async fn remove_file_if_exists(path: &Path) -> Result<(), CrawlError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CrawlError::storage(path, e)),
    }
}

/// Scratch directory a record is assembled in
///
/// Dropping the guard without [`commit`](Self::commit) deletes the directory,
/// so errors, timeouts and cancelled fetches leave nothing behind.
#[derive(Debug)]
pub struct StagingGuard {
    path: PathBuf,
    committed: bool,
}

impl StagingGuard {
    /// Create a fresh `.staging-<uuid>` directory under `parent`
    pub async fn create(parent: &Path) -> Result<Self, CrawlError> {
        let path = parent.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| CrawlError::storage(&path, e))?;
        debug!(dir = %path.display(), "Created staging directory");
        Ok(Self {
            path,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory; the caller has moved it or its contents into place
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(dir = %self.path.display(), "Removed staging directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.path.display(), error = %e, "Failed to remove staging directory"),
        }
    }
}

/// True for names produced by [`StagingGuard`]
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

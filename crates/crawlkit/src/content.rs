//! Normalized content record produced by every provider

use crate::platform::PlatformKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Kind of binary asset a reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    /// Asset subdirectory inside a record directory
    pub fn subdir(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "attachments",
        }
    }

    /// Extension used when the URL carries none
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

/// A binary asset referenced by normalized content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Absolute remote URL
    pub url: String,
    /// Logical role, e.g. "question image" or "answer 2 image"
    pub role: String,
    #[serde(default)]
    pub kind: MediaKind,
    /// Path relative to the record directory, set once downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

impl MediaReference {
    pub fn new(url: impl Into<String>, role: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            role: role.into(),
            kind,
            local_path: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.local_path.is_some()
    }
}

/// Uniform record for one fetched item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedContent {
    pub platform: PlatformKind,
    /// Stable identifier within the platform (e.g. `question:123`)
    pub source_id: String,
    pub source_url: String,
    pub title: String,
    pub author: String,
    /// Plain text body
    pub text: String,
    /// Markdown body referencing media by remote URL
    pub markdown: String,
    /// Extracted body markup, used for the html rendering
    #[serde(default)]
    pub html: String,
    /// Media in document order, unique by remote URL
    #[serde(default)]
    pub media: Vec<MediaReference>,
    /// Platform-specific structured data (answers, posts, tags)
    #[serde(default)]
    pub extras: serde_json::Value,
    /// Produced by the degraded (plain HTTP) path
    #[serde(default)]
    pub degraded: bool,
    pub fetched_at: DateTime<Utc>,
}

impl NormalizedContent {
    /// Markdown with every resolved media URL replaced by its local path
    ///
    /// Unresolved references keep their remote URL.
    pub fn markdown_with_local_paths(&self) -> String {
        let mut markdown = self.markdown.clone();
        for media in &self.media {
            if let Some(local) = &media.local_path {
                markdown = markdown.replace(&format!("]({})", media.url), &format!("]({})", local));
            }
        }
        markdown
    }

    /// Body markup with every resolved image and video pointing at its local path
    ///
    /// Media elements are matched by the URL extraction resolved them to, so
    /// lazy-loading attributes and relative sources are handled. Unresolved
    /// references keep their remote URL.
    pub fn html_with_local_paths(&self) -> String {
        let local: HashMap<String, String> = self
            .media
            .iter()
            .filter_map(|m| m.local_path.as_ref().map(|path| (m.url.clone(), path.clone())))
            .collect();
        match Url::parse(&self.source_url) {
            Ok(base) if !local.is_empty() => crate::convert::rewrite_media_sources(&self.html, &base, &local),
            _ => self.html.clone(),
        }
    }

    /// Number of resolved assets of the given kind
    pub fn resolved_count(&self, kind: MediaKind) -> usize {
        self.media
            .iter()
            .filter(|m| m.kind == kind && m.is_resolved())
            .count()
    }

    /// Short plain-text excerpt, at most `max_chars` characters
    pub fn preview(&self, max_chars: usize) -> String {
        let flat: String = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        flat.chars().take(max_chars).collect()
    }
}

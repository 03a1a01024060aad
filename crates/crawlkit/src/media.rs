//! Media asset downloads
//!
//! Assets are streamed to `<name>.part` under a byte cap and renamed into
//! place when complete. A skipped asset never leaves a file behind and never
//! fails the surrounding fetch.

use crate::config::CrawlerConfig;
use crate::content::MediaReference;
use futures::stream::{self, StreamExt};
use reqwest::header::{CONTENT_LENGTH, REFERER};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

/// Longest file stem kept from a URL
const MAX_STEM_CHARS: usize = 80;

/// Why an asset was not downloaded
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSkip {
    #[error("asset exceeds the {limit} byte cap")]
    TooLarge { limit: u64 },

    #[error("server answered HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("download timed out")]
    Timeout,

    #[error("network error: {message}")]
    Network { message: String },

    #[error("file error: {message}")]
    Io { message: String },
}

impl MediaSkip {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MediaSkip::Timeout
        } else {
            MediaSkip::Network {
                message: err.to_string(),
            }
        }
    }

    fn io(err: std::io::Error) -> Self {
        MediaSkip::Io {
            message: err.to_string(),
        }
    }
}

/// A reference that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMedia {
    pub url: String,
    pub role: String,
    pub reason: MediaSkip,
}

/// Aggregate outcome of downloading one content item's assets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReport {
    pub total: usize,
    pub downloaded: usize,
    #[serde(default)]
    pub skipped: Vec<SkippedMedia>,
}

impl MediaReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Downloads assets into a record directory
#[derive(Clone)]
pub struct MediaDownloader {
    client: reqwest::Client,
    max_bytes: u64,
    timeout: Duration,
    concurrency: usize,
}

impl MediaDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self::from_config(client, &CrawlerConfig::default())
    }

    pub fn from_config(client: reqwest::Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            max_bytes: config.max_media_bytes,
            timeout: config.media_timeout,
            concurrency: config.media_concurrency.max(1),
        }
    }

    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Download every reference into `record_dir`, filling in `local_path`
    ///
    /// File names are reserved up front in reference order, so collision
    /// suffixes do not depend on which download finishes first.
    pub async fn download_all(
        &self,
        media: &mut [MediaReference],
        record_dir: &Path,
        referer: Option<&str>,
    ) -> MediaReport {
        let names = reserve_file_names(media);
        let jobs: Vec<(usize, MediaReference, String)> = media
            .iter()
            .cloned()
            .zip(names)
            .enumerate()
            .map(|(index, (reference, name))| (index, reference, name))
            .collect();

        let mut outcomes: Vec<(usize, Result<String, MediaSkip>)> = stream::iter(jobs)
            .map(|(index, reference, name)| async move {
                let outcome = self.download(&reference, record_dir, &name, referer).await;
                (index, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = MediaReport {
            total: media.len(),
            ..Default::default()
        };
        for (index, outcome) in outcomes {
            let reference = &mut media[index];
            match outcome {
                Ok(local_path) => {
                    reference.local_path = Some(local_path);
                    report.downloaded += 1;
                }
                Err(reason) => {
                    warn!(url = %reference.url, role = %reference.role, %reason, "Skipped media asset");
                    report.skipped.push(SkippedMedia {
                        url: reference.url.clone(),
                        role: reference.role.clone(),
                        reason,
                    });
                }
            }
        }
        debug!(
            total = report.total,
            downloaded = report.downloaded,
            skipped = report.skipped.len(),
            "Media download finished"
        );
        report
    }

    /// Download one asset as `<record_dir>/<subdir>/<file_name>`
    ///
    /// Returns the path relative to `record_dir`.
    pub async fn download(
        &self,
        reference: &MediaReference,
        record_dir: &Path,
        file_name: &str,
        referer: Option<&str>,
    ) -> Result<String, MediaSkip> {
        let subdir = reference.kind.subdir();
        let dir = record_dir.join(subdir);
        tokio::fs::create_dir_all(&dir).await.map_err(MediaSkip::io)?;

        let target = dir.join(file_name);
        let partial = dir.join(format!("{}.part", file_name));

        let result = match tokio::time::timeout(
            self.timeout,
            self.stream_to(&reference.url, &partial, referer),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MediaSkip::Timeout),
        };

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &target)
                    .await
                    .map_err(MediaSkip::io)?;
                debug!(url = %reference.url, bytes, file = %target.display(), "Downloaded media asset");
                Ok(format!("{}/{}", subdir, file_name))
            }
            Err(skip) => {
                remove_partial(&partial).await;
                Err(skip)
            }
        }
    }

    async fn stream_to(
        &self,
        url: &str,
        partial: &Path,
        referer: Option<&str>,
    ) -> Result<u64, MediaSkip> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        let response = request.send().await.map_err(MediaSkip::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaSkip::HttpStatus {
                status: status.as_u16(),
            });
        }

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(MediaSkip::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(MediaSkip::io)?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(MediaSkip::from_reqwest)?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(MediaSkip::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await.map_err(MediaSkip::io)?;
        }
        file.flush().await.map_err(MediaSkip::io)?;
        Ok(written)
    }
}

async fn remove_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %partial.display(), error = %e, "Failed to remove partial download"),
    }
}

/// Pick a collision-free file name for every reference, in order
pub fn reserve_file_names(media: &[MediaReference]) -> Vec<String> {
    let mut used: HashSet<(String, String)> = HashSet::new();
    media
        .iter()
        .enumerate()
        .map(|(index, reference)| {
            let (stem, ext) = url_file_name(&reference.url)
                .unwrap_or_else(|| (format!("{}_{}", slug(&reference.role), index + 1), String::new()));
            let ext = if ext.is_empty() {
                reference.kind.default_extension().to_string()
            } else {
                ext
            };
            let subdir = reference.kind.subdir().to_string();

            let mut candidate = format!("{}.{}", stem, ext);
            let mut suffix = 0;
            while !used.insert((subdir.clone(), candidate.to_lowercase())) {
                suffix += 1;
                candidate = format!("{}_{}.{}", stem, suffix, ext);
            }
            candidate
        })
        .collect()
}

/// Sanitized `(stem, extension)` from the last path segment
fn url_file_name(raw: &str) -> Option<(String, String)> {
    let url = Url::parse(raw).ok()?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (stem, ext) = match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_extension(ext) => (stem, ext.to_lowercase()),
        _ => (segment, String::new()),
    };
    let stem: String = sanitize(stem).chars().take(MAX_STEM_CHARS).collect();
    if stem.is_empty() {
        None
    } else {
        Some((stem, ext))
    }
}

fn is_extension(ext: &str) -> bool {
    (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    mapped.trim_matches('_').to_string()
}

fn slug(role: &str) -> String {
    let slug = sanitize(&role.split_whitespace().collect::<Vec<_>>().join("_"));
    if slug.is_empty() {
        "media".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MediaKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image(url: &str) -> MediaReference {
        MediaReference::new(url, "body image", MediaKind::Image)
    }

    #[test]
    fn test_reserved_names_are_deterministic() {
        let media = vec![
            image("https://img.example.com/a/photo.JPG"),
            image("https://img.example.com/b/photo.jpg"),
            image("https://img.example.com/c/photo.jpg?x=1"),
            image("https://mmbiz.qpic.cn/mmbiz_png/x/640?wx_fmt=png"),
            image("https://img.example.com/"),
            MediaReference::new("https://v.example.com/clip", "post 1 video", MediaKind::Video),
        ];
        let names = reserve_file_names(&media);
        assert_eq!(
            names,
            vec![
                "photo.jpg",
                "photo_1.jpg",
                "photo_2.jpg",
                "640.jpg",
                "body_image_5.jpg",
                "clip.mp4",
            ]
        );
        assert_eq!(reserve_file_names(&media), names);
    }

    #[test]
    fn test_same_name_in_different_subdirs_is_allowed() {
        let media = vec![
            image("https://x.example.com/a.bin"),
            MediaReference::new("https://x.example.com/a.bin", "clip", MediaKind::Video),
        ];
        assert_eq!(reserve_file_names(&media), vec!["a.bin", "a.bin"]);
    }

    #[tokio::test]
    async fn test_download_all_skips_oversized_and_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/one.png"))
            .and(header("referer", "https://zhuanlan.zhihu.com/p/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 16]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/big.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/leech.png"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader = MediaDownloader::new(reqwest::Client::new()).max_bytes(1024);
        let mut media = vec![
            image(&format!("{}/one.png", server.uri())),
            image(&format!("{}/big.png", server.uri())),
            image(&format!("{}/leech.png", server.uri())),
        ];
        let report = downloader
            .download_all(&mut media, dir.path(), Some("https://zhuanlan.zhihu.com/p/1"))
            .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].reason, MediaSkip::TooLarge { limit: 1024 });
        assert_eq!(report.skipped[1].reason, MediaSkip::HttpStatus { status: 403 });

        assert_eq!(media[0].local_path.as_deref(), Some("images/one.png"));
        assert!(media[1].local_path.is_none());
        assert_eq!(std::fs::read(dir.path().join("images/one.png")).unwrap().len(), 16);
        assert!(!dir.path().join("images/big.png").exists());
        assert!(!dir.path().join("images/big.png.part").exists());
    }

    #[tokio::test]
    async fn test_slow_asset_times_out_without_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8; 8])
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader =
            MediaDownloader::new(reqwest::Client::new()).timeout(Duration::from_millis(50));
        let reference = image(&format!("{}/slow.jpg", server.uri()));
        let err = downloader
            .download(&reference, dir.path(), "slow.jpg", None)
            .await
            .unwrap_err();
        assert_eq!(err, MediaSkip::Timeout);
        assert!(!dir.path().join("images/slow.jpg.part").exists());
    }

    #[test]
    fn test_skip_serializes_with_kind_tag() {
        let value = serde_json::to_value(MediaSkip::HttpStatus { status: 403 }).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "http_status", "status": 403}));
    }
}

//! Request and result types

use crate::content::NormalizedContent;
use crate::error::{CrawlError, ErrorKind};
use crate::media::MediaReport;
use crate::platform::PlatformKind;
use crate::storage::StorageRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of sub-items (answers, posts, notes) kept per target
pub const DEFAULT_MAX_ITEMS: usize = 3;

/// Rendering written to the record directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single browser cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Credential bundle supplied with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// Structured cookie list as exported by a browser
    Cookies(Vec<Cookie>),
    /// Raw `name=value; name2=value2` header string
    Header(String),
}

impl Credentials {
    /// Format as a `Cookie` header value, `None` if nothing usable remains
    pub fn cookie_header(&self) -> Option<String> {
        let header = match self {
            Credentials::Cookies(cookies) => cookies
                .iter()
                .filter(|c| !c.name.is_empty())
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
            Credentials::Header(raw) => raw.trim().to_string(),
        };
        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }
}

/// Fetch request
///
/// Built once with the chained setters and then passed by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// URL or pseudo-URL token (e.g. `xhs_keyword:coffee`)
    pub target: String,
    /// Storage root; the crawler's configured download dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub save_images: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_true")]
    pub force_save: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

fn default_true() -> bool {
    true
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

impl FetchRequest {
    /// Create a new request with default flags
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            destination: None,
            save_images: true,
            output_format: OutputFormat::default(),
            max_items: DEFAULT_MAX_ITEMS,
            force_save: true,
            credentials: None,
        }
    }

    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    pub fn save_images(mut self, save: bool) -> Self {
        self.save_images = save;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn force_save(mut self, force: bool) -> Self {
        self.force_save = force;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Cookie header derived from the credential bundle
    pub fn cookie_header(&self) -> Option<String> {
        self.credentials.as_ref().and_then(Credentials::cookie_header)
    }

    /// Validate request fields before routing
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.target.trim().is_empty() {
            return Err(CrawlError::InvalidRequest("target is empty".to_string()));
        }
        if self.max_items == 0 {
            return Err(CrawlError::InvalidRequest(
                "max_items must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Failure or warning reported in a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchIssue {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CrawlError> for FetchIssue {
    fn from(err: &CrawlError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a single fetch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchResult {
    pub target: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformKind>,
    pub from_cache: bool,
    pub degraded: bool,
    /// Effective value after degradation
    pub save_images: bool,
    /// Effective value after degradation
    pub output_format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<NormalizedContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<StorageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FetchIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchIssue>,
    pub elapsed_ms: u64,
}

impl FetchResult {
    /// Build a failed result
    pub fn failure(
        request: &FetchRequest,
        platform: Option<PlatformKind>,
        err: &CrawlError,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            target: request.target.clone(),
            success: false,
            platform,
            save_images: request.save_images,
            output_format: request.output_format,
            error: Some(FetchIssue::from(err)),
            elapsed_ms,
            ..Default::default()
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Aggregate counts for a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// Fraction in `0.0..=1.0`
    pub success_rate: f64,
}

impl BatchSummary {
    pub fn from_results(results: &[FetchResult]) -> Self {
        let total = results.len();
        let success = results.iter().filter(|r| r.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            success as f64 / total as f64
        };
        Self {
            total,
            success,
            failed: total - success,
            success_rate,
        }
    }
}

/// Outcome of a batch, one result per input in input order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<FetchResult>,
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_request_defaults() {
        let req = FetchRequest::new("https://zhuanlan.zhihu.com/p/1");
        assert!(req.save_images);
        assert!(req.force_save);
        assert_eq!(req.output_format, OutputFormat::Markdown);
        assert_eq!(req.max_items, 3);
        assert!(req.destination.is_none());
    }

    #[test]
    fn test_fetch_request_builder() {
        let req = FetchRequest::new("xhs_keyword:coffee")
            .destination("/tmp/out")
            .save_images(false)
            .output_format(OutputFormat::Html)
            .max_items(5)
            .force_save(false);
        assert_eq!(req.destination, Some(PathBuf::from("/tmp/out")));
        assert!(!req.save_images);
        assert_eq!(req.output_format, OutputFormat::Html);
        assert_eq!(req.max_items, 5);
        assert!(!req.force_save);
    }

    #[test]
    fn test_fetch_request_deserialize_defaults() {
        let req: FetchRequest = serde_json::from_str(r#"{"target": "https://b23.tv/BV1xx"}"#).unwrap();
        assert!(req.save_images);
        assert!(req.force_save);
        assert_eq!(req.max_items, 3);
        assert_eq!(req.output_format, OutputFormat::Markdown);
    }

    #[test]
    fn test_validate() {
        assert!(FetchRequest::new("  ").validate().is_err());
        assert!(FetchRequest::new("x").max_items(0).validate().is_err());
        assert!(FetchRequest::new("x").validate().is_ok());
    }

    #[test]
    fn test_cookie_header_drops_nameless() {
        let creds = Credentials::Cookies(vec![
            Cookie {
                name: "a1".into(),
                value: "x".into(),
            },
            Cookie {
                name: String::new(),
                value: "orphan".into(),
            },
            Cookie {
                name: "web_session".into(),
                value: "y".into(),
            },
        ]);
        assert_eq!(creds.cookie_header().as_deref(), Some("a1=x; web_session=y"));
        assert_eq!(Credentials::Header("  ".into()).cookie_header(), None);
    }

    #[test]
    fn test_credentials_untagged() {
        let creds: Credentials = serde_json::from_str(r#"[{"name":"a","value":"b"}]"#).unwrap();
        assert_eq!(creds.cookie_header().as_deref(), Some("a=b"));
        let creds: Credentials = serde_json::from_str(r#""a=b; c=d""#).unwrap();
        assert_eq!(creds.cookie_header().as_deref(), Some("a=b; c=d"));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("pdf".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_batch_summary() {
        let ok = FetchResult {
            success: true,
            ..Default::default()
        };
        let failed = FetchResult::default();
        let summary = BatchSummary::from_results(&[ok.clone(), failed, ok]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failed, 1);
        assert!((summary.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(BatchSummary::from_results(&[]).success_rate, 0.0);
    }
}

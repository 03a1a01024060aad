//! Supported platforms

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of platforms a target can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Q&A pages and column articles
    Zhihu,
    /// Microblog search results
    Weibo,
    /// Official-account articles
    Weixin,
    /// Note keyword search and note pages
    Xiaohongshu,
    /// Video metadata pages
    Bilibili,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 5] = [
        PlatformKind::Zhihu,
        PlatformKind::Weibo,
        PlatformKind::Weixin,
        PlatformKind::Xiaohongshu,
        PlatformKind::Bilibili,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Zhihu => "zhihu",
            PlatformKind::Weibo => "weibo",
            PlatformKind::Weixin => "weixin",
            PlatformKind::Xiaohongshu => "xiaohongshu",
            PlatformKind::Bilibili => "bilibili",
        }
    }

    /// Whether fetching needs an authenticated session when no cookies are supplied
    pub fn requires_login(&self) -> bool {
        matches!(self, PlatformKind::Xiaohongshu)
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zhihu" => Ok(PlatformKind::Zhihu),
            "weibo" => Ok(PlatformKind::Weibo),
            "weixin" => Ok(PlatformKind::Weixin),
            "xiaohongshu" | "xhs" => Ok(PlatformKind::Xiaohongshu),
            "bilibili" => Ok(PlatformKind::Bilibili),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_str() {
        assert_eq!(PlatformKind::from_str("zhihu").unwrap(), PlatformKind::Zhihu);
        assert_eq!(PlatformKind::from_str("WEIBO").unwrap(), PlatformKind::Weibo);
        assert_eq!(
            PlatformKind::from_str("xhs").unwrap(),
            PlatformKind::Xiaohongshu
        );
        assert!(PlatformKind::from_str("douyin").is_err());
    }

    #[test]
    fn test_platform_display_roundtrip() {
        for platform in PlatformKind::ALL {
            assert_eq!(
                PlatformKind::from_str(&platform.to_string()).unwrap(),
                platform
            );
        }
    }

    #[test]
    fn test_requires_login() {
        assert!(PlatformKind::Xiaohongshu.requires_login());
        assert!(!PlatformKind::Zhihu.requires_login());
        assert!(!PlatformKind::Bilibili.requires_login());
    }
}

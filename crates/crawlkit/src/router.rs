//! Target routing
//!
//! Design: a static, ordered route table. URL targets are matched by exact
//! host and path shape; non-URL targets by pseudo-URL prefix. The first match
//! wins. The router holds no mutable state and is safe to share.

use crate::error::CrawlError;
use crate::platform::PlatformKind;
use crate::providers::{
    BilibiliProvider, Provider, WeiboProvider, WeixinProvider, XiaohongshuProvider, ZhihuProvider,
};
use serde::Serialize;
use url::Url;

/// Prefix of the keyword-search pseudo-URL
pub const XHS_KEYWORD_PREFIX: &str = "xhs_keyword:";

/// A URL route: exact hosts plus a path-shape matcher
struct Route {
    platform: PlatformKind,
    hosts: &'static [&'static str],
    example: &'static str,
    matcher: fn(&Url) -> Option<Provider>,
}

/// A pseudo-URL route: `prefix` followed by a value
struct PseudoRoute {
    platform: PlatformKind,
    prefix: &'static str,
    example: &'static str,
    build: fn(&str) -> Provider,
}

const ROUTES: &[Route] = &[
    Route {
        platform: PlatformKind::Zhihu,
        hosts: &["www.zhihu.com", "zhihu.com"],
        example: "https://www.zhihu.com/question/19550225",
        matcher: match_zhihu_question,
    },
    Route {
        platform: PlatformKind::Zhihu,
        hosts: &["zhuanlan.zhihu.com"],
        example: "https://zhuanlan.zhihu.com/p/20751140",
        matcher: match_zhihu_column,
    },
    Route {
        platform: PlatformKind::Weibo,
        hosts: &["s.weibo.com"],
        example: "https://s.weibo.com/weibo?q=rust",
        matcher: match_weibo_search,
    },
    Route {
        platform: PlatformKind::Weixin,
        hosts: &["mp.weixin.qq.com"],
        example: "https://mp.weixin.qq.com/s/AbCdEf123",
        matcher: match_weixin_article,
    },
    Route {
        platform: PlatformKind::Xiaohongshu,
        hosts: &["www.xiaohongshu.com", "xiaohongshu.com"],
        example: "https://www.xiaohongshu.com/explore/65f0c2a1000000001203b3c4",
        matcher: match_xiaohongshu_note,
    },
    Route {
        platform: PlatformKind::Bilibili,
        hosts: &["www.bilibili.com", "m.bilibili.com", "bilibili.com"],
        example: "https://www.bilibili.com/video/BV1Xu41177nj",
        matcher: match_bilibili_video,
    },
    Route {
        platform: PlatformKind::Bilibili,
        hosts: &["b23.tv"],
        example: "https://b23.tv/BV1Xu41177nj",
        matcher: match_bilibili_short,
    },
];

const PSEUDO_ROUTES: &[PseudoRoute] = &[PseudoRoute {
    platform: PlatformKind::Xiaohongshu,
    prefix: XHS_KEYWORD_PREFIX,
    example: "xhs_keyword:coffee",
    build: build_xhs_keyword,
}];

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_bvid(s: &str) -> bool {
    s.len() > 2 && s.starts_with("BV") && s[2..].chars().all(|c| c.is_ascii_alphanumeric())
}

fn match_zhihu_question(url: &Url) -> Option<Provider> {
    match segments(url).as_slice() {
        ["question", id] | ["question", id, "answer", _] if is_numeric_id(id) => {
            Some(Provider::Zhihu(ZhihuProvider::question(*id)))
        }
        _ => None,
    }
}

fn match_zhihu_column(url: &Url) -> Option<Provider> {
    match segments(url).as_slice() {
        ["p", id] if is_numeric_id(id) => Some(Provider::Zhihu(ZhihuProvider::column(*id))),
        _ => None,
    }
}

fn match_weibo_search(url: &Url) -> Option<Provider> {
    if segments(url).as_slice() != ["weibo"] {
        return None;
    }
    let query = url
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())?;
    Some(Provider::Weibo(WeiboProvider::new(query)))
}

fn match_weixin_article(url: &Url) -> Option<Provider> {
    match segments(url).as_slice() {
        ["s", id] if is_token(id) => Some(Provider::Weixin(WeixinProvider::new(*id))),
        ["s"] => {
            let param = |name: &str| {
                url.query_pairs()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())
                    .filter(|v| !v.is_empty())
            };
            let biz = param("__biz")?;
            let id = match param("sn") {
                Some(sn) => sn,
                None => format!("{}_{}", biz, param("mid").unwrap_or_default()),
            };
            Some(Provider::Weixin(WeixinProvider::with_url(id, url.as_str())))
        }
        _ => None,
    }
}

fn match_xiaohongshu_note(url: &Url) -> Option<Provider> {
    match segments(url).as_slice() {
        ["explore", id] | ["discovery", "item", id] if is_token(id) => {
            Some(Provider::Xiaohongshu(XiaohongshuProvider::note(*id)))
        }
        _ => None,
    }
}

fn match_bilibili_video(url: &Url) -> Option<Provider> {
    match segments(url).as_slice() {
        ["video", bvid, ..] if is_bvid(bvid) => Some(Provider::Bilibili(BilibiliProvider::new(*bvid))),
        _ => None,
    }
}

fn match_bilibili_short(url: &Url) -> Option<Provider> {
    match segments(url).as_slice() {
        [bvid] if is_bvid(bvid) => Some(Provider::Bilibili(BilibiliProvider::new(*bvid))),
        _ => None,
    }
}

fn build_xhs_keyword(keyword: &str) -> Provider {
    Provider::Xiaohongshu(XiaohongshuProvider::keyword(keyword))
}

/// Routing details for a single target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    pub target: String,
    pub supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    pub requires_login: bool,
    pub hosts: Vec<String>,
}

/// One supported platform and the target shapes it accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformSummary {
    pub platform: PlatformKind,
    pub hosts: Vec<String>,
    pub pseudo_prefixes: Vec<String>,
    pub examples: Vec<String>,
    pub requires_login: bool,
}

/// Maps targets to providers
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformRouter;

impl PlatformRouter {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a target to its provider
    ///
    /// Fails with [`CrawlError::Unsupported`] when nothing matches and with
    /// [`CrawlError::InvalidRequest`] for an empty target or keyword.
    pub fn resolve(&self, target: &str) -> Result<Provider, CrawlError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(CrawlError::InvalidRequest("target is empty".to_string()));
        }

        for route in PSEUDO_ROUTES {
            if let Some(value) = target.strip_prefix(route.prefix) {
                let value = value.trim();
                if value.is_empty() {
                    return Err(CrawlError::InvalidRequest(format!(
                        "{} target has an empty value",
                        route.prefix
                    )));
                }
                tracing::debug!(platform = %route.platform, %target, "Resolved pseudo-URL target");
                return Ok((route.build)(value));
            }
        }

        let unsupported = || CrawlError::Unsupported {
            target: target.to_string(),
        };
        let url = Url::parse(target).map_err(|_| unsupported())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(unsupported());
        }
        let host = url.host_str().ok_or_else(unsupported)?;

        for route in ROUTES.iter().filter(|r| r.hosts.contains(&host)) {
            if let Some(provider) = (route.matcher)(&url) {
                tracing::debug!(platform = %route.platform, %target, "Resolved target");
                return Ok(provider);
            }
        }
        Err(unsupported())
    }

    /// Platform of a target, `None` when unsupported
    pub fn platform_of(&self, target: &str) -> Option<PlatformKind> {
        self.resolve(target).ok().map(|p| p.platform())
    }

    /// Describe how a target would be routed
    pub fn platform_info(&self, target: &str) -> PlatformInfo {
        match self.resolve(target) {
            Ok(provider) => {
                let platform = provider.platform();
                PlatformInfo {
                    target: target.to_string(),
                    supported: true,
                    platform: Some(platform),
                    source_id: Some(provider.source_id()),
                    page_url: Some(provider.page_url()),
                    requires_login: platform.requires_login(),
                    hosts: hosts_for(platform),
                }
            }
            Err(_) => PlatformInfo {
                target: target.to_string(),
                supported: false,
                platform: None,
                source_id: None,
                page_url: None,
                requires_login: false,
                hosts: Vec::new(),
            },
        }
    }

    /// All platforms with their accepted target shapes
    pub fn supported_platforms(&self) -> Vec<PlatformSummary> {
        PlatformKind::ALL
            .iter()
            .map(|&platform| PlatformSummary {
                platform,
                hosts: hosts_for(platform),
                pseudo_prefixes: PSEUDO_ROUTES
                    .iter()
                    .filter(|r| r.platform == platform)
                    .map(|r| r.prefix.to_string())
                    .collect(),
                examples: ROUTES
                    .iter()
                    .filter(|r| r.platform == platform)
                    .map(|r| r.example)
                    .chain(
                        PSEUDO_ROUTES
                            .iter()
                            .filter(|r| r.platform == platform)
                            .map(|r| r.example),
                    )
                    .map(str::to_string)
                    .collect(),
                requires_login: platform.requires_login(),
            })
            .collect()
    }
}

fn hosts_for(platform: PlatformKind) -> Vec<String> {
    ROUTES
        .iter()
        .filter(|r| r.platform == platform)
        .flat_map(|r| r.hosts.iter().map(|h| h.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{XiaohongshuTarget, ZhihuTarget};

    fn resolve(target: &str) -> Result<Provider, CrawlError> {
        PlatformRouter::new().resolve(target)
    }

    #[test]
    fn test_zhihu_routes() {
        match resolve("https://www.zhihu.com/question/123456/answer/789").unwrap() {
            Provider::Zhihu(p) => assert_eq!(
                p.target(),
                &ZhihuTarget::Question {
                    id: "123456".to_string()
                }
            ),
            other => panic!("unexpected provider: {other:?}"),
        }
        let column = resolve("https://zhuanlan.zhihu.com/p/42").unwrap();
        assert_eq!(column.source_id(), "column:42");
        assert!(resolve("https://www.zhihu.com/people/someone").is_err());
    }

    #[test]
    fn test_weibo_route() {
        let provider = resolve("https://s.weibo.com/weibo?q=%E5%A4%A9%E6%B0%94&Refer=index").unwrap();
        assert_eq!(provider.platform(), PlatformKind::Weibo);
        assert_eq!(provider.source_id(), "search:天气");
        assert!(matches!(
            resolve("https://s.weibo.com/weibo?q="),
            Err(CrawlError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_weixin_routes() {
        let short = resolve("https://mp.weixin.qq.com/s/AbC-123_x").unwrap();
        assert_eq!(short.source_id(), "article:AbC-123_x");

        let long = resolve("https://mp.weixin.qq.com/s?__biz=MzA&mid=22&idx=1&sn=deadbeef").unwrap();
        assert_eq!(long.source_id(), "article:deadbeef");
        assert_eq!(
            long.page_url(),
            "https://mp.weixin.qq.com/s?__biz=MzA&mid=22&idx=1&sn=deadbeef"
        );
    }

    #[test]
    fn test_xiaohongshu_routes() {
        match resolve("xhs_keyword: coffee ").unwrap() {
            Provider::Xiaohongshu(p) => {
                assert_eq!(p.target(), &XiaohongshuTarget::Keyword("coffee".to_string()))
            }
            other => panic!("unexpected provider: {other:?}"),
        }
        assert!(matches!(
            resolve("xhs_keyword:"),
            Err(CrawlError::InvalidRequest(_))
        ));
        let note = resolve("https://www.xiaohongshu.com/explore/65f0abc?xsec_token=x").unwrap();
        assert_eq!(note.source_id(), "note:65f0abc");
    }

    #[test]
    fn test_bilibili_routes() {
        for target in [
            "https://www.bilibili.com/video/BV1Xu41177nj/?spm_id_from=333",
            "https://m.bilibili.com/video/BV1Xu41177nj",
            "https://b23.tv/BV1Xu41177nj",
        ] {
            assert_eq!(resolve(target).unwrap().source_id(), "BV1Xu41177nj");
        }
        assert!(resolve("https://www.bilibili.com/video/av170001").is_err());
    }

    #[test]
    fn test_unsupported_targets() {
        for target in [
            "https://example.com/article",
            "ftp://www.zhihu.com/question/1",
            "not a url",
            "https://evil.zhihu.com.example/question/1",
        ] {
            assert!(matches!(resolve(target), Err(CrawlError::Unsupported { .. })), "{target}");
        }
        assert!(matches!(resolve("   "), Err(CrawlError::InvalidRequest(_))));
    }

    #[test]
    fn test_platform_info() {
        let router = PlatformRouter::new();
        let info = router.platform_info("xhs_keyword:tea");
        assert!(info.supported);
        assert_eq!(info.platform, Some(PlatformKind::Xiaohongshu));
        assert!(info.requires_login);
        assert_eq!(info.source_id.as_deref(), Some("keyword:tea"));

        let info = router.platform_info("https://example.com");
        assert!(!info.supported);
        assert!(info.hosts.is_empty());
    }

    #[test]
    fn test_supported_platforms() {
        let platforms = PlatformRouter::new().supported_platforms();
        assert_eq!(platforms.len(), 5);
        let xhs = platforms
            .iter()
            .find(|p| p.platform == PlatformKind::Xiaohongshu)
            .unwrap();
        assert_eq!(xhs.pseudo_prefixes, vec!["xhs_keyword:".to_string()]);
        let bili = platforms
            .iter()
            .find(|p| p.platform == PlatformKind::Bilibili)
            .unwrap();
        assert!(bili.hosts.contains(&"b23.tv".to_string()));
    }
}

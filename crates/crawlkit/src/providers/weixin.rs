//! Weixin official-account articles

use super::{article_html, DegradedRules, ExtractOptions, Extraction, Extractor};
use crate::convert::{first_text, render_element, select_first, MediaCollector};
use crate::platform::PlatformKind;
use scraper::Html;
use serde_json::json;
use url::Url;

const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeixinProvider {
    id: String,
    url: String,
}

impl WeixinProvider {
    /// Short-link article `mp.weixin.qq.com/s/<id>`
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("https://mp.weixin.qq.com/s/{}", id);
        Self { id, url }
    }

    /// Article addressed by its full query-string URL
    pub fn with_url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

impl Extractor for WeixinProvider {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Weixin
    }

    fn source_id(&self) -> String {
        format!("article:{}", self.id)
    }

    fn page_url(&self) -> String {
        self.url.clone()
    }

    fn extract(&self, html: &str, _options: &ExtractOptions) -> Result<Extraction, String> {
        let base = Url::parse(&self.url).map_err(|e| e.to_string())?;
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = first_text(root, &["#activity-name", ".rich_media_title"])
            .ok_or_else(|| "article title not found".to_string())?;
        let body = select_first(root, "#js_content")
            .ok_or_else(|| "article body not found".to_string())?;
        let author = first_text(root, &["#js_name", ".rich_media_meta_text"])
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let published = first_text(root, &["#publish_time"]);

        let mut media = MediaCollector::new();
        let rendered = render_element(body, &base, &mut media, "body image");
        if rendered.text.is_empty() && media.is_empty() {
            return Err("article body is empty".to_string());
        }

        Ok(Extraction {
            html: article_html(&title, &[rendered.html]),
            markdown: format!("# {}\n\n{}", title, rendered.markdown),
            text: format!("{}\n\n{}", title, rendered.text),
            title,
            author,
            media: media.into_vec(),
            extras: json!({ "published": published }),
        })
    }

    fn degraded_rules(&self) -> DegradedRules {
        DegradedRules {
            title: &["#activity-name", ".rich_media_title", "h1"],
            author: &["#js_name", ".rich_media_meta_text", ".author"],
            body: &["#js_content", ".rich_media_content", "article", ".article-content"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_extraction() {
        let provider = WeixinProvider::new("AbC_123");
        let html = r#"<html><body>
            <h1 class="rich_media_title" id="activity-name">
                Weekly notes
            </h1>
            <a id="js_name"> Tech Daily </a><em id="publish_time">2024-05-01</em>
            <div id="js_content" style="visibility: hidden;">
              <section><p>Hello there.</p></section>
              <p><img data-src="https://mmbiz.qpic.cn/mmbiz_png/x/640?wx_fmt=png" src="data:image/gif;base64,R0l"></p>
            </div></body></html>"#;
        let extraction = provider.extract(html, &ExtractOptions { max_items: 3 }).unwrap();
        assert_eq!(extraction.title, "Weekly notes");
        assert_eq!(extraction.author, "Tech Daily");
        assert_eq!(extraction.extras["published"], "2024-05-01");
        assert_eq!(extraction.media.len(), 1);
        assert_eq!(
            extraction.media[0].url,
            "https://mmbiz.qpic.cn/mmbiz_png/x/640?wx_fmt=png"
        );
        assert_eq!(extraction.text, "Weekly notes\n\nHello there.");
        assert_eq!(provider.source_id(), "article:AbC_123");
    }

    #[test]
    fn test_missing_body_fails() {
        let provider = WeixinProvider::new("x");
        let html = r#"<html><body><h1 id="activity-name">T</h1></body></html>"#;
        assert!(provider.extract(html, &ExtractOptions { max_items: 3 }).is_err());
    }
}

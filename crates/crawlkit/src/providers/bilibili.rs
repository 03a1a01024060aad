//! Bilibili video metadata

use super::{article_html, DegradedRules, ExtractOptions, Extraction, Extractor};
use crate::content::MediaKind;
use crate::convert::{attr_of, escape_html, first_text, parse_count, resolve_url, select_all, text_of, MediaCollector};
use crate::platform::PlatformKind;
use scraper::Html;
use serde_json::json;
use url::Url;

const UNKNOWN_AUTHOR: &str = "unknown";

/// (label, selector) pairs for the toolbar counters
const STAT_SELECTORS: &[(&str, &str)] = &[
    ("views", ".view-text"),
    ("danmaku", ".dm-text"),
    ("likes", ".video-like-info"),
    ("coins", ".video-coin-info"),
    ("favorites", ".video-fav-info"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BilibiliProvider {
    bvid: String,
}

impl BilibiliProvider {
    pub fn new(bvid: impl Into<String>) -> Self {
        Self { bvid: bvid.into() }
    }

    pub fn bvid(&self) -> &str {
        &self.bvid
    }
}

/// Cover URLs carry an `@<w>w_<h>h` resize suffix; drop it for the original image
fn original_cover(url: &str) -> String {
    match url.rfind('@') {
        Some(pos) if url[pos..].contains('w') || url[pos..].contains('h') => url[..pos].to_string(),
        _ => url.to_string(),
    }
}

impl Extractor for BilibiliProvider {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Bilibili
    }

    fn source_id(&self) -> String {
        self.bvid.clone()
    }

    fn page_url(&self) -> String {
        format!("https://www.bilibili.com/video/{}", self.bvid)
    }

    fn extract(&self, html: &str, _options: &ExtractOptions) -> Result<Extraction, String> {
        let base = Url::parse(&self.page_url()).map_err(|e| e.to_string())?;
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = first_text(root, &["h1.video-title", ".video-info-title h1"])
            .or_else(|| attr_of(root, "meta[property=\"og:title\"]", "content"))
            .map(|t| t.trim_end_matches("_哔哩哔哩_bilibili").to_string())
            .ok_or_else(|| "video title not found".to_string())?;
        let author = first_text(root, &[".up-name", ".up-detail-top .up-name"])
            .or_else(|| attr_of(root, "meta[name=\"author\"]", "content"))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let description = first_text(root, &[".desc-info-text", ".basic-desc-info"])
            .or_else(|| attr_of(root, "meta[name=\"description\"]", "content"))
            .unwrap_or_default();
        let tags: Vec<String> = select_all(root, ".tag-link")
            .into_iter()
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect();
        let cover = attr_of(root, "meta[property=\"og:image\"]", "content")
            .and_then(|raw| resolve_url(&base, &raw))
            .map(|url| original_cover(&url));

        let mut stats = serde_json::Map::new();
        for (label, css) in STAT_SELECTORS {
            if let Some(value) = first_text(root, &[*css]) {
                stats.insert(label.to_string(), json!(parse_count(&value)));
            }
        }

        let mut media = MediaCollector::new();
        let mut markdown = format!(
            "# {}\n\n**Uploader**: {}\n**BVID**: `{}`\n\n",
            title, author, self.bvid
        );
        let mut text = format!("{}\n\nUploader: {}\nBVID: {}\n\n", title, author, self.bvid);

        if !stats.is_empty() {
            let lines = stats
                .iter()
                .map(|(k, v)| format!("- {}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n");
            markdown.push_str(&format!("## Stats\n\n{}\n\n", lines));
            text.push_str(&format!("Stats\n\n{}\n\n", lines));
        }
        let description_body = if description.is_empty() {
            "No description"
        } else {
            description.as_str()
        };
        markdown.push_str(&format!("## Description\n\n{}\n\n", description_body));
        text.push_str(&format!("Description\n\n{}\n\n", description_body));
        if !tags.is_empty() {
            let md_tags = tags.iter().map(|t| format!("`{}`", t)).collect::<Vec<_>>().join(", ");
            markdown.push_str(&format!("## Tags\n\n{}\n\n", md_tags));
            text.push_str(&format!("Tags: {}\n\n", tags.join(", ")));
        }

        let mut sections = vec![format!("<p>{}</p>", escape_html(description_body))];
        if let Some(cover) = &cover {
            media.push(cover, "cover", MediaKind::Image);
            markdown.push_str(&format!("![cover]({})\n\n", cover));
            sections.push(format!("<img src=\"{}\">", escape_html(cover)));
        }

        Ok(Extraction {
            html: article_html(&title, &sections),
            title,
            author,
            text: text.trim_end().to_string(),
            markdown: markdown.trim_end().to_string(),
            media: media.into_vec(),
            extras: json!({
                "bvid": self.bvid,
                "tags": tags,
                "stats": stats,
            }),
        })
    }

    fn degraded_rules(&self) -> DegradedRules {
        DegradedRules {
            title: &["h1.video-title"],
            author: &[".up-name"],
            body: &[".desc-info-text", ".basic-desc-info"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_extraction() {
        let provider = BilibiliProvider::new("BV1Xu41177nj");
        let html = r#"<html><head>
            <meta property="og:title" content="Ignored_哔哩哔哩_bilibili">
            <meta property="og:image" content="//i0.hdslb.com/bfs/archive/cover.jpg@100w_100h_1c.png">
            </head><body>
            <h1 class="video-title">Rust in 100 seconds</h1>
            <a class="up-name"> Fireship </a>
            <span class="view-text">12.3万</span><span class="dm-text">456</span>
            <span class="desc-info-text">A short intro.</span>
            <a class="tag-link">rust</a><a class="tag-link">programming</a>
            </body></html>"#;
        let extraction = provider.extract(html, &ExtractOptions { max_items: 3 }).unwrap();
        assert_eq!(extraction.title, "Rust in 100 seconds");
        assert_eq!(extraction.author, "Fireship");
        assert_eq!(extraction.extras["tags"], json!(["rust", "programming"]));
        assert_eq!(extraction.extras["stats"]["views"], 123000);
        assert_eq!(extraction.media.len(), 1);
        assert_eq!(
            extraction.media[0].url,
            "https://i0.hdslb.com/bfs/archive/cover.jpg"
        );
        assert!(extraction.markdown.contains("A short intro."));
    }

    #[test]
    fn test_meta_fallbacks() {
        let provider = BilibiliProvider::new("BV1");
        let html = r#"<html><head>
            <meta property="og:title" content="Meta title_哔哩哔哩_bilibili">
            <meta name="author" content="someone">
            <meta name="description" content="From meta">
            </head><body></body></html>"#;
        let extraction = provider.extract(html, &ExtractOptions { max_items: 3 }).unwrap();
        assert_eq!(extraction.title, "Meta title");
        assert_eq!(extraction.author, "someone");
        assert!(extraction.text.contains("From meta"));
        assert!(extraction.media.is_empty());
    }

    #[test]
    fn test_original_cover() {
        assert_eq!(original_cover("https://i0.hdslb.com/a.jpg@672w_378h"), "https://i0.hdslb.com/a.jpg");
        assert_eq!(original_cover("https://i0.hdslb.com/a.jpg"), "https://i0.hdslb.com/a.jpg");
    }
}

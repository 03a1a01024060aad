//! Xiaohongshu keyword search and note pages

use super::{article_html, DegradedRules, ExtractOptions, Extraction, Extractor};
use crate::content::MediaKind;
use crate::convert::{
    escape_html, first_text, image_url, parse_count, render_element, resolve_url, select_all,
    select_first, MediaCollector,
};
use crate::platform::PlatformKind;
use scraper::Html;
use serde_json::json;
use url::Url;

const SITE: &str = "https://www.xiaohongshu.com";
const SEARCH_URL: &str = "https://www.xiaohongshu.com/search_result";
const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XiaohongshuTarget {
    /// Pseudo-URL `xhs_keyword:<keyword>`
    Keyword(String),
    /// `www.xiaohongshu.com/explore/<id>`
    Note(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XiaohongshuProvider {
    target: XiaohongshuTarget,
}

impl XiaohongshuProvider {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            target: XiaohongshuTarget::Keyword(keyword.into()),
        }
    }

    pub fn note(id: impl Into<String>) -> Self {
        Self {
            target: XiaohongshuTarget::Note(id.into()),
        }
    }

    pub fn target(&self) -> &XiaohongshuTarget {
        &self.target
    }

    fn extract_search(&self, keyword: &str, html: &str, options: &ExtractOptions) -> Result<Extraction, String> {
        let base = Url::parse(SITE).map_err(|e| e.to_string())?;
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = format!("{} - xiaohongshu search", keyword);
        let mut collector = MediaCollector::new();
        let mut markdown = format!("# {}\n\n", title);
        let mut text = format!("{}\n\n", title);
        let mut sections = Vec::new();
        let mut notes = Vec::new();

        for (index, item) in select_all(root, "section.note-item")
            .into_iter()
            .take(options.max_items)
            .enumerate()
        {
            let number = index + 1;
            let note_title = first_text(item, &[".title", ".footer .title span"]).unwrap_or_default();
            let author = first_text(item, &[".name", ".author .name"])
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
            let likes = first_text(item, &[".count", ".like-wrapper .count"])
                .map(|c| parse_count(&c))
                .unwrap_or(0);
            let link = select_first(item, "a[href*=\"/explore/\"]")
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve_url(&base, href));
            let cover = select_first(item, "img").and_then(|img| image_url(img, &base));

            let heading = format!("Note {} - {}", number, author);
            markdown.push_str(&format!("## {}\n\n", heading));
            text.push_str(&format!("{}\n\n", heading));
            if !note_title.is_empty() {
                markdown.push_str(&format!("{}\n\n", note_title));
                text.push_str(&format!("{}\n\n", note_title));
            }
            markdown.push_str(&format!("- Likes: {}\n", likes));
            text.push_str(&format!("- Likes: {}\n", likes));
            if let Some(link) = &link {
                markdown.push_str(&format!("- Link: {}\n", link));
                text.push_str(&format!("- Link: {}\n", link));
            }
            markdown.push('\n');
            text.push('\n');

            let mut section = format!(
                "<section class=\"note\"><h2>{}</h2><p>{}</p>",
                escape_html(&heading),
                escape_html(&note_title)
            );
            if let Some(cover) = &cover {
                if collector.push(cover, &format!("note {} cover", number), MediaKind::Image) {
                    markdown.push_str(&format!("![]({})\n\n", cover));
                    section.push_str(&format!("<img src=\"{}\">", escape_html(cover)));
                }
            }
            section.push_str("</section>");
            sections.push(section);

            notes.push(json!({
                "index": number,
                "title": note_title,
                "author": author,
                "likes": likes,
                "link": link,
                "cover": cover,
            }));
        }

        if notes.is_empty() {
            return Err("no note cards found".to_string());
        }

        let author = notes[0]["author"].as_str().unwrap_or(UNKNOWN_AUTHOR).to_string();
        Ok(Extraction {
            html: article_html(&title, &sections),
            title,
            author,
            text: text.trim_end().to_string(),
            markdown: markdown.trim_end().to_string(),
            media: collector.into_vec(),
            extras: json!({ "keyword": keyword, "notes": notes }),
        })
    }

    fn extract_note(&self, html: &str) -> Result<Extraction, String> {
        let base = Url::parse(&self.page_url()).map_err(|e| e.to_string())?;
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = first_text(root, &["#detail-title", ".note-content .title"])
            .ok_or_else(|| "note title not found".to_string())?;
        let author = first_text(root, &[".author-wrapper .username", ".username"])
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let mut media = MediaCollector::new();
        let mut markdown = format!("# {}\n\n", title);
        let mut text = format!("{}\n\n", title);
        let mut sections = Vec::new();

        if let Some(desc) = select_first(root, "#detail-desc") {
            let rendered = render_element(desc, &base, &mut media, "note image");
            markdown.push_str(&format!("{}\n\n", rendered.markdown));
            text.push_str(&rendered.text);
            sections.push(rendered.html);
        }
        for img in select_all(root, ".swiper-slide img") {
            if let Some(url) = image_url(img, &base) {
                if media.push(&url, "note image", MediaKind::Image) {
                    markdown.push_str(&format!("![]({})\n\n", url));
                    sections.push(format!("<img src=\"{}\">", escape_html(&url)));
                }
            }
        }
        if sections.is_empty() {
            return Err("note has neither text nor images".to_string());
        }

        Ok(Extraction {
            html: article_html(&title, &sections),
            title,
            author,
            text: text.trim_end().to_string(),
            markdown: markdown.trim_end().to_string(),
            media: media.into_vec(),
            extras: json!({}),
        })
    }
}

impl Extractor for XiaohongshuProvider {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Xiaohongshu
    }

    fn source_id(&self) -> String {
        match &self.target {
            XiaohongshuTarget::Keyword(keyword) => format!("keyword:{}", keyword),
            XiaohongshuTarget::Note(id) => format!("note:{}", id),
        }
    }

    fn page_url(&self) -> String {
        match &self.target {
            XiaohongshuTarget::Keyword(keyword) => Url::parse_with_params(
                SEARCH_URL,
                &[
                    ("keyword", keyword.as_str()),
                    ("source", "web_search_result_notes"),
                ],
            )
            .map(|url| url.to_string())
            .unwrap_or_else(|_| SEARCH_URL.to_string()),
            XiaohongshuTarget::Note(id) => format!("{}/explore/{}", SITE, id),
        }
    }

    fn extract(&self, html: &str, options: &ExtractOptions) -> Result<Extraction, String> {
        match &self.target {
            XiaohongshuTarget::Keyword(keyword) => self.extract_search(keyword, html, options),
            XiaohongshuTarget::Note(_) => self.extract_note(html),
        }
    }

    fn degraded_rules(&self) -> DegradedRules {
        match self.target {
            XiaohongshuTarget::Keyword(_) => DegradedRules {
                title: &[],
                author: &["section.note-item .name"],
                body: &["section.note-item .title"],
            },
            XiaohongshuTarget::Note(_) => DegradedRules {
                title: &["#detail-title"],
                author: &[".username"],
                body: &["#detail-desc", ".note-content .desc"],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"<html><body><div class="feeds-container">
        <section class="note-item"><a href="/explore/aaa?xsec_token=t"><img src="https://sns-img.xhscdn.com/a.webp"></a>
          <div class="footer"><a class="title"><span>Latte art</span></a><div class="author"><span class="name">mia</span></div>
          <span class="like-wrapper"><span class="count">1.1万</span></span></div></section>
        <section class="note-item"><a href="/explore/bbb"><img src="https://sns-img.xhscdn.com/b.webp"></a>
          <div class="footer"><a class="title"><span>Pour over</span></a><div class="author"><span class="name">leo</span></div>
          <span class="like-wrapper"><span class="count">87</span></span></div></section>
        </div></body></html>"#;

    #[test]
    fn test_keyword_extraction() {
        let provider = XiaohongshuProvider::keyword("coffee");
        let extraction = provider.extract(SEARCH, &ExtractOptions { max_items: 3 }).unwrap();
        assert_eq!(extraction.title, "coffee - xiaohongshu search");
        assert_eq!(extraction.author, "mia");
        let notes = extraction.extras["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0]["title"], "Latte art");
        assert_eq!(notes[0]["likes"], 11000);
        assert_eq!(
            notes[0]["link"],
            "https://www.xiaohongshu.com/explore/aaa?xsec_token=t"
        );
        assert_eq!(extraction.media.len(), 2);
        assert_eq!(extraction.media[1].role, "note 2 cover");
    }

    #[test]
    fn test_keyword_page_url() {
        let provider = XiaohongshuProvider::keyword("咖啡");
        assert_eq!(
            provider.page_url(),
            "https://www.xiaohongshu.com/search_result?keyword=%E5%92%96%E5%95%A1&source=web_search_result_notes"
        );
        assert_eq!(provider.source_id(), "keyword:咖啡");
    }

    #[test]
    fn test_note_page_dedupes_slides() {
        let provider = XiaohongshuProvider::note("65f0");
        let html = r#"<html><body>
            <div class="swiper-slide"><img src="https://sns-img.xhscdn.com/1.jpg"></div>
            <div class="swiper-slide"><img src="https://sns-img.xhscdn.com/2.jpg"></div>
            <div class="swiper-slide"><img src="https://sns-img.xhscdn.com/1.jpg"></div>
            <div id="detail-title">Weekend trip</div><div id="detail-desc"><span>Lovely day</span></div>
            <span class="username">zoe</span></body></html>"#;
        let extraction = provider.extract(html, &ExtractOptions { max_items: 3 }).unwrap();
        assert_eq!(extraction.title, "Weekend trip");
        assert_eq!(extraction.author, "zoe");
        assert_eq!(extraction.media.len(), 2);
        assert_eq!(extraction.text, "Weekend trip\n\nLovely day");
        assert_eq!(provider.page_url(), "https://www.xiaohongshu.com/explore/65f0");
    }
}

//! Weibo keyword search results

use super::{article_html, DegradedRules, ExtractOptions, Extraction, Extractor};
use crate::content::MediaKind;
use crate::convert::{
    escape_html, first_text, image_url, parse_count, resolve_url, select_all, select_first,
    MediaCollector,
};
use crate::platform::PlatformKind;
use scraper::{ElementRef, Html};
use serde_json::json;
use url::Url;

const SEARCH_URL: &str = "https://s.weibo.com/weibo";
const UNKNOWN_AUTHOR: &str = "unknown";

/// Thumbnail path segments replaced by the full-size one
const THUMBNAIL_SEGMENTS: &[&str] = &["/thumb150/", "/orj360/", "/thumbnail/"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeiboProvider {
    query: String,
}

impl WeiboProvider {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

struct Post {
    number: usize,
    author: String,
    content: String,
    reposts: u64,
    comments: u64,
    likes: u64,
    media: Vec<(String, MediaKind)>,
}

fn full_size(url: &str) -> String {
    THUMBNAIL_SEGMENTS
        .iter()
        .fold(url.to_string(), |acc, seg| acc.replace(seg, "/large/"))
}

fn parse_post(card: ElementRef<'_>, number: usize, base: &Url) -> Post {
    let author = first_text(card, &["a.name"]).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let content = first_text(
        card,
        &[
            "p.txt[node-type=\"feed_list_content_full\"]",
            "p.txt[node-type=\"feed_list_content\"]",
        ],
    )
    .unwrap_or_default();

    let actions = select_all(card, "div.card-act li");
    let count_at = |i: usize| {
        actions
            .get(i)
            .map(|li| parse_count(&li.text().collect::<String>()))
            .unwrap_or(0)
    };

    let mut media = Vec::new();
    for img in select_all(
        card,
        "div[node-type=\"feed_list_media_prev\"] img, div.media-piclist img",
    ) {
        if let Some(url) = image_url(img, base) {
            media.push((full_size(&url), MediaKind::Image));
        }
    }
    for video in select_all(card, "video[src]") {
        if let Some(url) = video.value().attr("src").and_then(|src| resolve_url(base, src)) {
            media.push((url, MediaKind::Video));
        }
    }

    Post {
        number,
        author,
        content,
        reposts: count_at(0),
        comments: count_at(1),
        likes: count_at(2),
        media,
    }
}

impl Extractor for WeiboProvider {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Weibo
    }

    fn source_id(&self) -> String {
        format!("search:{}", self.query)
    }

    fn page_url(&self) -> String {
        match Url::parse_with_params(SEARCH_URL, &[("q", self.query.as_str())]) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}?q={}", SEARCH_URL, self.query),
        }
    }

    fn extract(&self, html: &str, options: &ExtractOptions) -> Result<Extraction, String> {
        let base = Url::parse(SEARCH_URL).map_err(|e| e.to_string())?;
        let document = Html::parse_document(html);
        let root = document.root_element();

        let posts: Vec<Post> = select_all(root, "#pl_feedlist_index div.card-wrap")
            .into_iter()
            .filter(|card| select_first(*card, "div.info").is_some())
            .take(options.max_items)
            .enumerate()
            .map(|(index, card)| parse_post(card, index + 1, &base))
            .collect();

        if posts.is_empty() {
            return Err("no search result cards found".to_string());
        }

        let title = format!("{} - weibo search", self.query);
        let mut collector = MediaCollector::new();
        let mut markdown = format!("# {}\n\n", title);
        let mut text = format!("{}\n\n", title);
        let mut sections = Vec::new();

        for post in &posts {
            let heading = format!("Post {} - {}", post.number, post.author);
            let stats = format!(
                "- Reposts: {}\n- Comments: {}\n- Likes: {}",
                post.reposts, post.comments, post.likes
            );
            markdown.push_str(&format!("## {}\n\n{}\n\n{}\n\n", heading, post.content, stats));
            text.push_str(&format!("{}\n\n{}\n\n{}\n\n", heading, post.content, stats));

            let mut section = format!(
                "<section class=\"post\"><h2>{}</h2><p>{}</p>",
                escape_html(&heading),
                escape_html(&post.content)
            );
            for (url, kind) in &post.media {
                let role = match kind {
                    MediaKind::Image => format!("post {} image", post.number),
                    MediaKind::Video => format!("post {} video", post.number),
                };
                if !collector.push(url, &role, *kind) {
                    continue;
                }
                match kind {
                    MediaKind::Image => {
                        markdown.push_str(&format!("![]({})\n\n", url));
                        section.push_str(&format!("<img src=\"{}\">", escape_html(url)));
                    }
                    MediaKind::Video => {
                        markdown.push_str(&format!("[video]({})\n\n", url));
                        section.push_str(&format!("<video src=\"{}\"></video>", escape_html(url)));
                    }
                }
            }
            section.push_str("</section>");
            sections.push(section);
        }

        let extras = json!({
            "query": self.query,
            "posts": posts.iter().map(|p| json!({
                "index": p.number,
                "author": p.author,
                "content": p.content,
                "reposts": p.reposts,
                "comments": p.comments,
                "likes": p.likes,
            })).collect::<Vec<_>>(),
        });

        Ok(Extraction {
            html: article_html(&title, &sections),
            author: posts[0].author.clone(),
            title,
            text: text.trim_end().to_string(),
            markdown: markdown.trim_end().to_string(),
            media: collector.into_vec(),
            extras,
        })
    }

    fn degraded_rules(&self) -> DegradedRules {
        DegradedRules {
            title: &[],
            author: &["#pl_feedlist_index a.name"],
            body: &[
                "#pl_feedlist_index p.txt[node-type=\"feed_list_content_full\"]",
                "#pl_feedlist_index p.txt[node-type=\"feed_list_content\"]",
            ],
        }
    }
}

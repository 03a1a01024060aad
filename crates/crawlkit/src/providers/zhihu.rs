//! Zhihu questions and column articles

use super::{article_html, DegradedRules, ExtractOptions, Extraction, Extractor};
use crate::convert::{
    attr_of, escape_html, first_text, parse_count, render_element, select_all, select_first,
    MediaCollector, Rendered,
};
use crate::platform::PlatformKind;
use scraper::Html;
use serde_json::json;
use url::Url;

const QUESTION_AUTHOR: &str = "zhihu user";
const ANONYMOUS: &str = "anonymous";

/// Which kind of Zhihu page a target points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZhihuTarget {
    /// `www.zhihu.com/question/<id>`
    Question { id: String },
    /// `zhuanlan.zhihu.com/p/<id>`
    Column { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZhihuProvider {
    target: ZhihuTarget,
}

impl ZhihuProvider {
    pub fn question(id: impl Into<String>) -> Self {
        Self {
            target: ZhihuTarget::Question { id: id.into() },
        }
    }

    pub fn column(id: impl Into<String>) -> Self {
        Self {
            target: ZhihuTarget::Column { id: id.into() },
        }
    }

    pub fn target(&self) -> &ZhihuTarget {
        &self.target
    }

    fn extract_question(&self, html: &str, options: &ExtractOptions) -> Result<Extraction, String> {
        let base = Url::parse(&self.page_url()).map_err(|e| e.to_string())?;
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = first_text(root, &["h1.QuestionHeader-title"])
            .ok_or_else(|| "question title not found".to_string())?;

        let mut media = MediaCollector::new();
        let detail = select_first(root, "div.QuestionRichText")
            .map(|el| render_element(el, &base, &mut media, "question image"));

        // Items without a body are not answers (ads, collapsed placeholders)
        let items = select_all(root, "div.AnswerItem")
            .into_iter()
            .filter_map(|item| select_first(item, ".RichContent-inner").map(|body| (item, body)))
            .take(options.max_items);

        let mut answers = Vec::new();
        for (index, (item, body)) in items.enumerate() {
            let number = index + 1;
            let author = attr_of(item, "meta[itemprop=\"name\"]", "content")
                .or_else(|| first_text(item, &[".UserLink-link"]))
                .unwrap_or_else(|| ANONYMOUS.to_string());
            let upvotes = attr_of(item, "meta[itemprop=\"upvoteCount\"]", "content")
                .map(|v| parse_count(&v))
                .unwrap_or(0);
            let rendered = render_element(body, &base, &mut media, &format!("answer {} image", number));
            answers.push(Answer {
                number,
                author,
                upvotes,
                rendered,
            });
        }

        let has_detail = detail.as_ref().is_some_and(|r| !r.text.is_empty() || !r.markdown.is_empty());
        if answers.is_empty() && !has_detail {
            return Err("no question detail or answers found".to_string());
        }

        let mut markdown = format!("# {}\n\n", title);
        let mut text = format!("{}\n\n", title);
        let mut sections = Vec::new();
        if let Some(rendered) = detail.as_ref().filter(|_| has_detail) {
            markdown.push_str(&format!("## Question\n\n{}\n\n", rendered.markdown));
            text.push_str(&format!("Question\n\n{}\n\n", rendered.text));
            sections.push(format!("<section class=\"question\">{}</section>", rendered.html));
        }
        markdown.push_str(&format!("## Answers ({})\n\n", answers.len()));
        for answer in &answers {
            let heading = format!("Answer {} - {} (👍 {})", answer.number, answer.author, answer.upvotes);
            markdown.push_str(&format!("### {}\n\n{}\n\n", heading, answer.rendered.markdown));
            text.push_str(&format!("{}\n\n{}\n\n", heading, answer.rendered.text));
            sections.push(format!(
                "<section class=\"answer\"><h3>{}</h3>{}</section>",
                escape_html(&heading),
                answer.rendered.html
            ));
        }

        let extras = json!({
            "question_detail": detail.as_ref().map(|r| r.text.clone()).unwrap_or_default(),
            "answers": answers.iter().map(|a| json!({
                "index": a.number,
                "author": a.author,
                "upvotes": a.upvotes,
                "content": a.rendered.text,
            })).collect::<Vec<_>>(),
        });

        Ok(Extraction {
            html: article_html(&title, &sections),
            title,
            author: QUESTION_AUTHOR.to_string(),
            text: text.trim_end().to_string(),
            markdown: markdown.trim_end().to_string(),
            media: media.into_vec(),
            extras,
        })
    }

    fn extract_column(&self, html: &str) -> Result<Extraction, String> {
        let base = Url::parse(&self.page_url()).map_err(|e| e.to_string())?;
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = first_text(root, &[".Post-Title", "h1.Post-Title"])
            .ok_or_else(|| "column title not found".to_string())?;
        let body = select_first(root, ".Post-RichText")
            .ok_or_else(|| "column body not found".to_string())?;
        let author = first_text(root, &[".AuthorInfo-name", ".AuthorInfo .UserLink-link"])
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let mut media = MediaCollector::new();
        let rendered = render_element(body, &base, &mut media, "body image");
        if rendered.text.is_empty() && media.is_empty() {
            return Err("column body is empty".to_string());
        }

        Ok(Extraction {
            html: article_html(&title, &[rendered.html]),
            markdown: format!("# {}\n\n{}", title, rendered.markdown),
            text: format!("{}\n\n{}", title, rendered.text),
            title,
            author,
            media: media.into_vec(),
            extras: json!({}),
        })
    }
}

struct Answer {
    number: usize,
    author: String,
    upvotes: u64,
    rendered: Rendered,
}

impl Extractor for ZhihuProvider {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Zhihu
    }

    fn source_id(&self) -> String {
        match &self.target {
            ZhihuTarget::Question { id } => format!("question:{}", id),
            ZhihuTarget::Column { id } => format!("column:{}", id),
        }
    }

    fn page_url(&self) -> String {
        match &self.target {
            ZhihuTarget::Question { id } => format!("https://www.zhihu.com/question/{}", id),
            ZhihuTarget::Column { id } => format!("https://zhuanlan.zhihu.com/p/{}", id),
        }
    }

    fn extract(&self, html: &str, options: &ExtractOptions) -> Result<Extraction, String> {
        match self.target {
            ZhihuTarget::Question { .. } => self.extract_question(html, options),
            ZhihuTarget::Column { .. } => self.extract_column(html),
        }
    }

    fn degraded_rules(&self) -> DegradedRules {
        match self.target {
            ZhihuTarget::Question { .. } => DegradedRules {
                title: &["h1.QuestionHeader-title"],
                author: &[".AnswerItem .UserLink-link"],
                body: &[".QuestionAnswer-content .RichContent-inner", ".RichContent-inner", "div.QuestionRichText"],
            },
            ZhihuTarget::Column { .. } => DegradedRules {
                title: &[".Post-Title"],
                author: &[".AuthorInfo-name"],
                body: &[".Post-RichText"],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: &str = r#"<html><body>
        <h1 class="QuestionHeader-title">How to learn Rust?</h1>
        <div class="QuestionRichText"><p>Looking for advice.</p><img src="https://pic1.zhimg.com/q.jpg"></div>
        <div class="AnswerItem">
          <meta itemprop="name" content="Alice"><meta itemprop="upvoteCount" content="120">
          <div class="RichContent-inner"><p>Read the book.</p><img data-actualsrc="https://pic2.zhimg.com/a1.jpg" src="data:image/svg+xml;x"></div>
        </div>
        <div class="AnswerItem">
          <a class="UserLink-link">Bob</a>
          <div class="RichContent-inner"><p>Write code.</p></div>
        </div>
        <div class="AnswerItem">
          <div class="RichContent-inner"><p>Ask questions.</p></div>
        </div>
        </body></html>"#;

    #[test]
    fn test_question_extraction() {
        let provider = ZhihuProvider::question("123");
        let extraction = provider
            .extract(QUESTION, &ExtractOptions { max_items: 3 })
            .unwrap();
        assert_eq!(extraction.title, "How to learn Rust?");
        assert_eq!(extraction.extras["answers"].as_array().unwrap().len(), 3);
        assert_eq!(extraction.extras["answers"][0]["author"], "Alice");
        assert_eq!(extraction.extras["answers"][0]["upvotes"], 120);
        assert_eq!(extraction.extras["answers"][1]["author"], "Bob");
        assert_eq!(extraction.extras["answers"][2]["author"], "anonymous");
        assert_eq!(extraction.extras["question_detail"], "Looking for advice.");

        let roles: Vec<_> = extraction.media.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["question image", "answer 1 image"]);
        assert_eq!(extraction.media[1].url, "https://pic2.zhimg.com/a1.jpg");
        assert!(extraction.markdown.contains("### Answer 1 - Alice (👍 120)"));
    }

    #[test]
    fn test_question_truncates_in_display_order() {
        let provider = ZhihuProvider::question("123");
        for _ in 0..3 {
            let extraction = provider
                .extract(QUESTION, &ExtractOptions { max_items: 2 })
                .unwrap();
            let answers = extraction.extras["answers"].as_array().unwrap();
            assert_eq!(answers.len(), 2);
            assert_eq!(answers[0]["content"], "Read the book.");
            assert_eq!(answers[1]["content"], "Write code.");
        }
    }

    #[test]
    fn test_item_without_body_does_not_consume_a_slot() {
        let provider = ZhihuProvider::question("123");
        let html = QUESTION.replace(
            r#"src="https://pic1.zhimg.com/q.jpg"></div>"#,
            r#"src="https://pic1.zhimg.com/q.jpg"></div><div class="AnswerItem"><span>Sponsored</span></div>"#,
        );
        let extraction = provider
            .extract(&html, &ExtractOptions { max_items: 2 })
            .unwrap();
        let answers = extraction.extras["answers"].as_array().unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0]["index"], 1);
        assert_eq!(answers[0]["author"], "Alice");
        assert_eq!(answers[1]["index"], 2);
        assert_eq!(answers[1]["author"], "Bob");
    }

    #[test]
    fn test_question_html_uses_resolved_image_sources() {
        let provider = ZhihuProvider::question("123");
        let extraction = provider
            .extract(QUESTION, &ExtractOptions { max_items: 1 })
            .unwrap();
        assert!(extraction.html.contains(r#"<img src="https://pic2.zhimg.com/a1.jpg">"#));
        assert!(!extraction.html.contains("data:image"));
        assert!(!extraction.html.contains("data-actualsrc"));
    }

    #[test]
    fn test_question_without_content_fails() {
        let provider = ZhihuProvider::question("1");
        let html = r#"<html><body><h1 class="QuestionHeader-title">T</h1></body></html>"#;
        assert!(provider.extract(html, &ExtractOptions { max_items: 3 }).is_err());
    }

    #[test]
    fn test_column_extraction() {
        let provider = ZhihuProvider::column("987");
        let html = r#"<html><body><h1 class="Post-Title">Column</h1>
            <div class="AuthorInfo-name">Carol</div>
            <div class="Post-RichText"><p>Para</p><figure><img data-original="https://pic3.zhimg.com/c.jpg"></figure></div>
            </body></html>"#;
        let extraction = provider.extract(html, &ExtractOptions { max_items: 3 }).unwrap();
        assert_eq!(extraction.title, "Column");
        assert_eq!(extraction.author, "Carol");
        assert_eq!(extraction.media.len(), 1);
        assert_eq!(provider.source_id(), "column:987");
        assert_eq!(provider.page_url(), "https://zhuanlan.zhihu.com/p/987");
    }
}

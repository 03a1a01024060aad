//! HTML selection and conversion helpers
//!
//! Providers select platform containers with CSS selectors and turn them into
//! markdown and plain text here. Images and videos met while converting are
//! collected as [`MediaReference`]s in document order.

use crate::content::{MediaKind, MediaReference};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Image attributes in priority order (lazy-loading attributes first)
const IMAGE_ATTRS: &[&str] = &["data-original", "data-actualsrc", "data-src", "src"];

/// Elements whose content never reaches the output
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "button", "iframe", "head",
];

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "source", "wbr", "col", "area", "input"];

/// Attributes carried over into the html rendering
const KEPT_ATTRS: &[&str] = &["class", "id", "alt", "title", "colspan", "rowspan"];

/// Elements rendered as paragraphs
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "figure", "figcaption", "header", "footer", "main",
    "table", "tr", "dl", "dd", "dt", "aside", "nav", "body", "html",
];

/// All elements matching a selector, in document order
///
/// Selectors are static strings; an unparsable one matches nothing.
pub(crate) fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// First element matching a selector
pub(crate) fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    let found = scope.select(&selector).next();
    found
}

/// Whitespace-collapsed text content of an element
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    clean_whitespace(&el.text().collect::<String>())
}

/// Text of the first selector (in list order) whose first match is non-empty
pub(crate) fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        select_first(scope, css)
            .map(text_of)
            .filter(|text| !text.is_empty())
    })
}

/// Attribute of the first element matching a selector, if non-empty
pub(crate) fn attr_of(scope: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    select_first(scope, css)
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Collapse whitespace runs into single spaces and trim
pub fn clean_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse three or more newlines into a blank line and strip trailing spaces
pub fn filter_excessive_newlines(s: &str) -> String {
    let trimmed_lines = s
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    match Regex::new(r"\n{3,}") {
        Ok(re) => re.replace_all(&trimmed_lines, "\n\n").trim().to_string(),
        Err(_) => trimmed_lines.trim().to_string(),
    }
}

/// Parse a display counter such as "1,024", "转发 12" or "1.4万"
pub(crate) fn parse_count(raw: &str) -> u64 {
    let multiplier = if raw.contains('亿') {
        100_000_000.0
    } else if raw.contains('万') || raw.contains('w') || raw.contains('W') {
        10_000.0
    } else {
        1.0
    };
    let number: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match number.parse::<f64>() {
        Ok(value) => (value * multiplier).round() as u64,
        Err(_) => 0,
    }
}

/// Resolve a raw attribute value to an absolute http(s) URL
///
/// Empty values, `data:` URIs and non-http schemes are ignored.
pub(crate) fn resolve_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") || raw.starts_with("javascript:") {
        return None;
    }
    let resolved = base.join(raw).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Absolute URL of an image element, honoring lazy-loading attributes
pub(crate) fn image_url(el: ElementRef<'_>, base: &Url) -> Option<String> {
    IMAGE_ATTRS
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .find_map(|value| resolve_url(base, value))
}

/// Absolute URL of a video element, from `src` or its first `<source>`
pub(crate) fn video_url(el: ElementRef<'_>, base: &Url) -> Option<String> {
    el.value()
        .attr("src")
        .or_else(|| select_first(el, "source[src]").and_then(|s| s.value().attr("src")))
        .and_then(|src| resolve_url(base, src))
}

/// Ordered, URL-unique media list
#[derive(Debug, Default)]
pub(crate) struct MediaCollector {
    items: Vec<MediaReference>,
    seen: HashSet<String>,
}

impl MediaCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a reference; returns false if the URL was already collected
    pub(crate) fn push(&mut self, url: &str, role: &str, kind: MediaKind) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.items.push(MediaReference::new(url, role, kind));
        true
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn into_vec(self) -> Vec<MediaReference> {
        self.items
    }
}

/// Markdown, plain-text and html renderings of one element
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Rendered {
    pub markdown: String,
    pub text: String,
    /// Cleaned markup; every `img`/`video` carries its absolute URL in `src`
    pub html: String,
}

/// Render an element to markdown and text, collecting its media under `role`
pub(crate) fn render_element(
    el: ElementRef<'_>,
    base: &Url,
    media: &mut MediaCollector,
    role: &str,
) -> Rendered {
    let mut markdown = String::new();
    Walker {
        markdown: true,
        base: Some(base),
        media: Some(media),
        role,
        pre_depth: 0,
        lists: Vec::new(),
    }
    .children(el, &mut markdown);

    let mut html = String::new();
    HtmlWriter { base, local: None }.element(el, &mut html);

    Rendered {
        markdown: filter_excessive_newlines(&markdown),
        text: element_text(el),
        html,
    }
}

/// Re-serialize markup with media elements pointing at local files
///
/// Each `img` and `video` is resolved the same way extraction resolves it
/// (lazy-loading attributes first, relative URLs joined to `base`), so raw
/// page markup and cleaned markup are both handled. Unmapped media keep
/// their absolute remote URL.
pub(crate) fn rewrite_media_sources(html: &str, base: &Url, local: &HashMap<String, String>) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    HtmlWriter {
        base,
        local: Some(local),
    }
    .children(fragment.root_element(), &mut out);
    out
}

/// Plain text of an element with paragraph structure kept
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let mut text = String::new();
    Walker {
        markdown: false,
        base: None,
        media: None,
        role: "",
        pre_depth: 0,
        lists: Vec::new(),
    }
    .children(el, &mut text);
    filter_excessive_newlines(&text)
}

/// Escape text for use inside an HTML rendering
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct Walker<'a> {
    markdown: bool,
    base: Option<&'a Url>,
    media: Option<&'a mut MediaCollector>,
    role: &'a str,
    pre_depth: usize,
    /// `None` for unordered lists, the next number for ordered ones
    lists: Vec<Option<usize>>,
}

impl Walker<'_> {
    fn children(&mut self, el: ElementRef<'_>, out: &mut String) {
        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                self.element(child_el, out);
            } else if let Node::Text(text) = child.value() {
                self.text(text, out);
            }
        }
    }

    fn text(&mut self, text: &str, out: &mut String) {
        if self.pre_depth > 0 {
            out.push_str(text);
            return;
        }
        let mut last_space = out.is_empty() || out.ends_with(char::is_whitespace);
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    out.push(' ');
                    last_space = true;
                }
            } else {
                out.push(c);
                last_space = false;
            }
        }
    }

    /// Render children into a fresh buffer
    fn inner(&mut self, el: ElementRef<'_>) -> String {
        let mut buf = String::new();
        self.children(el, &mut buf);
        buf
    }

    fn element(&mut self, el: ElementRef<'_>, out: &mut String) {
        let name = el.value().name();
        if SKIPPED_ELEMENTS.contains(&name) {
            return;
        }

        match name {
            "br" => out.push('\n'),
            "hr" => {
                blank_line(out);
                if self.markdown {
                    out.push_str("---");
                }
                blank_line(out);
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let inner = clean_whitespace(&self.inner(el));
                if inner.is_empty() {
                    return;
                }
                blank_line(out);
                if self.markdown {
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                }
                out.push_str(&inner);
                blank_line(out);
            }
            "strong" | "b" => self.wrap_inline(el, "**", out),
            "em" | "i" => self.wrap_inline(el, "*", out),
            "code" if self.pre_depth == 0 => self.wrap_inline(el, "`", out),
            "pre" => {
                blank_line(out);
                if self.markdown {
                    out.push_str("```\n");
                }
                self.pre_depth += 1;
                self.children(el, out);
                self.pre_depth -= 1;
                if self.markdown {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str("```");
                }
                blank_line(out);
            }
            "blockquote" => {
                let inner = filter_excessive_newlines(&self.inner(el));
                if inner.is_empty() {
                    return;
                }
                blank_line(out);
                if self.markdown {
                    let quoted = inner
                        .lines()
                        .map(|line| format!("> {}", line).trim_end().to_string())
                        .collect::<Vec<_>>()
                        .join("\n");
                    out.push_str(&quoted);
                } else {
                    out.push_str(&inner);
                }
                blank_line(out);
            }
            "ul" | "ol" => {
                blank_line(out);
                self.lists.push(if name == "ol" { Some(1) } else { None });
                self.children(el, out);
                self.lists.pop();
                blank_line(out);
            }
            "li" => {
                line_break(out);
                let depth = self.lists.len().saturating_sub(1);
                out.push_str(&"  ".repeat(depth));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "- ".to_string(),
                };
                out.push_str(&marker);
                let inner = clean_whitespace(&self.inner(el));
                out.push_str(&inner);
                line_break(out);
            }
            "a" => {
                let inner = clean_whitespace(&self.inner(el));
                let href = match self.base {
                    Some(base) if self.markdown => el
                        .value()
                        .attr("href")
                        .and_then(|href| resolve_url(base, href)),
                    _ => None,
                };
                match href {
                    Some(href) if !inner.is_empty() => {
                        out.push_str(&format!("[{}]({})", inner, href));
                    }
                    _ => self.text(&inner, out),
                }
            }
            "img" => self.image(el, out),
            "video" => self.video(el, out),
            "td" | "th" => {
                self.children(el, out);
                out.push(' ');
            }
            _ if BLOCK_ELEMENTS.contains(&name) => {
                blank_line(out);
                self.children(el, out);
                blank_line(out);
            }
            _ => self.children(el, out),
        }
    }

    fn wrap_inline(&mut self, el: ElementRef<'_>, marker: &str, out: &mut String) {
        let inner = self.inner(el);
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.markdown {
            if !out.is_empty() && !out.ends_with(char::is_whitespace) && inner.starts_with(' ') {
                out.push(' ');
            }
            out.push_str(marker);
            out.push_str(trimmed);
            out.push_str(marker);
        } else {
            self.text(&inner, out);
        }
    }

    fn image(&mut self, el: ElementRef<'_>, out: &mut String) {
        if !self.markdown {
            return;
        }
        let Some(base) = self.base else { return };
        let Some(url) = image_url(el, base) else {
            return;
        };
        if let Some(media) = self.media.as_deref_mut() {
            media.push(&url, self.role, MediaKind::Image);
        }
        let alt = clean_whitespace(el.value().attr("alt").unwrap_or(""));
        blank_line(out);
        out.push_str(&format!("![{}]({})", alt, url));
        blank_line(out);
    }

    fn video(&mut self, el: ElementRef<'_>, out: &mut String) {
        if !self.markdown {
            return;
        }
        let Some(base) = self.base else { return };
        let Some(url) = video_url(el, base) else { return };
        if let Some(media) = self.media.as_deref_mut() {
            media.push(&url, self.role, MediaKind::Video);
        }
        blank_line(out);
        out.push_str(&format!("[video]({})", url));
        blank_line(out);
    }
}

/// Serializes an element tree to cleaned markup
///
/// Scripts and other skipped elements are dropped, attributes are reduced to
/// [`KEPT_ATTRS`], and links and media get absolute URLs.
struct HtmlWriter<'a> {
    base: &'a Url,
    /// Remote URL to record-relative path
    local: Option<&'a HashMap<String, String>>,
}

impl HtmlWriter<'_> {
    fn children(&self, el: ElementRef<'_>, out: &mut String) {
        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                self.element(child_el, out);
            } else if let Node::Text(text) = child.value() {
                out.push_str(&escape_html(text));
            }
        }
    }

    fn element(&self, el: ElementRef<'_>, out: &mut String) {
        let name = el.value().name();
        if SKIPPED_ELEMENTS.contains(&name) {
            return;
        }
        match name {
            "img" => {
                let Some(url) = image_url(el, self.base) else { return };
                out.push_str(&format!("<img src=\"{}\"", escape_html(self.source(&url))));
                self.attrs(el, out);
                out.push('>');
            }
            "video" => {
                let Some(url) = video_url(el, self.base) else { return };
                out.push_str(&format!("<video src=\"{}\" controls", escape_html(self.source(&url))));
                self.attrs(el, out);
                out.push_str("></video>");
            }
            _ => {
                out.push('<');
                out.push_str(name);
                if name == "a" {
                    if let Some(href) = el.value().attr("href").and_then(|h| resolve_url(self.base, h)) {
                        out.push_str(&format!(" href=\"{}\"", escape_html(&href)));
                    }
                }
                self.attrs(el, out);
                out.push('>');
                if VOID_ELEMENTS.contains(&name) {
                    return;
                }
                self.children(el, out);
                out.push_str(&format!("</{}>", name));
            }
        }
    }

    fn attrs(&self, el: ElementRef<'_>, out: &mut String) {
        for (name, value) in el.value().attrs() {
            if KEPT_ATTRS.contains(&name) {
                out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
            }
        }
    }

    fn source<'u>(&'u self, url: &'u str) -> &'u str {
        self.local
            .and_then(|local| local.get(url))
            .map(String::as_str)
            .unwrap_or(url)
    }
}

/// Ensure the buffer ends with a blank line (no-op on an empty buffer)
fn blank_line(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while out.ends_with(' ') {
        out.pop();
    }
    if out.ends_with("\n\n") {
        return;
    }
    if out.ends_with('\n') {
        out.push('\n');
    } else {
        out.push_str("\n\n");
    }
}

fn line_break(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

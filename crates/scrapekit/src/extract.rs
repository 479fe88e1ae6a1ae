//! Content extraction
//!
//! Turns markup into a [`ContentRecord`] using CSS selectors. Extraction
//! never fails: missing structure only lowers the quality of the output.

use crate::config::DEFAULT_MIN_CONTENT_LENGTH;
use crate::types::{ContentRecord, RetrievalTier};
use chrono::Utc;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashSet;
use url::Url;

/// Title used when the page has neither `<title>` nor `<h1>`
pub const UNTITLED: &str = "Untitled";

/// Content containers, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".story-body",
    ".content-body",
    "#content",
    ".content",
    "#main",
    "body",
];

/// Elements that never contribute to body text
const NOISE_SELECTOR: &str = "script, style, noscript, template, iframe, svg, nav, header, \
     footer, aside, form, button, [role='navigation'], [role='banner'], \
     [role='contentinfo'], [aria-hidden='true'], .advertisement, .ads, .ad, \
     .social-share, .share-buttons, .cookie-banner, .cookie-notice, .popup, \
     .modal, .newsletter, .sidebar, .comments";

/// Elements that start a new line in extracted text
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// Heuristic extractor for the canonical content record
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    min_content_length: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONTENT_LENGTH)
    }
}

impl ContentExtractor {
    /// Create an extractor accepting containers longer than `min_content_length` chars
    pub fn new(min_content_length: usize) -> Self {
        Self { min_content_length }
    }

    /// Parse `markup` fetched from `url` into a content record
    pub fn extract(&self, markup: &str, url: &str) -> ContentRecord {
        let document = Html::parse_document(markup);
        let base = Url::parse(url).ok();

        ContentRecord {
            url: url.to_string(),
            title: extract_title(&document),
            body_text: self.extract_body(&document),
            raw_markup: markup.to_string(),
            links: collect_urls(&document, &selector("a[href]"), "href", base.as_ref()),
            images: collect_urls(&document, &selector("img[src]"), "src", base.as_ref()),
            metadata: extract_meta(&document),
            retrieved_at: Utc::now(),
            retrieved_via: RetrievalTier::Static,
            screenshot: None,
        }
    }

    fn extract_body(&self, document: &Html) -> String {
        let noise = selector(NOISE_SELECTOR);

        for candidate in CONTENT_SELECTORS {
            let Ok(sel) = Selector::parse(candidate) else {
                continue;
            };
            if let Some(element) = document.select(&sel).next() {
                let text = normalize_text(&stripped_text(element, &noise));
                if text.chars().count() > self.min_content_length {
                    return text;
                }
            }
        }

        // Nothing substantial: use whatever is left of the whole document.
        let body = selector("body");
        let root = document
            .select(&body)
            .next()
            .unwrap_or_else(|| document.root_element());
        normalize_text(&stripped_text(root, &noise))
    }
}

/// Extract with the default minimum content length
pub fn extract(markup: &str, url: &str) -> ContentRecord {
    ContentExtractor::default().extract(markup, url)
}

/// Collapse whitespace while keeping paragraph structure
///
/// Runs of spaces and tabs become one space, two or more line breaks become
/// exactly one blank line, and the result is trimmed.
pub fn normalize_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newlines = 0;

    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
        } else if c.is_whitespace() {
            pending_space = true;
        } else {
            if !result.is_empty() {
                match newlines {
                    0 if pending_space => result.push(' '),
                    0 => {}
                    1 => result.push('\n'),
                    _ => result.push_str("\n\n"),
                }
            }
            newlines = 0;
            pending_space = false;
            result.push(c);
        }
    }

    result
}

/// Text of an element with every run of whitespace collapsed to one space
pub(crate) fn inline_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Text of an element with block structure kept as line breaks
pub(crate) fn block_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &|_| false, &mut out);
    out
}

/// Resolve a reference against the page address
///
/// Returns `None` for empty, script and unparseable references.
pub(crate) fn resolve_url(base: Option<&Url>, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || reference.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(reference),
        None => Url::parse(reference),
    };
    resolved.ok().map(|u| u.to_string())
}

/// Resolve `attr` of every element matching `sel`, deduplicated in document order
pub(crate) fn collect_urls(
    document: &Html,
    sel: &Selector,
    attr: &str,
    base: Option<&Url>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(sel)
        .filter_map(|el| el.value().attr(attr))
        .filter_map(|reference| resolve_url(base, reference))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Parse a selector that is known to be valid
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| panic!("static selector is valid: {css}"))
}

fn extract_title(document: &Html) -> String {
    ["title", "h1"]
        .iter()
        .filter_map(|css| document.select(&selector(css)).next())
        .map(inline_text)
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn extract_meta(document: &Html) -> Map<String, Value> {
    let mut metadata = Map::new();
    for meta in document.select(&selector("meta[content]")) {
        let element = meta.value();
        let key = element.attr("name").or_else(|| element.attr("property"));
        if let (Some(key), Some(content)) = (key, element.attr("content")) {
            metadata.insert(key.to_string(), Value::String(content.to_string()));
        }
    }
    metadata
}

fn stripped_text(element: ElementRef<'_>, noise: &Selector) -> String {
    let skip: HashSet<_> = element.select(noise).map(|el| el.id()).collect();
    let mut out = String::new();
    collect_text(element, &|el| skip.contains(&el.id()), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, skip: &dyn Fn(ElementRef<'_>) -> bool, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if skip(child) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push('\n');
                }
                collect_text(child, skip, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

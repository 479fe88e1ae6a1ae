//! Rule-based extraction
//!
//! A rule set names CSS selectors for the fields of a [`ContentRecord`].
//! Applying one re-parses the record's stored markup, so different rules
//! can be tried without fetching the page again.

use crate::error::ScrapeError;
use crate::extract::{block_text, collect_urls, inline_text, normalize_text};
use crate::types::ContentRecord;
use schemars::JsonSchema;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;
use url::Url;

/// Metadata key holding the custom field values of the applied rule
pub const CUSTOM_DATA_KEY: &str = "customData";

/// Metadata key holding the name of the applied rule set
pub const APPLIED_RULE_SET_KEY: &str = "appliedRuleSet";

/// Selectors describing how to derive a content record from markup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionRule {
    /// Selector for the title (first match wins)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Selector for the body text (all matches, joined by blank lines)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Selector for anchors whose hrefs replace the link list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<String>,

    /// Selector for images whose sources replace the image list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,

    /// Selectors removed from the document before anything is read
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Output field name to selector
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}

impl ExtractionRule {
    /// Every selector the rule contains
    fn selectors(&self) -> impl Iterator<Item = &String> {
        self.title
            .iter()
            .chain(self.content.iter())
            .chain(self.links.iter())
            .chain(self.images.iter())
            .chain(self.exclude.iter())
            .chain(self.custom.values())
    }
}

/// A named extraction rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleSet {
    pub name: String,
    pub rules: ExtractionRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Process-lifetime registry of rule sets
///
/// Registration is last-write-wins per name. The built-in sets are plain
/// entries: callers may overwrite or remove them.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    sets: RwLock<BTreeMap<String, RuleSet>>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in rule sets
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut sets = registry.sets.write().unwrap_or_else(PoisonError::into_inner);
            for set in builtin_rule_sets() {
                sets.insert(set.name.clone(), set);
            }
        }
        registry
    }

    /// Register or replace a rule set
    ///
    /// Fails without touching the registry if any selector is invalid.
    pub fn register(
        &self,
        name: impl Into<String>,
        rules: ExtractionRule,
        description: Option<String>,
    ) -> Result<(), ScrapeError> {
        for css in rules.selectors() {
            parse_selector(css)?;
        }

        let name = name.into();
        debug!(rule_set = %name, "Registering rule set");
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.clone(),
                RuleSet {
                    name,
                    rules,
                    description,
                },
            );
        Ok(())
    }

    /// Look up a rule set by name
    pub fn get(&self, name: &str) -> Option<RuleSet> {
        self.sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names in lexical order
    pub fn list(&self) -> Vec<String> {
        self.sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Remove a rule set, returning whether it existed
    pub fn remove(&self, name: &str) -> bool {
        self.sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Derive a new record from `record` using the named rule set
    pub fn apply(&self, name: &str, record: &ContentRecord) -> Result<ContentRecord, ScrapeError> {
        let set = self
            .get(name)
            .ok_or_else(|| ScrapeError::UnknownRuleSet(name.to_string()))?;
        apply_rule(&set.name, &set.rules, record)
    }
}

/// Apply `rule` to the stored markup of `record`
///
/// Fields the rule leaves unset are inherited from `record`. Link and image
/// selectors replace their lists entirely, even with nothing.
pub fn apply_rule(
    name: &str,
    rule: &ExtractionRule,
    record: &ContentRecord,
) -> Result<ContentRecord, ScrapeError> {
    let mut document = Html::parse_document(&record.raw_markup);

    for css in &rule.exclude {
        let sel = parse_selector(css)?;
        let ids: Vec<_> = document.select(&sel).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    let base = Url::parse(&record.url).ok();

    let mut title = record.title.clone();
    if let Some(css) = &rule.title {
        if let Some(element) = document.select(&parse_selector(css)?).next() {
            title = inline_text(element);
        }
    }

    let mut body_text = record.body_text.clone();
    if let Some(css) = &rule.content {
        let parts: Vec<String> = document
            .select(&parse_selector(css)?)
            .map(block_text)
            .collect();
        if !parts.is_empty() {
            body_text = normalize_text(&parts.join("\n\n"));
        }
    }

    let links = match &rule.links {
        Some(css) => collect_urls(&document, &parse_selector(css)?, "href", base.as_ref()),
        None => record.links.clone(),
    };

    let images = match &rule.images {
        Some(css) => collect_urls(&document, &parse_selector(css)?, "src", base.as_ref()),
        None => record.images.clone(),
    };

    let mut custom = Map::new();
    for (field, css) in &rule.custom {
        let mut values: Vec<String> = document
            .select(&parse_selector(css)?)
            .map(inline_text)
            .collect();
        match values.len() {
            0 => {}
            1 => {
                custom.insert(field.clone(), Value::String(values.remove(0)));
            }
            _ => {
                custom.insert(
                    field.clone(),
                    Value::Array(values.into_iter().map(Value::String).collect()),
                );
            }
        }
    }

    let mut metadata = record.metadata.clone();
    metadata.insert(CUSTOM_DATA_KEY.to_string(), Value::Object(custom));
    metadata.insert(
        APPLIED_RULE_SET_KEY.to_string(),
        Value::String(name.to_string()),
    );

    Ok(ContentRecord {
        title,
        body_text,
        links,
        images,
        metadata,
        ..record.clone()
    })
}

fn parse_selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|_| ScrapeError::InvalidSelector(css.to_string()))
}

fn rule_set(
    name: &str,
    description: &str,
    rules: ExtractionRule,
) -> RuleSet {
    RuleSet {
        name: name.to_string(),
        rules,
        description: Some(description.to_string()),
    }
}

fn custom(fields: &[(&str, &str)]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Rule sets registered at startup
pub fn builtin_rule_sets() -> Vec<RuleSet> {
    vec![
        rule_set(
            "blog",
            "Blog posts: post body, author, date and tags",
            ExtractionRule {
                title: Some("h1.entry-title, h1.post-title, article h1, h1".to_string()),
                content: Some(".post-content, .entry-content, article .content".to_string()),
                exclude: strings(&[".comments", ".related-posts", ".share-buttons", ".sidebar"]),
                custom: custom(&[
                    ("author", ".author, .byline, [rel='author']"),
                    ("date", "time, .post-date, .published"),
                    ("tags", ".tags a, .post-tags a"),
                ]),
                ..Default::default()
            },
        ),
        rule_set(
            "news",
            "News articles: headline, story text, byline and timestamp",
            ExtractionRule {
                title: Some("h1.headline, .article-title, h1".to_string()),
                content: Some(".article-body p, .story-body p, article p".to_string()),
                exclude: strings(&[".advertisement", ".related-articles", ".newsletter-signup"]),
                custom: custom(&[
                    ("author", ".byline, .author-name"),
                    ("published", "time, .timestamp"),
                    ("category", ".category, .section-name"),
                ]),
                ..Default::default()
            },
        ),
        rule_set(
            "product",
            "Product pages: name, description, gallery, price and stock",
            ExtractionRule {
                title: Some(".product-title, .product-name, h1".to_string()),
                content: Some(".product-description, #description".to_string()),
                images: Some(".product-images img, .product-gallery img".to_string()),
                custom: custom(&[
                    ("price", ".price, .product-price, [itemprop='price']"),
                    ("availability", ".availability, .stock-status"),
                    ("rating", ".rating, [itemprop='ratingValue']"),
                    ("sku", ".sku, [itemprop='sku']"),
                ]),
                ..Default::default()
            },
        ),
        rule_set(
            "documentation",
            "Technical documentation: main text, code samples and breadcrumbs",
            ExtractionRule {
                title: Some("main h1, article h1, h1".to_string()),
                content: Some("main, .documentation, .docs-content, article".to_string()),
                links: Some("main a, .documentation a, article a".to_string()),
                exclude: strings(&["nav", ".sidebar", ".toc", ".edit-page", ".page-footer"]),
                custom: custom(&[
                    ("breadcrumbs", ".breadcrumb a, .breadcrumbs a"),
                    ("code_samples", "pre code"),
                    ("version", ".version, .version-selector .current"),
                ]),
                ..Default::default()
            },
        ),
        rule_set(
            "forum",
            "Forum threads: thread title, posts, authors and reply counts",
            ExtractionRule {
                title: Some(".thread-title, .topic-title, h1".to_string()),
                content: Some(".post-content, .message-body, .post-body".to_string()),
                exclude: strings(&[".signature", ".advertisement", ".quick-reply"]),
                custom: custom(&[
                    ("authors", ".username, .post-author"),
                    ("replies", ".reply-count, .replies"),
                ]),
                ..Default::default()
            },
        ),
    ]
}

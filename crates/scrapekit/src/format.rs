//! Output formatting for content records

use crate::error::ScrapeError;
use crate::rules::CUSTOM_DATA_KEY;
use crate::types::ContentRecord;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::str::FromStr;
use tracing::warn;

/// Output format for a content record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Text,
    Html,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Text => "text",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "text" | "txt" => Ok(OutputFormat::Text),
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ScrapeError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Render `record` in the given format
pub fn render(record: &ContentRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Markdown => to_markdown(record),
        OutputFormat::Text => to_text(record),
        OutputFormat::Html => record.raw_markup.clone(),
        OutputFormat::Json => to_json(record),
    }
}

/// Render `record` using a format tag such as `"markdown"`
pub fn render_as(record: &ContentRecord, format: &str) -> Result<String, ScrapeError> {
    Ok(render(record, format.parse()?))
}

fn to_markdown(record: &ContentRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", record.title);
    let _ = writeln!(out, "**Source:** {}\n", record.url);

    if !record.body_text.is_empty() {
        let _ = writeln!(out, "{}\n", record.body_text);
    }

    if let Some(custom) = record.metadata.get(CUSTOM_DATA_KEY) {
        if let Ok(json) = serde_json::to_string_pretty(custom) {
            let _ = writeln!(out, "## Custom Data\n\n```json\n{json}\n```\n");
        }
    }

    if !record.links.is_empty() {
        out.push_str("## Links\n\n");
        for link in &record.links {
            let _ = writeln!(out, "- {link}");
        }
        out.push('\n');
    }

    if !record.images.is_empty() {
        out.push_str("## Images\n\n");
        for image in &record.images {
            let _ = writeln!(out, "- ![]({image})");
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn to_text(record: &ContentRecord) -> String {
    if record.body_text.is_empty() {
        return record.title.clone();
    }
    format!("{}\n\n{}", record.title, record.body_text)
}

fn to_json(record: &ContentRecord) -> String {
    to_pretty_json(record)
}

/// Pretty-printed JSON, or `{}` if `value` cannot be serialized
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize value");
            String::from("{}")
        }
    }
}

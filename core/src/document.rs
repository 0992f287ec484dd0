use anyhow::{bail, Context, Result};
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};

/// One page of the site collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub url: String,
    /// Site section, used as the category facet.
    pub section: String,
    pub date: String,
}

impl Document {
    /// Text that gets tokenized and counted for this document.
    pub fn indexable_text(&self) -> String {
        format!("{} {} {}", self.title, self.content, self.summary)
    }

    fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).unwrap_or("").to_string();
        Self {
            title: decode_entities(&field("title")),
            content: decode_entities(&field("content")),
            summary: decode_entities(&field("summary")),
            url: field("url"),
            section: field("section"),
            date: field("date"),
        }
    }
}

/// Decode HTML entities in a text field. Literal `<` and `>` are kept as text.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') { return text.to_string(); }
    let guarded = text.replace('<', "&lt;").replace('>', "&gt;");
    let fragment = Html::parse_fragment(&guarded);
    fragment.root_element().text().collect()
}

/// Parse the JSON collection. Entries that are not objects, or fields that are
/// not strings, degrade to empty strings; anything but a JSON array is an error.
pub fn parse_collection(bytes: &[u8]) -> Result<Vec<Document>> {
    let json: Value = serde_json::from_slice(bytes).context("decode document collection")?;
    let Value::Array(entries) = json else {
        bail!("document collection must be a JSON array");
    };
    Ok(entries.iter().map(Document::from_value).collect())
}

/// Collection URL carrying the build hash as a cache-busting parameter.
pub fn collection_url(base: &str, build_hash: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}hash={build_hash}")
}

/// SHA-1 hex digest of the raw collection bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

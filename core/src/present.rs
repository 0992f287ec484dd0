use crate::document::Document;
use crate::index::DocId;
use crate::query::SearchHit;
use regex::RegexBuilder;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

const CONTEXT_LEAD: usize = 50;
const CONTEXT_LEN: usize = 200;
const FALLBACK_LEN: usize = 150;
const MAX_VISIBLE_PAGES: i64 = 10;
const GAP_STEP: i64 = 5;

/// Text window around the strongest token occurrence in the document content.
///
/// Literal query tokens weigh three times their length, other matched tokens
/// their length. Without any occurrence the summary (or the head of the
/// content) stands in.
pub fn excerpt(doc: &Document, matched_tokens: &[String], query_tokens: &[String]) -> String {
    if doc.content.is_empty() { return doc.summary.clone(); }
    let candidates = if query_tokens.is_empty() { matched_tokens } else { query_tokens };

    let mut best_start = 0usize;
    let mut best_score = 0usize;
    for token in candidates {
        if token.is_empty() { continue; }
        let Some(byte_idx) = find_case_insensitive(&doc.content, token) else { continue };
        let char_idx = doc.content[..byte_idx].chars().count();
        let weight = if query_tokens.contains(token) { 3 } else { 1 };
        let score = token.chars().count() * weight;
        if score > best_score {
            best_score = score;
            best_start = char_idx.saturating_sub(CONTEXT_LEAD);
        }
    }

    let chars: Vec<char> = doc.content.chars().collect();
    if best_score == 0 {
        if !doc.summary.is_empty() { return doc.summary.clone(); }
        let head: String = chars.iter().take(FALLBACK_LEN).collect();
        return format!("{head}...");
    }

    let start = best_start.min(chars.len());
    let end = (start + CONTEXT_LEN).min(chars.len());
    let mut context: String = chars[start..end].iter().collect();
    if start > 0 { context.insert_str(0, "..."); }
    if start + CONTEXT_LEN < chars.len() { context.push_str("..."); }
    context
}

/// Byte offset of the first case-insensitive match of `needle` in `haystack`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let re = RegexBuilder::new(&regex::escape(needle)).case_insensitive(true).build().ok()?;
    re.find(haystack).map(|m| m.start())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML-escape `text` and wrap case-insensitive token matches in `<mark>`.
/// Single-character tokens are not highlighted.
pub fn highlight(text: &str, tokens: &[String]) -> String {
    let mut valid: Vec<&str> = tokens.iter().map(String::as_str).filter(|t| t.chars().count() > 1).collect();
    if text.is_empty() || valid.is_empty() { return escape_html(text); }
    valid.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
    let pattern = valid.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
        return escape_html(text);
    };

    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&escape_html(&text[last..m.start()]));
        out.push_str("<mark>");
        out.push_str(&escape_html(m.as_str()));
        out.push_str("</mark>");
        last = m.end();
    }
    out.push_str(&escape_html(&text[last..]));
    out
}

/// Ordered hits of one query plus the tokens it was parsed into.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    pub query: String,
    pub query_tokens: Vec<String>,
    pub hits: Vec<SearchHit>,
    #[serde(skip)]
    pub took: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedHit {
    pub doc_id: DocId,
    pub title: String,
    pub url: String,
    pub section: String,
    pub date: String,
    pub score: f64,
    pub matched_tokens: Vec<String>,
    pub title_html: String,
    pub excerpt_html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub page: usize,
    pub total_pages: usize,
    pub total_hits: usize,
    pub hits: Vec<RenderedHit>,
}

impl ResultSet {
    pub fn empty(query: &str) -> Self {
        Self { query: query.to_string(), query_tokens: Vec::new(), hits: Vec::new(), took: Duration::ZERO }
    }

    pub fn len(&self) -> usize { self.hits.len() }
    pub fn is_empty(&self) -> bool { self.hits.is_empty() }

    pub fn total_pages(&self, page_size: usize) -> usize {
        self.hits.len().div_ceil(page_size.max(1)).max(1)
    }

    /// One 1-based page of rendered hits; out-of-range pages are clamped.
    pub fn page(&self, page: usize, page_size: usize) -> Page {
        let page_size = page_size.max(1);
        let total_pages = self.total_pages(page_size);
        let page = page.clamp(1, total_pages);
        let hits = self
            .hits
            .iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(|hit| self.render(hit))
            .collect();
        Page { page, total_pages, total_hits: self.hits.len(), hits }
    }

    fn render(&self, hit: &SearchHit) -> RenderedHit {
        let doc = &hit.document;
        let context = excerpt(doc, &hit.matched_tokens, &self.query_tokens);
        let mut seen: HashSet<&String> = HashSet::new();
        let marks: Vec<String> = self
            .query_tokens
            .iter()
            .chain(hit.matched_tokens.iter())
            .filter(|t| seen.insert(*t))
            .cloned()
            .collect();
        RenderedHit {
            doc_id: hit.doc_id,
            title: doc.title.clone(),
            url: doc.url.clone(),
            section: doc.section.clone(),
            date: doc.date.clone(),
            score: hit.score,
            matched_tokens: hit.matched_tokens.clone(),
            title_html: highlight(&doc.title, &self.query_tokens),
            excerpt_html: highlight(&context, &marks),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageSlot {
    Number { page: usize, current: bool },
    /// Jump over hidden pages to `target`.
    Gap { target: usize, backward: bool },
}

/// Page-number layout: first page, a window around `current`, last page, with
/// gaps where numbers are hidden.
pub fn page_window(current: usize, total: usize) -> Vec<PageSlot> {
    let total_i = total.max(1) as i64;
    let current_i = (current as i64).clamp(1, total_i);
    let show_left = current_i > 2;
    let show_right = current_i < total_i - 1;
    let visible = MAX_VISIBLE_PAGES - 2 - show_left as i64 - show_right as i64;

    let mut start = 2i64.max(current_i - visible / 2);
    let end = (total_i - 1).min(start + visible - 1);
    if end == total_i - 1 {
        start = 2i64.max(end - visible + 1);
    }

    let number = |page: i64| PageSlot::Number { page: page as usize, current: page == current_i };
    let mut slots = vec![number(1)];
    if show_left && start > 2 {
        slots.push(PageSlot::Gap { target: 1i64.max(current_i - GAP_STEP) as usize, backward: true });
    }
    for page in start..=end {
        slots.push(number(page));
    }
    if show_right && end < total_i - 1 {
        slots.push(PageSlot::Gap { target: total_i.min(current_i + GAP_STEP) as usize, backward: false });
    }
    if total_i > 1 {
        slots.push(number(total_i));
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> { list.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn excerpt_prefers_query_tokens() {
        let content = format!("{}needle here and more text", "x ".repeat(60));
        let doc = Document { content: content.clone(), summary: "sum".into(), ..Default::default() };
        let text = excerpt(&doc, &[], &tokens(&["needle"]));
        assert!(text.starts_with("..."));
        assert!(text.contains("needle here"));
    }

    #[test]
    fn excerpt_window_tracks_original_characters() {
        let content = format!("{} target word", "İ".repeat(70));
        let doc = Document { content, ..Default::default() };
        let text = excerpt(&doc, &[], &tokens(&["target"]));
        assert!(text.starts_with("..."));
        assert!(text.ends_with("target word"));
        assert_eq!(text.chars().filter(|c| *c == 'İ').count(), 49);
    }

    #[test]
    fn excerpt_falls_back_to_summary_then_head() {
        let doc = Document { content: "nothing relevant".into(), summary: "the summary".into(), ..Default::default() };
        assert_eq!(excerpt(&doc, &[], &tokens(&["absent"])), "the summary");
        let doc = Document { content: "nothing relevant".into(), ..Default::default() };
        assert_eq!(excerpt(&doc, &[], &tokens(&["absent"])), "nothing relevant...");
        let doc = Document { summary: "only summary".into(), ..Default::default() };
        assert_eq!(excerpt(&doc, &[], &tokens(&["x"])), "only summary");
    }

    #[test]
    fn highlight_marks_and_escapes() {
        let html = highlight("Red <fox> and red", &tokens(&["red", "x"]));
        assert_eq!(html, "<mark>Red</mark> &lt;fox&gt; and <mark>red</mark>");
    }

    #[test]
    fn window_for_small_and_large_totals() {
        assert_eq!(page_window(1, 1), vec![PageSlot::Number { page: 1, current: true }]);
        let slots = page_window(10, 20);
        assert_eq!(slots.first(), Some(&PageSlot::Number { page: 1, current: false }));
        assert!(slots.contains(&PageSlot::Gap { target: 5, backward: true }));
        assert!(slots.contains(&PageSlot::Gap { target: 15, backward: false }));
        assert!(slots.contains(&PageSlot::Number { page: 10, current: true }));
        assert_eq!(slots.last(), Some(&PageSlot::Number { page: 20, current: false }));
    }
}

use crate::document::Document;
use crate::index::{DocId, SearchIndex, MIN_PREFIX_LEN};
use crate::tokenizer::{tokenize_with, TokenizerConfig};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Prefix expansions kept per query token.
    pub max_expansions: usize,
    pub exact_boost: f64,
    pub title_boost: f64,
    pub prefix_damping: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_expansions: 20, exact_boost: 2.0, title_boost: 1.5, prefix_damping: 0.8 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Relevance,
    DateDesc,
    DateAsc,
}

impl From<&str> for SortOrder {
    /// Unknown names fall back to relevance.
    fn from(s: &str) -> Self {
        match s {
            "date-desc" => SortOrder::DateDesc,
            "date-asc" => SortOrder::DateAsc,
            _ => SortOrder::Relevance,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub document: Document,
    pub score: f64,
    pub matched_tokens: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub query_tokens: Vec<String>,
    pub hits: Vec<SearchHit>,
}

/// Scores documents of one index against free-text queries.
pub struct QueryEngine<'a> {
    index: &'a SearchIndex,
    tokenizer: &'a TokenizerConfig,
    config: &'a QueryConfig,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a SearchIndex, tokenizer: &'a TokenizerConfig, config: &'a QueryConfig) -> Self {
        Self { index, tokenizer, config }
    }

    pub fn search(&self, query: &str, filters: &SearchFilters) -> QueryOutcome {
        if query.trim().is_empty() { return QueryOutcome::default(); }
        let query_tokens = tokenize_with(query, self.tokenizer);
        if query_tokens.is_empty() { return QueryOutcome::default(); }

        let candidates = self.expand(&query_tokens);
        let hits = self.score(&query_tokens, &candidates);
        let mut hits = apply_filters(hits, filters);
        sort_hits(&mut hits, filters.sort);
        QueryOutcome { query_tokens, hits }
    }

    /// Query tokens followed by their prefix expansions, without duplicates.
    fn expand(&self, query_tokens: &[String]) -> Vec<String> {
        let mut seen: HashSet<String> = query_tokens.iter().cloned().collect();
        let mut candidates = query_tokens.to_vec();
        for qt in query_tokens {
            if qt.chars().count() < MIN_PREFIX_LEN { continue; }
            for token in self.index.prefix_search(qt, self.config.max_expansions) {
                if seen.insert(token.clone()) {
                    candidates.push(token);
                }
            }
        }
        candidates
    }

    fn score(&self, query_tokens: &[String], candidates: &[String]) -> Vec<SearchHit> {
        let literal: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
        let mut order: Vec<DocId> = Vec::new();
        let mut acc: HashMap<DocId, (f64, Vec<String>)> = HashMap::new();
        let mut titles: HashMap<DocId, String> = HashMap::new();

        for token in candidates {
            let is_literal = literal.contains(token.as_str());
            let expanded = !is_literal && query_tokens.iter().any(|qt| token.starts_with(qt.as_str()));
            for posting in self.index.postings(token) {
                let Some(doc) = self.index.document(posting.doc_id) else { continue };
                let title = titles.entry(posting.doc_id).or_insert_with(|| doc.title.to_lowercase());

                let mut score = posting.frequency as f64;
                if is_literal { score *= self.config.exact_boost; }
                if title.contains(token.as_str()) { score *= self.config.title_boost; }
                if expanded { score *= self.config.prefix_damping; }

                let entry = acc.entry(posting.doc_id).or_insert_with(|| {
                    order.push(posting.doc_id);
                    (0.0, Vec::new())
                });
                entry.0 += score;
                entry.1.push(token.clone());
            }
        }

        order
            .into_iter()
            .filter_map(|doc_id| {
                let (score, matched_tokens) = acc.remove(&doc_id)?;
                if score <= 0.0 { return None; }
                let document = self.index.document(doc_id)?.clone();
                Some(SearchHit { doc_id, document, score: round2(score), matched_tokens })
            })
            .collect()
    }
}

/// Search with default tokenizer limits and scoring weights.
pub fn search(index: &SearchIndex, query: &str, filters: &SearchFilters) -> QueryOutcome {
    QueryEngine::new(index, &TokenizerConfig::default(), &QueryConfig::default()).search(query, filters)
}

fn round2(score: f64) -> f64 { (score * 100.0).round() / 100.0 }

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (UTC midnight).
pub fn parse_date(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if s.is_empty() { return None; }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) { return Some(dt); }
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

fn end_of_day(dt: OffsetDateTime) -> Option<OffsetDateTime> {
    Time::from_hms_milli(23, 59, 59, 999).ok().map(|t| dt.replace_time(t))
}

/// Category equality and an inclusive date range. Bounds that do not parse
/// constrain nothing. Documents without a date fail any range; a date that is
/// present but unparseable compares false against every bound and passes.
pub fn apply_filters(hits: Vec<SearchHit>, filters: &SearchFilters) -> Vec<SearchHit> {
    let category = non_empty(&filters.category);
    let from_raw = non_empty(&filters.date_from);
    let to_raw = non_empty(&filters.date_to);
    if category.is_none() && from_raw.is_none() && to_raw.is_none() { return hits; }

    let from = from_raw.and_then(parse_date);
    let to = to_raw.and_then(parse_date).and_then(end_of_day);
    hits.into_iter()
        .filter(|hit| {
            if let Some(category) = category {
                if hit.document.section != category { return false; }
            }
            if from_raw.is_some() || to_raw.is_some() {
                if hit.document.date.trim().is_empty() { return false; }
                let Some(date) = parse_date(&hit.document.date) else { return true };
                if from.is_some_and(|from| date < from) { return false; }
                if to.is_some_and(|to| date > to) { return false; }
            }
            true
        })
        .collect()
}

/// Stable sort; equal keys keep their accumulation order.
pub fn sort_hits(hits: &mut [SearchHit], order: SortOrder) {
    let date_of = |hit: &SearchHit| parse_date(&hit.document.date).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    match order {
        SortOrder::Relevance => hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)),
        SortOrder::DateDesc => hits.sort_by_key(|hit| std::cmp::Reverse(date_of(hit))),
        SortOrder::DateAsc => hits.sort_by_key(date_of),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_names() {
        assert_eq!(SortOrder::from("date-asc"), SortOrder::DateAsc);
        assert_eq!(SortOrder::from("date-desc"), SortOrder::DateDesc);
        assert_eq!(SortOrder::from("bogus"), SortOrder::Relevance);
    }

    #[test]
    fn dates_parse_in_both_shapes() {
        let day = parse_date("2024-02-01").unwrap();
        let stamp = parse_date("2024-02-01T10:30:00+00:00").unwrap();
        assert!(stamp > day);
        assert!(stamp < end_of_day(day).unwrap());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(2.4000000001), 2.4);
    }
}

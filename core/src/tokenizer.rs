use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"\p{L}+").expect("valid regex");
    static ref CJK_RE: Regex = Regex::new(r"[\x{4E00}-\x{9FA5}]+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","an","the","and","or","but","is","are","was","were",
            "in","on","at","to","for","with","by","about","as","of",
            "的","了","和","是","在","有","与","这","那","都","中",
        ];
        words.iter().copied().collect()
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub min_token_len: usize,
    pub max_token_len: usize,
    /// Tokens past this count are dropped, in encounter order.
    pub max_tokens_per_doc: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { min_token_len: 2, max_token_len: 20, max_tokens_per_doc: 1000 }
    }
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

fn is_cjk(c: char) -> bool { matches!(c, '\u{4E00}'..='\u{9FA5}') }

/// True when the text holds at least one CJK unified ideograph.
pub fn contains_cjk(text: &str) -> bool { text.chars().any(is_cjk) }

/// Tokenize with the default limits.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with(text, &TokenizerConfig::default())
}

/// Tokenize text into unique, lower-cased tokens in encounter order.
///
/// Letter runs become word tokens (stop-words and out-of-bounds lengths removed);
/// CJK runs additionally yield every 1-, 2- and 3-character substring.
pub fn tokenize_with(text: &str, config: &TokenizerConfig) -> Vec<String> {
    if text.is_empty() { return Vec::new(); }
    let lowered = text.to_lowercase();
    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens: Vec<String> = Vec::new();

    for mat in WORD_RE.find_iter(&lowered) {
        let word = mat.as_str();
        let len = word.chars().count();
        if len < config.min_token_len || len > config.max_token_len || is_stopword(word) { continue; }
        if seen.insert(word.to_string()) { tokens.push(word.to_string()); }
    }

    if contains_cjk(&lowered) {
        for run in CJK_RE.find_iter(&lowered) {
            for gram in cjk_ngrams(run.as_str()) {
                if seen.insert(gram.clone()) { tokens.push(gram); }
            }
        }
    }

    tokens.truncate(config.max_tokens_per_doc);
    tokens
}

/// Single characters first, then 2-grams, then 3-grams of one CJK run.
fn cjk_ngrams(run: &str) -> Vec<String> {
    let chars: Vec<char> = run.chars().collect();
    let mut grams: Vec<String> = chars.iter().map(|c| c.to_string()).collect();
    for n in 2..=3usize {
        if n > chars.len() { break; }
        for window in chars.windows(n) {
            grams.push(window.iter().collect());
        }
    }
    grams
}

/// Case-insensitive, non-overlapping count of `token` inside `text`.
pub fn count_occurrences(text: &str, token: &str) -> u32 {
    if text.is_empty() || token.is_empty() { return 0; }
    let haystack = text.to_lowercase();
    let needle = token.to_lowercase();
    haystack.matches(needle.as_str()).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("The Quick, quick RED fox!");
        assert_eq!(t, vec!["quick", "red", "fox"]);
    }

    #[test]
    fn cjk_runs_emit_ngrams() {
        let t = tokenize("搜索引");
        assert_eq!(t, vec!["搜索引", "搜", "索", "引", "搜索", "索引"]);
    }

    #[test]
    fn truncates_to_cap() {
        let cfg = TokenizerConfig { max_tokens_per_doc: 2, ..Default::default() };
        assert_eq!(tokenize_with("alpha beta gamma", &cfg), vec!["alpha", "beta"]);
    }

    #[test]
    fn counts_non_overlapping() {
        assert_eq!(count_occurrences("Red red RED", "red"), 3);
        assert_eq!(count_occurrences("aaaa", "aa"), 2);
        assert_eq!(count_occurrences("", "aa"), 0);
    }
}

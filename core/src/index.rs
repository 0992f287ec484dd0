use crate::document::Document;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub type DocId = u32;

/// Schema version stamped on persisted envelopes.
pub const CACHE_VERSION: &str = "2.1.0";
/// Prefixes shorter than this never expand.
pub const MIN_PREFIX_LEN: usize = 2;

/// External key of a document, `doc_<n>`.
pub fn doc_key(id: DocId) -> String { format!("doc_{id}") }

pub fn parse_doc_key(key: &str) -> Option<DocId> {
    key.strip_prefix("doc_")?.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Literal occurrences of the token in the document text.
    pub frequency: u32,
}

#[derive(Debug)]
pub struct SearchIndex {
    postings: HashMap<String, Vec<Posting>>, // postings sorted by doc_id
    documents: BTreeMap<DocId, Document>,
    categories: BTreeSet<String>,
    version: String,
    sorted_tokens: RwLock<Option<Arc<Vec<String>>>>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self {
            postings: HashMap::new(),
            documents: BTreeMap::new(),
            categories: BTreeSet::new(),
            version: CACHE_VERSION.to_string(),
            sorted_tokens: RwLock::new(None),
        }
    }
}

impl SearchIndex {
    pub fn new() -> Self { Self::default() }

    pub fn add_document(&mut self, doc_id: DocId, doc: Document) {
        self.documents.insert(doc_id, doc);
    }

    pub fn add_category(&mut self, category: &str) {
        if !category.is_empty() {
            self.categories.insert(category.to_string());
        }
    }

    /// Record `frequency` for `(token, doc_id)`, replacing any earlier posting for the pair.
    pub fn add_token(&mut self, token: &str, doc_id: DocId, frequency: u32) {
        let list = self.postings.entry(token.to_string()).or_default();
        match list.binary_search_by_key(&doc_id, |p| p.doc_id) {
            Ok(i) => list[i].frequency = frequency,
            Err(i) => list.insert(i, Posting { doc_id, frequency }),
        }
        *self.sorted_tokens.get_mut() = None;
    }

    pub fn remove_token(&mut self, token: &str) -> bool {
        let removed = self.postings.remove(token).is_some();
        if removed {
            *self.sorted_tokens.get_mut() = None;
        }
        removed
    }

    pub fn postings(&self, token: &str) -> &[Posting] {
        self.postings.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&String, &Vec<Posting>)> {
        self.postings.iter()
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> { self.documents.get(&doc_id) }

    pub fn documents(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.documents.iter().map(|(id, doc)| (*id, doc))
    }

    pub fn document_count(&self) -> usize { self.documents.len() }
    pub fn token_count(&self) -> usize { self.postings.len() }
    pub fn categories(&self) -> &BTreeSet<String> { &self.categories }
    pub fn version(&self) -> &str { &self.version }

    /// Lexicographically sorted token list, rebuilt lazily after any insertion.
    pub fn sorted_tokens(&self) -> Arc<Vec<String>> {
        if let Some(sorted) = self.sorted_tokens.read().as_ref() {
            return Arc::clone(sorted);
        }
        let mut guard = self.sorted_tokens.write();
        if let Some(sorted) = guard.as_ref() {
            return Arc::clone(sorted);
        }
        let mut tokens: Vec<String> = self.postings.keys().cloned().collect();
        tokens.sort_unstable();
        let sorted = Arc::new(tokens);
        *guard = Some(Arc::clone(&sorted));
        sorted
    }

    /// Up to `limit` indexed tokens starting with `prefix`, in lexicographic order.
    pub fn prefix_search(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        if prefix.chars().count() < MIN_PREFIX_LEN { return Vec::new(); }
        let sorted = self.sorted_tokens();
        let start = sorted.partition_point(|t| t.as_str() < prefix.as_str());
        sorted[start..]
            .iter()
            .take_while(|t| t.starts_with(prefix.as_str()))
            .take(limit)
            .cloned()
            .collect()
    }
}

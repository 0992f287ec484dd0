use crate::document::Document;
use crate::index::{DocId, SearchIndex};
use crate::tokenizer::{count_occurrences, is_stopword, tokenize_with, TokenizerConfig};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildPolicy {
    /// Longest stretch of indexing work before yielding, in milliseconds.
    pub slice_ms: u64,
    /// Delay between the last slice and the completion pass.
    pub complete_delay_ms: u64,
    /// Pruning only runs for collections larger than this.
    pub prune_min_documents: usize,
    /// Share of documents a stop-word must exceed to be pruned.
    pub prune_ratio: f64,
}

impl Default for BuildPolicy {
    fn default() -> Self {
        Self { slice_ms: 10, complete_delay_ms: 100, prune_min_documents: 10, prune_ratio: 0.95 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildProgress {
    pub processed: usize,
    pub total: usize,
    /// 0..=90 while indexing documents.
    pub percent: u8,
}

impl BuildProgress {
    pub fn is_complete(&self) -> bool { self.processed >= self.total }
}

/// Incremental index construction over an ordered document collection.
pub struct IndexBuilder {
    documents: Vec<Document>,
    cursor: usize,
    index: SearchIndex,
    tokenizer: TokenizerConfig,
    policy: BuildPolicy,
    started: Instant,
}

impl IndexBuilder {
    pub fn new(documents: Vec<Document>, tokenizer: TokenizerConfig, policy: BuildPolicy) -> Self {
        Self { documents, cursor: 0, index: SearchIndex::new(), tokenizer, policy, started: Instant::now() }
    }

    pub fn policy(&self) -> &BuildPolicy { &self.policy }

    /// Index documents until `slice` has elapsed; at least one document is
    /// processed per call while any remain.
    pub fn step(&mut self, slice: Duration) -> BuildProgress {
        let start = Instant::now();
        while self.cursor < self.documents.len() {
            let doc = std::mem::take(&mut self.documents[self.cursor]);
            self.index_document(self.cursor as DocId, doc);
            self.cursor += 1;
            if start.elapsed() >= slice { break; }
        }
        self.progress()
    }

    pub fn progress(&self) -> BuildProgress {
        let total = self.documents.len();
        let percent = if total == 0 { 90 } else { ((self.cursor as f64 / total as f64) * 90.0).round() as u8 };
        BuildProgress { processed: self.cursor, total, percent }
    }

    fn index_document(&mut self, doc_id: DocId, doc: Document) {
        let text = doc.indexable_text();
        for token in tokenize_with(&text, &self.tokenizer) {
            let frequency = count_occurrences(&text, &token);
            if frequency > 0 {
                self.index.add_token(&token, doc_id, frequency);
            }
        }
        self.index.add_category(&doc.section);
        self.index.add_document(doc_id, doc);
    }

    /// Run the optimization pass and hand over the finished index.
    pub fn finish(mut self) -> SearchIndex {
        let pruned = optimize(&mut self.index, &self.policy);
        tracing::info!(
            tokens = self.index.token_count(),
            documents = self.index.document_count(),
            pruned,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "index build complete"
        );
        self.index
    }
}

/// Build an index in one pass, without yielding.
pub fn build_all(documents: Vec<Document>, tokenizer: TokenizerConfig, policy: BuildPolicy) -> SearchIndex {
    let mut builder = IndexBuilder::new(documents, tokenizer, policy);
    while !builder.step(Duration::MAX).is_complete() {}
    builder.finish()
}

/// Drop stop-words that appear in nearly every document. Returns the number removed.
pub fn optimize(index: &mut SearchIndex, policy: &BuildPolicy) -> usize {
    let documents = index.document_count();
    if documents <= policy.prune_min_documents { return 0; }
    let threshold = documents as f64 * policy.prune_ratio;
    let doomed: Vec<String> = index
        .tokens()
        .filter(|(token, postings)| postings.len() as f64 > threshold && is_stopword(token))
        .map(|(token, _)| token.clone())
        .collect();
    for token in &doomed {
        index.remove_token(token);
    }
    if !doomed.is_empty() {
        tracing::debug!(count = doomed.len(), "pruned high-frequency stop-words");
    }
    doomed.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, content: &str, section: &str) -> Document {
        Document { title: title.into(), content: content.into(), section: section.into(), ..Default::default() }
    }

    #[test]
    fn frequencies_count_literal_occurrences() {
        let index = build_all(vec![doc("Red Fox", "the quick red fox", "animals")], Default::default(), Default::default());
        assert_eq!(index.postings("red")[0].frequency, 2);
        assert_eq!(index.postings("quick")[0].frequency, 1);
        assert!(index.postings("the").is_empty());
        assert!(index.categories().contains("animals"));
    }

    #[test]
    fn progress_tops_out_at_ninety() {
        let mut builder = IndexBuilder::new(vec![doc("a", "one", ""), doc("b", "two", "")], Default::default(), Default::default());
        assert_eq!(builder.progress().percent, 0);
        let progress = builder.step(Duration::MAX);
        assert!(progress.is_complete());
        assert_eq!(progress.percent, 90);
    }

    #[test]
    fn zero_slice_still_advances() {
        let mut builder = IndexBuilder::new(vec![doc("a", "one", ""), doc("b", "two", "")], Default::default(), Default::default());
        assert_eq!(builder.step(Duration::ZERO).processed, 1);
        assert_eq!(builder.step(Duration::ZERO).processed, 2);
    }

    #[test]
    fn prunes_ubiquitous_cjk_stopwords_only() {
        let docs: Vec<Document> = (0..12).map(|i| doc("", &format!("我的书{i} common"), "")).collect();
        let index = build_all(docs, Default::default(), Default::default());
        assert!(index.postings("的").is_empty());
        assert_eq!(index.postings("common").len(), 12);
    }
}

use crate::builder::build_all;
use crate::config::SearchConfig;
use crate::document::Document;
use crate::index::SearchIndex;
use crate::persist::CacheEnvelope;
use crate::query::{QueryEngine, QueryOutcome, SearchFilters};

/// The four operations a session needs from an index implementation.
pub trait SearchEngine: Sized {
    fn build(documents: Vec<Document>, config: &SearchConfig) -> Self;
    fn query(&self, query: &str, filters: &SearchFilters, config: &SearchConfig) -> QueryOutcome;
    fn serialize(&self, timestamp: i64) -> CacheEnvelope;
    fn deserialize(envelope: CacheEnvelope, now: i64) -> Option<Self>;
}

impl SearchEngine for SearchIndex {
    fn build(documents: Vec<Document>, config: &SearchConfig) -> Self {
        build_all(documents, config.tokenizer.clone(), config.build.clone())
    }

    fn query(&self, query: &str, filters: &SearchFilters, config: &SearchConfig) -> QueryOutcome {
        QueryEngine::new(self, &config.tokenizer, &config.query).search(query, filters)
    }

    fn serialize(&self, timestamp: i64) -> CacheEnvelope { self.to_envelope(timestamp) }

    fn deserialize(envelope: CacheEnvelope, now: i64) -> Option<Self> { SearchIndex::from_envelope(envelope, now) }
}

use search_core::builder::build_all;
use search_core::persist::{now_millis, CacheConfig, CACHE_EXPIRY_MS, CACHE_HASH_KEY, CACHE_KEY};
use search_core::config::SearchConfig;
use search_core::{CacheStore, Document, IndexCache, MemoryStore, SearchEngine, SearchFilters, SearchIndex};

fn sample_index() -> SearchIndex {
    let docs = vec![
        Document { title: "Red Fox".into(), content: "the quick red fox jumps".into(), section: "animals".into(), ..Default::default() },
        Document { title: "Blue Car".into(), content: "a blue car drives fast".into(), section: "vehicles".into(), ..Default::default() },
        Document { title: "中文".into(), content: "搜索引擎".into(), ..Default::default() },
    ];
    build_all(docs, Default::default(), Default::default())
}

fn postings_of(index: &SearchIndex) -> Vec<(String, Vec<(u32, u32)>)> {
    let mut all: Vec<_> = index
        .tokens()
        .map(|(token, postings)| (token.clone(), postings.iter().map(|p| (p.doc_id, p.frequency)).collect()))
        .collect();
    all.sort();
    all
}

#[test]
fn envelope_round_trip_preserves_index() {
    let index = sample_index();
    let now = now_millis();
    let json = serde_json::to_string(&index.to_envelope(now)).unwrap();
    let restored = SearchIndex::from_envelope(serde_json::from_str(&json).unwrap(), now).unwrap();
    assert_eq!(postings_of(&restored), postings_of(&index));
    assert_eq!(restored.categories(), index.categories());
    assert_eq!(restored.document(1), index.document(1));
}

#[test]
fn envelope_uses_doc_keys() {
    let envelope = sample_index().to_envelope(0);
    assert!(envelope.documents.contains_key("doc_0"));
    assert_eq!(envelope.tokens["red"]["doc_0"], 2);
    assert_eq!(envelope.categories, vec!["animals", "vehicles"]);
}

#[test]
fn version_mismatch_is_rejected_even_when_fresh() {
    let now = now_millis();
    let mut envelope = sample_index().to_envelope(now);
    envelope.version = "1.0.0".into();
    assert!(SearchIndex::from_envelope(envelope, now).is_none());
}

#[test]
fn stale_envelopes_are_rejected() {
    let now = now_millis();
    let envelope = sample_index().to_envelope(now - CACHE_EXPIRY_MS - 1);
    assert!(SearchIndex::from_envelope(envelope, now).is_none());
    let envelope = sample_index().to_envelope(now - CACHE_EXPIRY_MS + 60_000);
    assert!(SearchIndex::from_envelope(envelope, now).is_some());
}

#[test]
fn postings_for_unknown_documents_are_dropped() {
    let now = now_millis();
    let mut envelope = sample_index().to_envelope(now);
    envelope.tokens.entry("ghost".into()).or_default().insert("doc_99".into(), 4);
    let restored = SearchIndex::from_envelope(envelope, now).unwrap();
    assert!(restored.postings("ghost").is_empty());
}

#[test]
fn save_then_load_with_matching_hash() {
    let mut cache = IndexCache::new(MemoryStore::new(), CacheConfig::default());
    assert!(cache.save(&sample_index(), "build-1", now_millis()).unwrap());
    assert!(cache.is_valid("build-1"));
    assert!(cache.load(now_millis()).is_some());
}

#[test]
fn hash_mismatch_drops_only_the_marker() {
    let mut cache = IndexCache::new(MemoryStore::new(), CacheConfig::default());
    cache.save(&sample_index(), "build-1", now_millis()).unwrap();
    assert!(!cache.is_valid("build-2"));
    assert_eq!(cache.store().get(CACHE_HASH_KEY).unwrap(), None);
    assert!(cache.store().get(CACHE_KEY).unwrap().is_some());
    assert!(!cache.is_valid("build-1"));
}

#[test]
fn outdated_cache_is_cleared_on_load() {
    let mut cache = IndexCache::new(MemoryStore::new(), CacheConfig::default());
    let old = now_millis() - 2 * CACHE_EXPIRY_MS;
    cache.save(&sample_index(), "build-1", old).unwrap();
    assert!(cache.load(now_millis()).is_none());
    assert_eq!(cache.store().get(CACHE_KEY).unwrap(), None);
    assert_eq!(cache.store().get(CACHE_HASH_KEY).unwrap(), None);
}

#[test]
fn oversized_payloads_are_not_persisted() {
    let mut cache = IndexCache::new(MemoryStore::new(), CacheConfig { max_payload_bytes: 64 });
    assert!(!cache.save(&sample_index(), "build-1", now_millis()).unwrap());
    assert_eq!(cache.store().get(CACHE_KEY).unwrap(), None);
    assert_eq!(cache.store().get(CACHE_HASH_KEY).unwrap(), None);
}

#[test]
fn engine_trait_round_trips_through_envelope() {
    let config = SearchConfig::default();
    let docs = vec![
        Document { title: "Red Fox".into(), content: "the quick red fox jumps".into(), section: "animals".into(), ..Default::default() },
        Document { title: "Blue Car".into(), content: "a blue car drives fast".into(), section: "vehicles".into(), ..Default::default() },
    ];
    let index = <SearchIndex as SearchEngine>::build(docs, &config);
    let now = now_millis();
    let envelope = SearchEngine::serialize(&index, now);
    assert_eq!(envelope.documents.len(), 2);

    let restored = <SearchIndex as SearchEngine>::deserialize(envelope.clone(), now).unwrap();
    let before = SearchEngine::query(&index, "red fo", &SearchFilters::default(), &config);
    let after = SearchEngine::query(&restored, "red fo", &SearchFilters::default(), &config);
    let scored = |hits: &[search_core::SearchHit]| hits.iter().map(|h| (h.doc_id, h.score)).collect::<Vec<_>>();
    assert_eq!(scored(&after.hits), scored(&before.hits));
    assert_eq!(after.query_tokens, vec!["red", "fo"]);

    assert!(<SearchIndex as SearchEngine>::deserialize(envelope, now + CACHE_EXPIRY_MS + 1).is_none());
}

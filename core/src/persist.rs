use crate::document::Document;
use crate::index::{doc_key, parse_doc_key, SearchIndex, CACHE_VERSION};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const CACHE_KEY: &str = "search_index";
pub const CACHE_HASH_KEY: &str = "search_hash";
pub const HISTORY_KEY: &str = "search_history";
/// Envelopes older than a day are discarded.
pub const CACHE_EXPIRY_MS: i64 = 24 * 60 * 60 * 1000;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Plain-data form of an index, as written to the cache store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub timestamp: i64,
    pub version: String,
    pub tokens: BTreeMap<String, BTreeMap<String, u32>>,
    pub documents: BTreeMap<String, Document>,
    pub categories: Vec<String>,
}

impl SearchIndex {
    pub fn to_envelope(&self, timestamp: i64) -> CacheEnvelope {
        let tokens = self
            .tokens()
            .map(|(token, postings)| {
                let docs = postings.iter().map(|p| (doc_key(p.doc_id), p.frequency)).collect();
                (token.clone(), docs)
            })
            .collect();
        let documents = self.documents().map(|(id, doc)| (doc_key(id), doc.clone())).collect();
        CacheEnvelope {
            timestamp,
            version: self.version().to_string(),
            tokens,
            documents,
            categories: self.categories().iter().cloned().collect(),
        }
    }

    /// Rebuild an index from an envelope, or `None` when it is stale or from
    /// another schema version. Postings naming unknown documents are dropped.
    pub fn from_envelope(envelope: CacheEnvelope, now: i64) -> Option<SearchIndex> {
        let expired = now.checked_sub(envelope.timestamp).map_or(true, |age| age > CACHE_EXPIRY_MS);
        if expired || envelope.version != CACHE_VERSION {
            return None;
        }
        let mut index = SearchIndex::new();
        for (key, doc) in envelope.documents {
            if let Some(id) = parse_doc_key(&key) {
                index.add_document(id, doc);
            }
        }
        for category in &envelope.categories {
            index.add_category(category);
        }
        for (token, docs) in &envelope.tokens {
            for (key, frequency) in docs {
                match parse_doc_key(key) {
                    Some(id) if index.document(id).is_some() => index.add_token(token, id, *frequency),
                    _ => tracing::debug!(token, key, "dropping posting for unknown document"),
                }
            }
        }
        Some(index)
    }
}

/// String key/value storage for the cache, the build-hash marker and history.
pub trait CacheStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> { Ok(self.entries.get(key).cloned()) }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per entry under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    pub root: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn path(&self, key: &str) -> PathBuf { self.root.join(format!("{key}.json")) }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() { return Ok(None); }
        let value = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        create_dir_all(&self.root)?;
        let path = self.path(key);
        fs::write(&path, value).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Larger serialized envelopes are not persisted.
    pub max_payload_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self { Self { max_payload_bytes: 5 * 1024 * 1024 } }
}

/// Index persistence over a [`CacheStore`] with time, version and build-hash invalidation.
pub struct IndexCache<S> {
    store: S,
    config: CacheConfig,
}

impl<S: CacheStore> IndexCache<S> {
    pub fn new(store: S, config: CacheConfig) -> Self { Self { store, config } }

    pub fn store(&self) -> &S { &self.store }
    pub fn store_mut(&mut self) -> &mut S { &mut self.store }

    /// Cached index, if present, readable, fresh and of the current version.
    /// Anything else clears the cache.
    pub fn load(&mut self, now: i64) -> Option<SearchIndex> {
        let raw = match self.store.get(CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read cached index");
                self.clear();
                return None;
            }
        };
        let envelope: CacheEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse cached index");
                self.clear();
                return None;
            }
        };
        match SearchIndex::from_envelope(envelope, now) {
            Some(index) => Some(index),
            None => {
                tracing::info!("cached index expired or outdated");
                self.clear();
                None
            }
        }
    }

    /// Whether the stored build hash matches; a mismatched marker is removed.
    pub fn is_valid(&mut self, build_hash: &str) -> bool {
        let previous = match self.store.get(CACHE_HASH_KEY) {
            Ok(previous) => previous,
            Err(_) => return false,
        };
        let valid = previous.as_deref() == Some(build_hash);
        tracing::debug!(previous = ?previous, build_hash, valid, "build hash check");
        if !valid {
            if let Err(err) = self.store.remove(CACHE_HASH_KEY) {
                tracing::warn!(error = %err, "failed to drop build hash marker");
            }
        }
        valid
    }

    /// Persist the index and its build hash. Returns `false` when the payload
    /// was too large and nothing was written.
    pub fn save(&mut self, index: &SearchIndex, build_hash: &str, now: i64) -> Result<bool> {
        let payload = serde_json::to_string(&index.to_envelope(now))?;
        if payload.len() > self.config.max_payload_bytes {
            tracing::warn!(bytes = payload.len(), limit = self.config.max_payload_bytes, "index too large to cache");
            return Ok(false);
        }
        self.store.set(CACHE_KEY, &payload)?;
        self.store.set(CACHE_HASH_KEY, build_hash)?;
        tracing::info!(bytes = payload.len(), "index cached");
        Ok(true)
    }

    pub fn clear(&mut self) {
        for key in [CACHE_KEY, CACHE_HASH_KEY] {
            if let Err(err) = self.store.remove(key) {
                tracing::warn!(key, error = %err, "failed to clear cache entry");
            }
        }
    }
}

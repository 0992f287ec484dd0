//! Search session controller: owns the index, the cache, the history and the
//! lifecycle state for one page load.

use crate::builder::IndexBuilder;
use crate::config::SearchConfig;
use crate::document::{parse_collection, Document};
use crate::engine::SearchEngine;
use crate::index::{DocId, SearchIndex};
use crate::persist::{now_millis, CacheStore, IndexCache, HISTORY_KEY};
use crate::present::ResultSet;
use crate::query::SearchFilters;
use crate::scheduler::{Priority, Scheduler};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

pub const INDEX_BUILD: &str = "index-build";
pub const INDEX_COMPLETE: &str = "index-complete";
pub const INDEX_SAVE: &str = "index-save";

const MAX_HISTORY: usize = 10;
const HISTORY_SUGGESTIONS: usize = 3;
const TOKEN_SUGGESTIONS: usize = 5;
const MAX_SUGGESTIONS: usize = 8;
const SUGGESTION_LOOKUP: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Building,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    CheckingCache,
    ProcessingData,
    Building,
    Optimizing,
    Completed,
    CacheLoaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub stage: Stage,
    pub percent: u8,
}

type ProgressListener = Box<dyn FnMut(Progress) + Send>;

pub struct SearchSession<S> {
    config: SearchConfig,
    cache: IndexCache<S>,
    index: Option<SearchIndex>,
    state: SessionState,
    progress: Progress,
    history: Vec<String>,
    last_query_tokens: Vec<String>,
    listener: Option<ProgressListener>,
}

impl<S: CacheStore + 'static> SearchSession<S> {
    pub fn new(config: SearchConfig, store: S) -> Self {
        let cache = IndexCache::new(store, config.cache.clone());
        let mut session = Self {
            config,
            cache,
            index: None,
            state: SessionState::Uninitialized,
            progress: Progress { stage: Stage::Initializing, percent: 0 },
            history: Vec::new(),
            last_query_tokens: Vec::new(),
            listener: None,
        };
        session.load_history();
        session
    }

    pub fn config(&self) -> &SearchConfig { &self.config }
    pub fn state(&self) -> &SessionState { &self.state }
    pub fn progress(&self) -> Progress { self.progress }
    pub fn index(&self) -> Option<&SearchIndex> { self.index.as_ref() }
    pub fn history(&self) -> &[String] { &self.history }
    pub fn last_query_tokens(&self) -> &[String] { &self.last_query_tokens }
    pub fn is_ready(&self) -> bool { self.state == SessionState::Ready }

    pub fn categories(&self) -> BTreeSet<String> {
        self.index.as_ref().map(|i| i.categories().clone()).unwrap_or_default()
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.index.as_ref()?.document(doc_id)
    }

    /// Called with every progress change from here on.
    pub fn on_progress(&mut self, listener: impl FnMut(Progress) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    fn set_progress(&mut self, stage: Stage, percent: u8) {
        self.progress = Progress { stage, percent };
        tracing::debug!(?stage, percent, "search index progress");
        if let Some(listener) = self.listener.as_mut() {
            listener(self.progress);
        }
    }

    /// Adopt the cached index when the envelope is fresh and the build hash
    /// matches. Returns whether the session is now ready.
    pub fn load_cached(&mut self, build_hash: &str) -> bool {
        self.set_progress(Stage::CheckingCache, 10);
        let cached = self.cache.load(now_millis());
        let valid = self.cache.is_valid(build_hash);
        match cached {
            Some(index) if valid => {
                tracing::info!(tokens = index.token_count(), documents = index.document_count(), "loaded cached index");
                self.index = Some(index);
                self.state = SessionState::Ready;
                self.set_progress(Stage::CacheLoaded, 100);
                true
            }
            _ => false,
        }
    }

    /// Decode a fetched collection and build from it. A collection that does
    /// not decode fails the session; no partial index is kept.
    pub fn initialize_from_json(&mut self, bytes: &[u8], build_hash: &str) -> Result<()> {
        self.set_progress(Stage::ProcessingData, 50);
        let documents = match parse_collection(bytes) {
            Ok(documents) => documents,
            Err(err) => {
                self.fail(format!("{err:#}"));
                return Err(err);
            }
        };
        tracing::info!(count = documents.len(), "documents loaded");
        self.build(documents, build_hash);
        Ok(())
    }

    /// Build through the cooperative scheduler: one slice per tick, then the
    /// completion pass, then persistence at idle priority.
    pub fn build(&mut self, documents: Vec<Document>, build_hash: &str) {
        self.state = SessionState::Building;
        self.index = None;
        self.set_progress(Stage::Building, 0);
        let builder = IndexBuilder::new(documents, self.config.tokenizer.clone(), self.config.build.clone());
        let mut scheduler: Scheduler<Self> = Scheduler::new();
        schedule_slice(&mut scheduler, builder, build_hash.to_string());
        scheduler.run_until_idle(self);
    }

    fn complete_build(&mut self, index: SearchIndex, build_hash: String, scheduler: &mut Scheduler<Self>) {
        self.index = Some(index);
        self.state = SessionState::Ready;
        scheduler.submit(INDEX_SAVE, Priority::Idle, Duration::ZERO, move |session: &mut Self, _: &mut Scheduler<Self>| {
            session.persist(&build_hash);
            session.set_progress(Stage::Completed, 100);
        });
    }

    fn persist(&mut self, build_hash: &str) {
        let Some(index) = self.index.as_ref() else { return };
        if let Err(err) = self.cache.save(index, build_hash, now_millis()) {
            tracing::error!(error = %err, "failed to cache index");
        }
    }

    /// Record an initialization failure; queries become no-ops.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(%message, "search initialization failed");
        self.index = None;
        self.state = SessionState::Failed(message);
        self.set_progress(Stage::Failed, 0);
    }

    /// Run a query. `None` while the index is not ready.
    pub fn search(&mut self, query: &str, filters: &SearchFilters) -> Option<ResultSet> {
        if !self.is_ready() { return None; }
        let index = self.index.as_ref()?;
        if query.trim().is_empty() { return Some(ResultSet::empty(query)); }

        let started = Instant::now();
        let outcome = index.query(query, filters, &self.config);
        let took = started.elapsed();
        tracing::debug!(query, hits = outcome.hits.len(), took_ms = took.as_millis() as u64, "search");

        self.last_query_tokens = outcome.query_tokens.clone();
        self.push_history(query);
        Some(ResultSet { query: query.to_string(), query_tokens: outcome.query_tokens, hits: outcome.hits, took })
    }

    /// Completions for a partial query: recent searches first, then indexed tokens.
    pub fn suggest(&self, term: &str) -> Vec<String> {
        if term.chars().count() < 2 { return Vec::new(); }
        let lowered = term.to_lowercase();
        let mut out: Vec<String> = self
            .history
            .iter()
            .filter(|h| h.to_lowercase().contains(&lowered))
            .take(HISTORY_SUGGESTIONS)
            .cloned()
            .collect();
        if let Some(index) = self.index.as_ref() {
            for token in index.prefix_search(&lowered, SUGGESTION_LOOKUP).into_iter().take(TOKEN_SUGGESTIONS) {
                if !out.contains(&token) {
                    out.push(token);
                }
            }
        }
        out.truncate(MAX_SUGGESTIONS);
        out
    }

    fn push_history(&mut self, term: &str) {
        if term.trim().is_empty() { return; }
        self.history.retain(|h| h != term);
        self.history.insert(0, term.to_string());
        self.history.truncate(MAX_HISTORY);
        let saved = serde_json::to_string(&self.history)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.cache.store_mut().set(HISTORY_KEY, &json));
        if let Err(err) = saved {
            tracing::warn!(error = %err, "failed to save search history");
        }
    }

    fn load_history(&mut self) {
        let loaded = self
            .cache
            .store()
            .get(HISTORY_KEY)
            .and_then(|raw| raw.map(|raw| serde_json::from_str::<Vec<String>>(&raw)).transpose().map_err(anyhow::Error::from));
        self.history = match loaded {
            Ok(history) => history.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load search history");
                Vec::new()
            }
        };
        self.history.truncate(MAX_HISTORY);
    }
}

fn schedule_slice<S: CacheStore + 'static>(scheduler: &mut Scheduler<SearchSession<S>>, builder: IndexBuilder, build_hash: String) {
    scheduler.submit(
        INDEX_BUILD,
        Priority::Normal,
        Duration::ZERO,
        move |session: &mut SearchSession<S>, scheduler: &mut Scheduler<SearchSession<S>>| {
            let mut builder = builder;
            let slice = Duration::from_millis(builder.policy().slice_ms);
            let progress = builder.step(slice);
            session.set_progress(Stage::Building, progress.percent);
            if !progress.is_complete() {
                schedule_slice(scheduler, builder, build_hash);
                return;
            }
            session.set_progress(Stage::Optimizing, 95);
            let delay = Duration::from_millis(builder.policy().complete_delay_ms);
            scheduler.submit(
                INDEX_COMPLETE,
                Priority::Normal,
                delay,
                move |session: &mut SearchSession<S>, scheduler: &mut Scheduler<SearchSession<S>>| {
                    session.complete_build(builder.finish(), build_hash, scheduler);
                },
            );
        },
    );
}

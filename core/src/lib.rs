//! Full-text search over a static site's document collection: tokenizer,
//! inverted index, incremental builder, persisted cache and query engine.

pub mod builder;
pub mod config;
pub mod document;
pub mod engine;
pub mod index;
pub mod persist;
pub mod present;
pub mod query;
pub mod scheduler;
pub mod session;
pub mod tokenizer;

pub use builder::{build_all, BuildPolicy, BuildProgress, IndexBuilder};
pub use config::SearchConfig;
pub use document::Document;
pub use engine::SearchEngine;
pub use index::{DocId, Posting, SearchIndex, CACHE_VERSION};
pub use persist::{CacheEnvelope, CacheStore, FileStore, IndexCache, MemoryStore};
pub use present::{Page, RenderedHit, ResultSet};
pub use query::{SearchFilters, SearchHit, SortOrder};
pub use session::{SearchSession, SessionState};

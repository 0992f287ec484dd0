use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use search_core::document::{content_hash, parse_collection};
use search_core::persist::{now_millis, CACHE_HASH_KEY};
use search_core::query::{SearchFilters, SortOrder};
use search_core::{CacheStore, FileStore, IndexCache, SearchConfig, SearchEngine, SearchIndex, SearchSession};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the site search index cache", long_about = None)]
struct Cli {
    /// Optional JSON file with search settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a JSON document collection and write it to the cache
    Build {
        /// Collection file (JSON array of pages)
        #[arg(long)]
        input: PathBuf,
        /// Cache directory
        #[arg(long, default_value = "./search-cache")]
        cache_dir: PathBuf,
        /// Build identifier; defaults to the SHA-1 of the input
        #[arg(long)]
        build_hash: Option<String>,
    },
    /// Query a previously built cache
    Query {
        #[arg(long, default_value = "./search-cache")]
        cache_dir: PathBuf,
        /// Build identifier the cache must match; defaults to the stored one
        #[arg(long)]
        build_hash: Option<String>,
        #[arg(long)]
        q: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// relevance, date-desc or date-asc
        #[arg(long, default_value = "relevance")]
        sort: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
}

#[derive(Serialize)]
struct BuildReport {
    build_hash: String,
    documents: usize,
    tokens: usize,
    categories: usize,
    cached: bool,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = SearchConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { input, cache_dir, build_hash } => build_index(config, &input, cache_dir, build_hash),
        Commands::Query { cache_dir, build_hash, q, category, from, to, sort, page, page_size } => {
            let filters = SearchFilters { category, date_from: from, date_to: to, sort: SortOrder::from(sort.as_str()) };
            query_index(config, cache_dir, build_hash, &q, &filters, page, page_size)
        }
    }
}

fn build_index(config: SearchConfig, input: &Path, cache_dir: PathBuf, build_hash: Option<String>) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("read {}", input.display()))?;
    let build_hash = build_hash.unwrap_or_else(|| content_hash(&bytes));
    let documents = parse_collection(&bytes)?;
    tracing::info!(count = documents.len(), "ingested documents");

    let index = SearchIndex::build(documents, &config);
    let mut cache = IndexCache::new(FileStore::new(&cache_dir), config.cache.clone());
    let cached = cache.save(&index, &build_hash, now_millis())?;

    let report = BuildReport {
        build_hash,
        documents: index.document_count(),
        tokens: index.token_count(),
        categories: index.categories().len(),
        cached,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(cache_dir = %cache_dir.display(), "index build complete");
    Ok(())
}

fn query_index(
    config: SearchConfig,
    cache_dir: PathBuf,
    build_hash: Option<String>,
    q: &str,
    filters: &SearchFilters,
    page: usize,
    page_size: Option<usize>,
) -> Result<()> {
    let store = FileStore::new(&cache_dir);
    let build_hash = match build_hash {
        Some(hash) => hash,
        None => store.get(CACHE_HASH_KEY)?.ok_or_else(|| anyhow!("no build hash stored in {}", cache_dir.display()))?,
    };
    let page_size = page_size.unwrap_or(config.page_size);
    let mut session = SearchSession::new(config, store);
    if !session.load_cached(&build_hash) {
        return Err(anyhow!("no usable cache in {}; run `indexer build` first", cache_dir.display()));
    }
    let results = session.search(q, filters).unwrap_or_else(|| search_core::ResultSet::empty(q));
    println!("{}", serde_json::to_string_pretty(&results.page(page, page_size))?);
    Ok(())
}

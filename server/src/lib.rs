use anyhow::{bail, Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use parking_lot::Mutex;
use search_core::document::{collection_url, content_hash};
use search_core::present::{page_window, PageSlot, RenderedHit};
use search_core::query::{SearchFilters, SortOrder};
use search_core::session::Progress;
use search_core::{Document, FileStore, SearchConfig, SearchSession, SessionState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type SharedSession = Arc<Mutex<SearchSession<FileStore>>>;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub sort: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    pub page_size: Option<usize>,
}
fn default_page() -> usize { 1 }

#[derive(Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub status: SessionState,
    pub total_hits: usize,
    pub page: usize,
    pub total_pages: usize,
    pub pages: Vec<PageSlot>,
    pub results: Vec<RenderedHit>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: SessionState,
    pub progress: Progress,
    pub documents: usize,
    pub tokens: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub session: SharedSession,
}

/// Where the collection comes from and how the session is set up.
pub struct InitOptions {
    /// http(s) URL or local file path of the JSON collection
    pub source: String,
    pub build_hash: Option<String>,
    pub cache_dir: PathBuf,
    pub config: SearchConfig,
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch the raw collection. Non-2xx responses are errors; nothing is retried.
pub async fn fetch_collection(source: &str) -> Result<Vec<u8>> {
    if !is_remote(source) {
        return tokio::fs::read(source).await.with_context(|| format!("read {source}"));
    }
    let client = reqwest::Client::builder()
        .user_agent(concat!("site-search/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?;
    let resp = client.get(source).send().await.with_context(|| format!("fetch {source}"))?;
    let status = resp.status();
    if !status.is_success() {
        bail!("fetch {source}: HTTP {status}");
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Cache first, then fetch and build. Fetch or decode failures leave the
/// session in the failed state rather than aborting startup.
pub async fn init_session(opts: InitOptions) -> Result<SearchSession<FileStore>> {
    let mut session = SearchSession::new(opts.config, FileStore::new(&opts.cache_dir));
    if let Some(hash) = opts.build_hash.as_deref() {
        if session.load_cached(hash) {
            return Ok(session);
        }
    }

    let url = match opts.build_hash.as_deref() {
        Some(hash) if is_remote(&opts.source) => collection_url(&opts.source, hash),
        _ => opts.source.clone(),
    };
    let bytes = match fetch_collection(&url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            session.fail(format!("{err:#}"));
            return Ok(session);
        }
    };

    let build_hash = match opts.build_hash {
        Some(hash) => hash,
        None => {
            let hash = content_hash(&bytes);
            if session.load_cached(&hash) {
                return Ok(session);
            }
            hash
        }
    };

    let session = tokio::task::spawn_blocking(move || {
        if let Err(err) = session.initialize_from_json(&bytes, &build_hash) {
            tracing::error!(error = %err, "index build aborted");
        }
        session
    })
    .await?;
    Ok(session)
}

fn cors_layer() -> CorsLayer {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}

pub fn build_app(session: SearchSession<FileStore>) -> Router {
    let app_state = AppState { session: Arc::new(Mutex::new(session)) };
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status_handler))
        .route("/search", get(search_handler))
        .route("/suggest", get(suggest_handler))
        .route("/categories", get(categories_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let session = state.session.lock();
    let (documents, tokens) = session.index().map(|i| (i.document_count(), i.token_count())).unwrap_or((0, 0));
    Json(StatusResponse { status: session.state().clone(), progress: session.progress(), documents, tokens })
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn internal_error(err: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() })))
}

/// The query records history through the file store, so it runs on the blocking pool.
pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let filters = SearchFilters {
        category: params.category,
        date_from: params.from,
        date_to: params.to,
        sort: params.sort.as_deref().map(SortOrder::from).unwrap_or_default(),
    };
    let session = Arc::clone(&state.session);
    let query = params.q.clone();
    let (status, page_size, results) = tokio::task::spawn_blocking(move || {
        let mut session = session.lock();
        let page_size = params.page_size.unwrap_or(session.config().page_size).clamp(1, 100);
        let status = session.state().clone();
        (status, page_size, session.search(&query, &filters))
    })
    .await
    .map_err(internal_error)?;

    let Some(results) = results else {
        return Ok(Json(SearchResponse { query: params.q, took_s: 0.0, status, total_hits: 0, page: 1, total_pages: 1, pages: vec![], results: vec![] }));
    };
    let page = results.page(params.page, page_size);
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: results.took.as_secs_f64(),
        status,
        total_hits: page.total_hits,
        page: page.page,
        total_pages: page.total_pages,
        pages: page_window(page.page, page.total_pages),
        results: page.hits,
    }))
}

pub async fn suggest_handler(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Json<Vec<String>> {
    Json(state.session.lock().suggest(&params.q))
}

pub async fn categories_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.session.lock().categories().into_iter().collect())
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Result<Json<Document>, ApiError> {
    match state.session.lock().document(doc_id) {
        Some(doc) => Ok(Json(doc.clone())),
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

use anyhow::Result;
use axum::Router;
use clap::Parser;
use search_core::SearchConfig;
use server::{build_app, init_session, InitOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Collection URL or file path
    #[arg(long, default_value = "./public/search/search.json")]
    source: String,
    /// Build identifier; defaults to the SHA-1 of the fetched collection
    #[arg(long)]
    build_hash: Option<String>,
    /// Cache directory
    #[arg(long, default_value = "./search-cache")]
    cache_dir: PathBuf,
    /// Optional JSON file with search settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = SearchConfig::load(args.config.as_deref())?;
    let session = init_session(InitOptions {
        source: args.source,
        build_hash: args.build_hash,
        cache_dir: args.cache_dir,
        config,
    })
    .await?;
    tracing::info!(state = ?session.state(), "search session initialized");
    let app: Router = build_app(session);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use indexer::SourceFormat;
use search_core::EngineConfig;
use server::{build_app, ServerConfig, SourceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Document source used for the initial build and for /index/rebuild
    #[arg(long)]
    source: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = SourceFormat::Feed)]
    format: SourceFormat,
    /// JSON engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let engine = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            EngineConfig::from_json(&text)?
        }
        None => EngineConfig::default(),
    };
    let config = ServerConfig {
        index_dir: args.index.clone(),
        source: args.source.clone().map(|path| SourceConfig { format: args.format, path }),
        engine,
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
        cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
    };
    let app: Router = build_app(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

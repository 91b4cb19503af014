use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use rmcp::{ServiceExt, transport::stdio};
use clap::Parser;
use docs_mcp_rs::config::ProfileSet;
use docs_mcp_rs::embedding::{DEFAULT_DIMENSION, HashEmbedder};
use docs_mcp_rs::fetch::HttpFetcher;
use docs_mcp_rs::hostconfig::{HostServerEntry, host_config};
use docs_mcp_rs::intent::IntentTable;
use docs_mcp_rs::server::{DocsServer, DocsService, RefreshSource};

#[cfg(feature = "trace")]
use tracing_subscriber::{EnvFilter};

#[derive(Parser)]
struct Cli {
    /// The documentation profile to serve
    #[clap(long, env = "DOCS_MCP_DOMAIN", default_value = "composio")]
    domain: String,
    /// A TOML file with extra or overriding profiles (optional)
    #[clap(long, env = "DOCS_MCP_CONFIG")]
    config: Option<PathBuf>,
    /// Directory of the vector store (defaults to ./<domain>_docs_store)
    #[clap(long, env = "DOCS_MCP_STORE_DIR")]
    store_dir: Option<PathBuf>,
    /// Log file; stdout carries the protocol
    #[clap(long, env = "DOCS_MCP_LOG_FILE", default_value = "server.log")]
    log_file: PathBuf,
    /// Override the profile's crawl budget
    #[clap(long, env = "DOCS_MCP_MAX_PAGES")]
    max_pages: Option<usize>,
    /// Index the documentation before serving when the store is empty
    #[clap(long, env = "DOCS_MCP_INDEX_ON_START")]
    index_on_start: bool,
    /// Print the editor host config entry for this server and exit
    #[clap(long)]
    emit_host_config: bool,
}

/// You can inspect the server using the Model Context Protocol Inspector.
/// npx @modelcontextprotocol/inspector cargo run -- --domain reflex

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut profiles = match &args.config {
        Some(path) => ProfileSet::load_from(path)?,
        None => ProfileSet::default(),
    };
    if let Some(max_pages) = args.max_pages {
        profiles.profiles.iter_mut().for_each(|p| p.max_pages = max_pages);
    }
    let profile = profiles
        .get(&args.domain)
        .cloned()
        .with_context(|| format!("unknown domain {:?}, expected one of {:?}", args.domain, profiles.names()))?;
    let store_dir = args
        .store_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}_docs_store", profile.name)));

    if args.emit_host_config {
        print_host_config(&args, &store_dir)?;
        return Ok(());
    }

    // Initialize the tracing subscriber with file logging
    #[cfg(feature = "trace")]
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_writer(std::fs::File::create(&args.log_file)?)
        .with_ansi(false)
        .init();

    tracing::info!("Starting {} docs MCP server", profile.label);

    let table = Arc::new(IntentTable::from_profiles(&profiles.profiles)?);
    let fetcher = Arc::new(HttpFetcher::new(profile.fetch.clone())?);
    let embedder = Arc::new(HashEmbedder::new(DEFAULT_DIMENSION));
    let max_pages = profile.max_pages;
    let service = Arc::new(DocsService::new(profile, table, &store_dir, embedder, fetcher)?);
    tracing::info!("Vector store at {:?}", store_dir);

    if args.index_on_start {
        match service.refresh(RefreshSource::Crawl { max_pages }, false).await {
            Ok(summary) => tracing::info!("Startup indexing: {}", summary),
            Err(e) => tracing::error!("Startup indexing failed: {}", e),
        }
    }

    let service = DocsServer::new(service)
        .serve(stdio()).await.inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}

fn print_host_config(args: &Cli, store_dir: &std::path::Path) -> Result<()> {
    let exe = std::env::current_exe()?;
    let cwd = std::env::current_dir()?;
    let mut cli_args = vec!["--domain".to_string(), args.domain.clone()];
    if let Some(config) = &args.config {
        cli_args.push("--config".to_string());
        cli_args.push(config.display().to_string());
    }
    let entry = HostServerEntry::stdio(exe.display().to_string(), cli_args)
        .with_cwd(cwd)
        .with_env("DOCS_MCP_STORE_DIR", store_dir.display().to_string());
    let name = format!("{}-docs", args.domain);
    println!("{}", serde_json::to_string_pretty(&host_config(&name, &entry))?);
    Ok(())
}

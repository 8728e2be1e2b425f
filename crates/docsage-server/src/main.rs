//! The `docsage` binary: index builder, query CLI, and HTTP search service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docsage_core::DocsageConfig;
use docsage_ingest::{Indexer, PdfExtractor};
use docsage_resolve::{render_passages, DocumentSearch};
use docsage_server::{build_router, AppState};
use docsage_store::SimilarityIndex;

#[derive(Parser)]
#[command(name = "docsage", version, about = "Semantic search over a folder of PDFs")]
struct Cli {
    /// JSON config file; a missing file means defaults plus environment
    #[arg(long, global = true, default_value = "docsage.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index every PDF in the data directory
    Build {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        index_dir: Option<PathBuf>,
        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Query the index and print expanded passages
    Search {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Serve the search API over HTTP
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show index metadata
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = DocsageConfig::load(Some(cli.config.as_path()))?;

    match cli.command {
        Command::Build {
            data_dir,
            index_dir,
            json,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(dir) = index_dir {
                config.index_dir = dir;
            }
            config.validate()?;
            run_build(&config, json).await
        }
        Command::Search { query, k, json } => {
            config.validate()?;
            run_search(&config, &query, k, json).await
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            run_serve(config).await
        }
        Command::Stats { json } => run_stats(&config, json),
    }
}

async fn run_build(config: &DocsageConfig, json: bool) -> anyhow::Result<()> {
    let embedder = docsage_infer::create_embedder(&config.embedding)?;
    let indexer = Indexer::from_config(config, embedder)?;
    let report = indexer
        .build_corpus(&config.data_dir, &config.index_dir, &PdfExtractor)
        .await
        .with_context(|| format!("building index from {}", config.data_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Indexed {} chunks from {} documents (dim {}) into {}",
            report.chunks,
            report.documents_processed,
            report.dimension,
            report.artifact.display()
        );
        if !report.failed_sources.is_empty() {
            println!("Skipped: {}", report.failed_sources.join(", "));
        }
    }
    Ok(())
}

async fn run_search(
    config: &DocsageConfig,
    query: &str,
    k: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let embedder = docsage_infer::create_embedder(&config.embedding)?;
    let index = Arc::new(SimilarityIndex::load(&config.index_dir)?);
    let search = DocumentSearch::from_config(index, embedder, &config.retrieval)?;
    let passages = search
        .search(query, k.unwrap_or(config.retrieval.top_k))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&passages)?);
    } else {
        println!("{}", render_passages(&passages));
    }
    Ok(())
}

async fn run_serve(config: DocsageConfig) -> anyhow::Result<()> {
    let embedder = docsage_infer::create_embedder(&config.embedding)?;
    let port = config.server.port;
    info!("Index directory: {}", config.index_dir.display());

    let state = Arc::new(AppState::new(config, embedder));
    if let Err(e) = state.search_service().await {
        // served anyway; queries report the error until an index appears
        tracing::warn!("Starting without an index: {}", e);
    }

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("docsage server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn run_stats(config: &DocsageConfig, json: bool) -> anyhow::Result<()> {
    let stats = SimilarityIndex::load(&config.index_dir)?.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let meta = &stats.meta;
    println!("Index:       {}", config.index_dir.display());
    println!("Rows:        {}", meta.rows);
    println!("Dimension:   {}", meta.dimension);
    println!("Metric:      {}", meta.metric);
    println!("Embedder:    {}", meta.embedder);
    println!("Built at:    {}", meta.built_at);
    println!("Fingerprint: {}", meta.fingerprint);
    println!("Sources:     {}", stats.sources);
    Ok(())
}

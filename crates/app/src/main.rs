mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docqa_core::{
    build_vectorstore, resolve_credentials, Credentials, IngestOutcome, IngestionOptions,
    LocalVectorStore, LopdfExtractor, MistralChat, MistralEmbeddings, PromptMode, RagConfig,
    RagPipeline,
};
use server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about a folder of PDFs")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "DOCQA_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Fail instead of prompting on the terminal for missing credentials.
    #[arg(long, default_value_t = false)]
    no_prompt: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the vector store if needed, then serve the HTTP API.
    Serve {
        /// Overrides `host` from the configuration.
        #[arg(long)]
        host: Option<String>,
        /// Overrides `port` from the configuration.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build the vector store and exit.
    Ingest {
        /// Rebuild even if the stored collection matches the sources.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Answer one question on stdout.
    Ask {
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = RagConfig::from_path(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let mode = if cli.no_prompt {
        PromptMode::Never
    } else {
        PromptMode::Interactive
    };
    let credentials = resolve_credentials(mode)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        embedding_model = %config.emb_model_id,
        generation_model = %config.llm_model_id,
        "docqa boot"
    );

    let embedder = Arc::new(MistralEmbeddings::new(
        &config.api_base_url,
        &credentials.api_key,
        &config.emb_model_id,
        config.request_timeout(),
    )?);

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Ingest { force } => {
            ingest(&config, &credentials, embedder.as_ref(), force).await?;
        }
        Command::Ask { question } => {
            let pipeline = prepare_pipeline(&config, &credentials, embedder).await?;
            let answer = pipeline.invoke(&question).await?;
            println!("{answer}");
        }
        Command::Serve { host, port } => {
            let pipeline = prepare_pipeline(&config, &credentials, embedder).await?;
            let address = format!(
                "{}:{}",
                host.unwrap_or_else(|| config.host.clone()),
                port.unwrap_or(config.port)
            );
            let listener = TcpListener::bind(&address)
                .await
                .with_context(|| format!("binding {address}"))?;
            info!(address = %address, "serving http api");

            axum::serve(listener, server::router(AppState::new(Arc::new(pipeline))))
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

async fn ingest(
    config: &RagConfig,
    credentials: &Credentials,
    embedder: &MistralEmbeddings,
    force: bool,
) -> anyhow::Result<()> {
    let options = IngestionOptions {
        force,
        ..IngestionOptions::from_config(config, credentials)
    };
    let client = reqwest::Client::new();

    match build_vectorstore(&options, embedder, &LopdfExtractor, &client).await? {
        IngestOutcome::Skipped { records } => {
            info!(records, "vector store up to date");
        }
        IngestOutcome::Created { documents, chunks } => {
            if chunks == 0 {
                warn!(documents, "vector store built from zero chunks");
            }
            info!(documents, chunks, "vector store built");
        }
    }
    Ok(())
}

async fn prepare_pipeline(
    config: &RagConfig,
    credentials: &Credentials,
    embedder: Arc<MistralEmbeddings>,
) -> anyhow::Result<RagPipeline> {
    ingest(config, credentials, embedder.as_ref(), false).await?;

    let store = LocalVectorStore::open(&config.persist_directory, &config.collection_name)
        .context("opening vector store")?;
    info!(records = store.len(), "vector store loaded");

    let generator = MistralChat::new(
        &config.api_base_url,
        &credentials.api_key,
        config.request_timeout(),
    )?;

    Ok(RagPipeline::from_config(
        config,
        embedder,
        Arc::new(store),
        Arc::new(generator),
    )?)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        return;
    }
    info!("shutting down");
}

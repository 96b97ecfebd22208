//! CLI entry point (spec §6). Loads `.env`, parses flags, assembles the
//! pipeline's services from environment variables, runs one pipeline pass,
//! writes the rendered output, and maps the terminal `AppError` to a
//! process exit code.

use aidigest::config::{CliArgs, PipelineConfig};
use aidigest::history::{ChromaHistoricalIndex, PgRecordStore};
use aidigest::run::PipelineServices;
use aidigest::AppError;
use chrono::Utc;
use clap::Parser;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = CliArgs::parse();

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(?err, "pipeline run failed");
            err.exit_code()
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: CliArgs) -> Result<(), AppError> {
    let config = PipelineConfig::new_from_env(&cli)?;

    let http = reqwest::Client::builder()
        .user_agent("aidigest/0.1")
        .build()
        .map_err(|err| AppError::Other(err.into()))?;

    let router = aidigest::llm::LlmRouter::new(&config).map_err(AppError::Other)?;

    let embedder: Option<Box<dyn aidigest::relevance::EmbeddingClient>> = Some(Box::new(aidigest::embedding::FastEmbedClient));

    let historical_index: Option<Box<dyn aidigest::history::HistoricalIndex>> = match &config.vector_db {
        Some(vector_config) => match ChromaHistoricalIndex::new(vector_config).await {
            Ok(index) => Some(Box::new(index)),
            Err(err) => {
                tracing::warn!(?err, "failed to connect to historical vector store, continuing without it");
                None
            }
        },
        None => {
            tracing::info!("no CHROMA_URL configured, continuing without a historical index");
            None
        }
    };

    let record_store: Option<Box<dyn aidigest::history::RecordStore>> = match &config.database {
        Some(db_config) => match PgRecordStore::new(db_config) {
            Ok(store) => Some(Box::new(store)),
            Err(err) => {
                tracing::warn!(?err, "failed to build record-store connection pool, continuing without persistence");
                None
            }
        },
        None => {
            tracing::info!("no DATABASE_URL configured, continuing without persistence");
            None
        }
    };

    let services = PipelineServices { http, router, embedder, historical_index, record_store };

    let state = aidigest::run_pipeline(&services, config).await?;

    aidigest::output::write_run_outputs(&state, Utc::now()).map_err(|err| AppError::Other(err.into()))?;

    Ok(())
}

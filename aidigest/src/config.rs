//! Environment-driven configuration (spec §6) plus the CLI surface.
//!
//! Env var loading follows the teacher's `var`/`required_var` idiom: a
//! missing optional variable disables the feature it gates (an LLM provider,
//! the vector store) rather than failing the run; a missing *required*
//! variable is a fatal configuration error (spec §7).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

/// CLI surface (spec §6).
#[derive(Parser, Clone, Debug)]
#[command(name = "aidigest")]
#[command(version, about = "Build the daily AI news digest", long_about = None)]
pub struct CliArgs {
    /// Maximum number of raw items to collect across all sources.
    #[arg(long, default_value_t = 30)]
    pub max_items: u32,

    /// Edition name, embedded in the output filename.
    #[arg(long, default_value = "daily")]
    pub edition: String,

    /// Directory the rendered newsletter is written under.
    #[arg(long, default_value = "drafts")]
    pub output_dir: PathBuf,

    /// Skip all external side effects (persistent store writes, vector
    /// index appends); still calls LLM providers to exercise the full
    /// pipeline.
    #[arg(long)]
    pub dry_run: bool,

    /// Embedding model identifier, forwarded to the embedding backend.
    #[arg(long, default_value = "AllMiniLML12V2")]
    pub embedding_model: String,

    /// Embedding vector dimensionality; must match the historical index.
    #[arg(long, default_value_t = 384)]
    pub embedding_dimensions: usize,

    /// Path to the sources configuration document (spec §6).
    #[arg(long, default_value = "sources.json")]
    pub sources_file: PathBuf,
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => {
            tracing::debug!("environment variable `{key}` not set");
            Ok(None)
        }
        Err(std::env::VarError::NotUnicode(_)) => Err(format!(
            "environment variable `{key}` is not valid unicode"
        )),
    }
}

fn var_or(key: &str, default: &str) -> String {
    var(key).ok().flatten().unwrap_or_else(|| default.to_string())
}

/// One configured LLM provider. Absence of its API key disables it; the
/// router (spec §4.3) must still function as long as one provider remains.
#[derive(Clone, Debug)]
pub struct LlmProviderConfig {
    pub name: String,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct VectorDbConfig {
    pub url: String,
    pub database: Option<String>,
    pub token: Option<String>,
    pub collection: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Top-level runtime configuration, assembled from environment variables
/// and the parsed CLI flags.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub env: Env,
    pub cli: CliArgsSnapshot,
    pub llm_providers: Vec<LlmProviderConfig>,
    pub vector_db: Option<VectorDbConfig>,
    pub database: Option<DatabaseConfig>,

    // Relevance filter (spec §4.2)
    pub relevance_base_threshold: f64,
    pub relevance_min_threshold: f64,
    pub relevance_min_target_count: usize,
    pub relevance_max_pool: usize,

    // Summarizer (spec §4.3)
    pub summarizer_concurrency: usize,
    pub llm_primary_attempts: u32,
    pub llm_call_timeout: Duration,

    // Dedup/context (spec §4.4)
    pub duplicate_threshold: f64,
    pub consolidation_threshold: f64,
    pub context_similarity_threshold: f64,
    pub max_concurrent_llm: usize,

    // Clusterer (spec §4.5)
    pub coherence_threshold: f64,
    pub max_clusters: usize,
    pub min_cluster_size: usize,

    // Citations (spec §4.6)
    pub citation_concurrency: usize,
    pub max_citations_per_article: usize,

    // Editorial (spec §4.7)
    pub quality_threshold: f64,
    pub target_article_min: usize,
    pub target_article_max: usize,
    pub upgrade_marker: String,

    // Whole-run timeout (spec §5)
    pub stage_timeout: Duration,
}

/// Plain-data snapshot of [`CliArgs`] (kept separate so config construction
/// doesn't need to own a `clap`-owned value).
#[derive(Clone, Debug)]
pub struct CliArgsSnapshot {
    pub max_items: u32,
    pub edition: String,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub sources_file: PathBuf,
}

impl From<&CliArgs> for CliArgsSnapshot {
    fn from(a: &CliArgs) -> Self {
        Self {
            max_items: a.max_items,
            edition: a.edition.clone(),
            output_dir: a.output_dir.clone(),
            dry_run: a.dry_run,
            embedding_model: a.embedding_model.clone(),
            embedding_dimensions: a.embedding_dimensions,
            sources_file: a.sources_file.clone(),
        }
    }
}

impl PipelineConfig {
    /// Build the config from environment variables plus parsed CLI flags.
    /// Fatal per spec §7 if zero LLM providers end up configured.
    pub fn new_from_env(cli: &CliArgs) -> Result<Self, AppError> {
        let env = match var("ENVIRONMENT").ok().flatten().as_deref() {
            Some("staging") => Env::Staging,
            Some("production") => Env::Production,
            _ => Env::Dev,
        };

        let mut llm_providers = Vec::new();
        if let Ok(Some(key)) = var("OPENAI_API_KEY") {
            llm_providers.push(LlmProviderConfig {
                name: "primary".to_string(),
                api_key: key,
                model: var_or("OPENAI_MODEL", "gpt-5-mini"),
                base_url: None,
            });
        }
        if let Ok(Some(key)) = var("ANTHROPIC_API_KEY") {
            llm_providers.push(LlmProviderConfig {
                name: "fallback-1".to_string(),
                api_key: key,
                model: var_or("ANTHROPIC_MODEL", "claude-haiku-4-5"),
                base_url: None,
            });
        }
        if let Ok(Some(key)) = var("OPENROUTER_API_KEY") {
            llm_providers.push(LlmProviderConfig {
                name: "fallback-2".to_string(),
                api_key: key,
                model: var_or("OPENROUTER_MODEL", "openai/gpt-5-mini"),
                base_url: Some("https://openrouter.ai/api/v1".to_string()),
            });
        }
        if llm_providers.is_empty() {
            return Err(AppError::Configuration(
                "at least one LLM provider (OPENAI_API_KEY, ANTHROPIC_API_KEY, \
                 OPENROUTER_API_KEY) must be configured"
                    .to_string(),
            ));
        }

        let vector_db = var("CHROMA_URL").ok().flatten().map(|url| VectorDbConfig {
            url,
            database: var("CHROMA_DATABASE").ok().flatten(),
            token: var("CHROMA_TOKEN").ok().flatten(),
            collection: var_or("CHROMA_COLLECTION", "historical_items"),
        });

        let database = var("DATABASE_URL")
            .ok()
            .flatten()
            .map(|url| DatabaseConfig { url });

        Ok(PipelineConfig {
            env,
            cli: CliArgsSnapshot::from(cli),
            llm_providers,
            vector_db,
            database,

            relevance_base_threshold: env_f64("RELEVANCE_BASE_THRESHOLD", 0.2),
            relevance_min_threshold: env_f64("RELEVANCE_MIN_THRESHOLD", 0.1),
            relevance_min_target_count: env_usize("RELEVANCE_MIN_TARGET_COUNT", 5),
            relevance_max_pool: env_usize("RELEVANCE_MAX_POOL", 30),

            summarizer_concurrency: env_usize("SUMMARIZER_CONCURRENCY", 5),
            llm_primary_attempts: env_usize("LLM_PRIMARY_ATTEMPTS", 3) as u32,
            llm_call_timeout: Duration::from_secs(env_usize("LLM_CALL_TIMEOUT_SECS", 60) as u64),

            duplicate_threshold: env_f64("DUPLICATE_THRESHOLD", 0.85),
            consolidation_threshold: env_f64("CONSOLIDATION_THRESHOLD", 0.55),
            context_similarity_threshold: env_f64("CONTEXT_SIMILARITY_THRESHOLD", 0.70),
            max_concurrent_llm: env_usize("MAX_CONCURRENT_LLM", 8),

            coherence_threshold: env_f64("COHERENCE_THRESHOLD", 0.75),
            max_clusters: env_usize("MAX_CLUSTERS", 10),
            min_cluster_size: env_usize("MIN_CLUSTER_SIZE", 2),

            citation_concurrency: env_usize("CITATION_CONCURRENCY", 8),
            max_citations_per_article: env_usize("MAX_CITATIONS_PER_ARTICLE", 3),

            quality_threshold: env_f64("QUALITY_THRESHOLD", 0.35),
            target_article_min: env_usize("TARGET_ARTICLE_MIN", 7),
            target_article_max: env_usize("TARGET_ARTICLE_MAX", 10),
            upgrade_marker: var_or("UPGRADE_MARKER", "\u{1F501} "),

            stage_timeout: Duration::from_secs(env_usize("STAGE_TIMEOUT_SECS", 600) as u64),
        })
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    var(key)
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    var(key)
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// One entry in the sources configuration document (spec §6).
#[derive(Clone, Debug, Deserialize)]
pub struct SourceEntry {
    pub id: String,
    pub kind: crate::model::SourceKind,
    pub location: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub max_items: Option<u32>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceEntry>,
}

impl SourcesFile {
    pub fn load(path: &std::path::Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(AppError::SourcesUnreadable)?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::Configuration(format!("invalid sources file: {e}")))
    }
}

//! Pipeline wiring (spec §7): a linear S1→S7 run over one append-only
//! [`RunState`], with stage-level timeout enforcement and the
//! fatal-vs-swallowed error propagation policy.

use chrono::Utc;

use crate::config::{PipelineConfig, SourcesFile};
use crate::error::AppError;
use crate::history::{HistoricalIndex, HistoricalMatch, HistoricalRecord, RecordStore};
use crate::llm::LlmRouter;
use crate::model::{LogEntry, LogLevel, ProcessedArticle, RunStatus, TopicCluster};
use crate::relevance::EmbeddingClient;

/// Services shared across every stage of one run. Embedder, historical
/// index, and record store are each optional — their absence disables the
/// feature they gate (spec §7's configuration-failure policy is reserved
/// for the LLM-provider list, not these).
pub struct PipelineServices {
    pub http: reqwest::Client,
    pub router: LlmRouter,
    pub embedder: Option<Box<dyn EmbeddingClient>>,
    pub historical_index: Option<Box<dyn HistoricalIndex>>,
    pub record_store: Option<Box<dyn RecordStore>>,
}

/// Append-only accumulator plus the run's terminal status (spec §3's
/// RunState entity). Earlier collections are never rewritten; each stage
/// appends its own log entries.
pub struct RunState {
    pub config: PipelineConfig,
    pub log: Vec<LogEntry>,
    pub status: RunStatus,
    pub newsletter: Option<crate::editorial::render::Newsletter>,
    pub clusters: Vec<TopicCluster>,
    pub relationships: Vec<crate::model::RelationshipRecord>,
    pub llm_calls: u32,
}

impl RunState {
    fn record(&mut self, stage: &'static str, level: LogLevel, message: impl Into<String>) {
        self.log.push(LogEntry { stage, level, message: message.into(), at: Utc::now() });
        if level == LogLevel::Error && self.status == RunStatus::Success {
            self.status = RunStatus::Partial;
        }
    }
}

async fn with_stage_timeout<T>(
    config: &PipelineConfig,
    stage: &'static str,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, AppError> {
    tokio::time::timeout(config.stage_timeout, fut)
        .await
        .map_err(|_| AppError::StageTimeout { stage })
}

/// Embedding client stand-in for when none is configured — always fails,
/// which every caller already treats the same as a configured backend's
/// permanent failure (spec §7 "embedding calls... on permanent failure,
/// context analysis for that item is skipped").
struct NoopEmbeddingClient;

#[async_trait::async_trait]
impl EmbeddingClient for NoopEmbeddingClient {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, eyre::Error> {
        Err(eyre::eyre!("no embedding client configured"))
    }
}

/// Historical index stand-in for when none is configured — searches return
/// no candidates (treated as KEEP) and appends are no-ops.
struct NoopHistoricalIndex;

#[async_trait::async_trait]
impl HistoricalIndex for NoopHistoricalIndex {
    async fn append(&self, _record: HistoricalRecord, _vector: Vec<f32>) -> Result<(), eyre::Error> {
        Ok(())
    }
    async fn search(&self, _query_vector: &[f32], _k: usize) -> Result<Vec<HistoricalMatch>, eyre::Error> {
        Ok(Vec::new())
    }
    async fn persist(&self) -> Result<(), eyre::Error> {
        Ok(())
    }
}

/// Run the full pipeline once, producing a [`RunState`] carrying either a
/// rendered [`Newsletter`](crate::editorial::render::Newsletter) or an
/// empty-pool fallback (spec §7 "User-visible behavior").
#[tracing::instrument(skip(services, config))]
pub async fn run_pipeline(services: &PipelineServices, config: PipelineConfig) -> Result<RunState, AppError> {
    let mut state = RunState {
        config: config.clone(),
        log: Vec::new(),
        status: RunStatus::Success,
        newsletter: None,
        clusters: Vec::new(),
        relationships: Vec::new(),
        llm_calls: 0,
    };

    let sources = SourcesFile::load(&config.cli.sources_file)?;

    let noop_embedder = NoopEmbeddingClient;
    let embedder: &dyn EmbeddingClient = services.embedder.as_deref().unwrap_or(&noop_embedder);
    let noop_index = NoopHistoricalIndex;
    let historical_index: &dyn HistoricalIndex = services.historical_index.as_deref().unwrap_or(&noop_index);

    if services.embedder.is_some() {
        check_embedding_dimension(&config, embedder).await?;
    }

    let fetch_services = crate::fetch::FetchServices { http: services.http.clone() };
    let (raw_items, fetch_log) = with_stage_timeout(
        &config,
        "fetch",
        crate::fetch::collect(&fetch_services, &config, &sources.sources, config.cli.max_items as usize),
    )
    .await?;
    state.log.extend(fetch_log);
    state.record("fetch", LogLevel::Info, format!("collected {} raw items", raw_items.len()));

    let embedder_opt = services.embedder.is_some().then_some(embedder);
    let (scored_items, relevance_log) = with_stage_timeout(&config, "relevance", crate::relevance::filter(&config, raw_items, embedder_opt))
        .await?
        .map_err(AppError::Other)?;
    state.log.extend(relevance_log);
    state.record("relevance", LogLevel::Info, format!("{} items passed relevance filter", scored_items.len()));

    if scored_items.is_empty() {
        state.record("relevance", LogLevel::Warn, "empty pool after relevance filter, emitting fallback newsletter");
        state.newsletter = Some(empty_newsletter());
        return Ok(state);
    }

    let summarized = with_stage_timeout(&config, "summarizer", crate::summarizer::summarize_all(&services.router, &config, scored_items)).await?;
    state.llm_calls += summarized.len() as u32;
    state.record("summarizer", LogLevel::Info, format!("{} items summarized", summarized.len()));

    let groups = crate::dedup::consolidate(&config, summarized);
    state.record("dedup", LogLevel::Info, format!("consolidated into {} groups", groups.len()));

    let (mut articles, relationships) = with_stage_timeout(
        &config,
        "context",
        crate::context::analyze(&config, &services.router, embedder, historical_index, groups),
    )
    .await?;
    state.relationships = relationships;
    state.record("context", LogLevel::Info, format!("{} articles after context analysis", articles.len()));

    let clusters = with_stage_timeout(&config, "cluster", crate::cluster::cluster(&config, &services.router, embedder, &articles)).await?;
    apply_cluster_ids(&mut articles, &clusters);
    state.clusters = clusters.clone();
    state.record("cluster", LogLevel::Info, format!("{} topic clusters formed", clusters.len()));

    let articles = with_stage_timeout(&config, "citations", crate::citations::assemble(&config, &services.router, articles, &clusters)).await?;
    state.record("citations", LogLevel::Info, "citations assembled");

    let newsletter = with_stage_timeout(&config, "editorial", crate::editorial::assemble(&config, &services.router, articles, &clusters)).await?;
    state.record("editorial", LogLevel::Info, format!("{} articles in final newsletter", newsletter.articles.len()));

    persist_run(&mut state, services, &newsletter).await;

    state.newsletter = Some(newsletter);
    Ok(state)
}

/// Fatal configuration check (spec §3 invariant 7 / §7 "dimension mismatch
/// with historical index"): abort before S3 if the embedder's output
/// dimension doesn't match what the run was configured to expect.
async fn check_embedding_dimension(config: &PipelineConfig, embedder: &dyn EmbeddingClient) -> Result<(), AppError> {
    let probe = embedder
        .embed(std::slice::from_ref(&"dimension probe".to_string()))
        .await
        .map_err(AppError::Other)?;
    let Some(vector) = probe.first() else {
        return Ok(());
    };
    if vector.len() != config.cli.embedding_dimensions {
        return Err(AppError::DimensionMismatch { expected: config.cli.embedding_dimensions, actual: vector.len() });
    }
    Ok(())
}

fn apply_cluster_ids(articles: &mut [ProcessedArticle], clusters: &[TopicCluster]) {
    for cluster in clusters {
        for article in articles.iter_mut() {
            if cluster.member_ids().any(|id| id == article.id()) {
                article.cluster_id = Some(cluster.cluster_id.clone());
            }
        }
    }
}

fn empty_newsletter() -> crate::editorial::render::Newsletter {
    let lead = "No notable AI news items cleared the relevance filter today.".to_string();
    let markdown = crate::editorial::render::render_markdown(&lead, &[], &[]);
    crate::editorial::render::Newsletter { lead, toc: Vec::new(), articles: Vec::new(), markdown }
}

/// Write the historical record-store rows for this run (spec §6's four
/// tables); failures here are logged and swallowed per spec §7's
/// "persistent-store failure" policy.
async fn persist_run(state: &mut RunState, services: &PipelineServices, newsletter: &crate::editorial::render::Newsletter) {
    if state.config.cli.dry_run {
        return;
    }
    let Some(store) = &services.record_store else {
        return;
    };

    let now = Utc::now();
    let processing_date = now.date_naive();

    let processed_content = crate::history::NewProcessedContent {
        processing_date,
        edition: state.config.cli.edition.clone(),
        content_type: "newsletter".to_string(),
        title: newsletter.toc.first().cloned().unwrap_or_default(),
        lead_paragraph: newsletter.lead.clone(),
        articles_count: newsletter.articles.len() as i32,
        multi_source_topics: serde_json::json!(state.clusters.iter().map(|c| &c.topic_name).collect::<Vec<_>>()),
        content_md: newsletter.markdown.clone(),
        metadata: None,
    };
    if let Err(err) = store.upsert_processed_content(processed_content).await {
        state.record("persist", LogLevel::Error, format!("failed to persist processed_content: {err}"));
    }

    for article in &newsletter.articles {
        let Some(embedding) = article_embedding(services, article).await else {
            continue;
        };
        let row = crate::history::NewContextualArticle {
            article_id: article.id().to_string(),
            title: article.summarized.scored.item.title.clone(),
            content_summary: article.summarized.summary.bullets.join(" "),
            published_date: article.summarized.scored.item.published_at,
            source_url: article.url().to_string(),
            source_id: article.source_id().to_string(),
            topic_cluster: article.cluster_id.clone(),
            ai_relevance_score: article.ai_relevance(),
            summary_points: serde_json::json!(article.summarized.summary.bullets),
            display_title: Some(article.display_title.clone()),
            is_update: article.is_update,
            embedding: pgvector::Vector::from(embedding),
        };
        if let Err(err) = store.upsert_contextual_article(row).await {
            state.record("persist", LogLevel::Error, format!("failed to persist contextual_article {}: {err}", article.id()));
        }
    }

    for relationship in &state.relationships {
        let row = crate::history::relationship_row(relationship);
        if let Err(err) = store.insert_relationship(row).await {
            state.record("persist", LogLevel::Error, format!("failed to persist relationship: {err}"));
        }
    }

    let log_row = crate::history::NewProcessingLog {
        processing_date,
        edition: state.config.cli.edition.clone(),
        status: crate::history::run_status_str(state.status).to_string(),
        articles_processed: newsletter.articles.len() as i32,
        articles_failed: 0,
        llm_calls: state.llm_calls as i32,
        total_tokens: 0,
        processing_time_seconds: 0.0,
        data: serde_json::json!({ "log_entries": state.log.iter().map(|e| e.message.clone()).collect::<Vec<_>>() }),
        error_details: None,
    };
    if let Err(err) = store.upsert_processing_log(log_row).await {
        state.record("persist", LogLevel::Error, format!("failed to persist processing_log: {err}"));
    }

    if let Some(index) = &services.historical_index {
        if let Err(err) = index.persist().await {
            state.record("persist", LogLevel::Error, format!("failed to persist historical index: {err}"));
        }
    }
}

async fn article_embedding(services: &PipelineServices, article: &ProcessedArticle) -> Option<pgvector::Vector> {
    let embedder = services.embedder.as_deref()?;
    let text = format!("{} {}", article.summarized.scored.item.title, article.summarized.summary.bullets.join(" "));
    crate::embedding::embed_one(embedder, &text).await.ok().map(pgvector::Vector::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_newsletter_has_no_articles_but_renders() {
        let newsletter = empty_newsletter();
        assert!(newsletter.articles.is_empty());
        assert!(newsletter.markdown.contains("No notable AI news items"));
    }

    #[test]
    fn record_escalates_status_to_partial_on_error() {
        let cli = crate::config::CliArgs {
            max_items: 30,
            edition: "daily".to_string(),
            output_dir: "drafts".into(),
            dry_run: true,
            embedding_model: "AllMiniLML12V2".to_string(),
            embedding_dimensions: 384,
            sources_file: "sources.json".into(),
        };
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "test");
        }
        let config = PipelineConfig::new_from_env(&cli).expect("config");
        let mut state = RunState {
            config,
            log: Vec::new(),
            status: RunStatus::Success,
            newsletter: None,
            clusters: Vec::new(),
            relationships: Vec::new(),
            llm_calls: 0,
        };
        state.record("fetch", LogLevel::Info, "ok");
        assert_eq!(state.status, RunStatus::Success);
        state.record("summarizer", LogLevel::Error, "provider down");
        assert_eq!(state.status, RunStatus::Partial);
    }
}

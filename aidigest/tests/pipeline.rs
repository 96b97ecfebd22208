//! End-to-end boundary coverage for [`aidigest::run_pipeline`], mirroring
//! `blz-core`'s `tests/` layout: one process-level test per scenario,
//! network calls faked with `wiremock`.

use std::sync::Mutex;
use std::time::Duration;

use aidigest::config::{CliArgs, PipelineConfig};
use aidigest::relevance::EmbeddingClient;
use aidigest::run::PipelineServices;
use aidigest::AppError;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `PipelineConfig::new_from_env` reads process-global env vars, so tests
/// that set LLM provider keys must not run concurrently with each other.
static ENV_GUARD: Mutex<()> = Mutex::new(());

fn cli(sources_file: std::path::PathBuf) -> CliArgs {
    CliArgs {
        max_items: 30,
        edition: "daily".to_string(),
        output_dir: std::env::temp_dir().join("aidigest-test-drafts"),
        dry_run: true,
        embedding_model: "AllMiniLML12V2".to_string(),
        embedding_dimensions: 384,
        sources_file,
    }
}

fn write_sources(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("sources.json");
    std::fs::write(&path, body).expect("write sources.json");
    path
}

struct FixedDimEmbedder(usize);

#[async_trait::async_trait]
impl EmbeddingClient for FixedDimEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, eyre::Error> {
        Ok(texts.iter().map(|_| vec![0.0_f32; self.0]).collect())
    }
}

fn services(router: aidigest::llm::LlmRouter, embedder: Option<Box<dyn EmbeddingClient>>) -> PipelineServices {
    PipelineServices {
        http: reqwest::Client::new(),
        router,
        embedder,
        historical_index: None,
        record_store: None,
    }
}

#[tokio::test]
async fn empty_source_list_yields_fallback_newsletter() {
    let _guard = ENV_GUARD.lock().unwrap_or_else(|e| e.into_inner());
    unsafe {
        std::env::set_var("OPENAI_API_KEY", "test-key");
    }
    let dir = tempfile::tempdir().unwrap();
    let sources_path = write_sources(&dir, r#"{"sources": []}"#);
    let args = cli(sources_path);
    let config = PipelineConfig::new_from_env(&args).expect("config");
    let router = aidigest::llm::LlmRouter::new(&config).expect("router");

    let state = aidigest::run_pipeline(&services(router, None), config)
        .await
        .expect("pipeline should not fail on an empty source list");

    let newsletter = state.newsletter.expect("fallback newsletter");
    assert!(newsletter.articles.is_empty());
    assert!(newsletter.markdown.contains("No notable AI news items"));
}

#[tokio::test]
async fn dimension_mismatch_is_fatal() {
    let _guard = ENV_GUARD.lock().unwrap_or_else(|e| e.into_inner());
    unsafe {
        std::env::set_var("OPENAI_API_KEY", "test-key");
    }
    let dir = tempfile::tempdir().unwrap();
    let sources_path = write_sources(&dir, r#"{"sources": []}"#);
    let args = cli(sources_path);
    let config = PipelineConfig::new_from_env(&args).expect("config");
    assert_eq!(config.cli.embedding_dimensions, 384);
    let router = aidigest::llm::LlmRouter::new(&config).expect("router");

    let embedder: Box<dyn EmbeddingClient> = Box::new(FixedDimEmbedder(4));
    let err = aidigest::run_pipeline(&services(router, Some(embedder)), config)
        .await
        .expect_err("a configured embedder returning the wrong dimension is fatal");

    match err {
        AppError::DimensionMismatch { expected, actual } => {
            assert_eq!(expected, 384);
            assert_eq!(actual, 4);
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn all_llm_providers_down_degrades_to_partial_run() {
    let _guard = ENV_GUARD.lock().unwrap_or_else(|e| e.into_inner());
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&llm_server)
        .await;

    let feed_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sample_rss_feed()))
        .mount(&feed_server)
        .await;

    unsafe {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::set_var("OPENROUTER_API_KEY", "down-key");
        std::env::set_var("OPENROUTER_MODEL", "openai/gpt-5-mini");
    }

    let dir = tempfile::tempdir().unwrap();
    let sources_path = write_sources(
        &dir,
        &format!(
            r#"{{"sources": [{{"id": "feed-a", "kind": "feed", "location": "{}/feed.xml", "enabled": true}}]}}"#,
            feed_server.uri()
        ),
    );
    let args = cli(sources_path);
    let mut config = PipelineConfig::new_from_env(&args).expect("config");
    config.llm_providers[0].base_url = Some(llm_server.uri());
    config.stage_timeout = Duration::from_secs(20);
    let router = aidigest::llm::LlmRouter::new(&config).expect("router");

    let state = aidigest::run_pipeline(&services(router, None), config)
        .await
        .expect("a down LLM provider degrades gracefully rather than failing the run");

    let newsletter = state.newsletter.expect("newsletter should still render");
    assert!(!newsletter.articles.is_empty(), "the degenerate-summary fallback should still produce an article");
}

fn sample_rss_feed() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>OpenAI ships new transformer language model with record benchmark scores</title>
      <link>https://example.com/articles/openai-transformer</link>
      <description>A detailed look at the new large language model release, including benchmark numbers and API pricing.</description>
    </item>
  </channel>
</rss>"#
        .to_string()
}

//! LLM router (spec §4.3, §6). Wraps an ordered list of providers behind one
//! interface, grounded on `discord/agent.rs`'s use of `rig::providers::openai`
//! and `rig::completion::Prompt`. Retry/backoff/fallback lives here instead
//! of at each call site, per spec §9's "centralize the retry/fallback loop".

mod parsing;

use std::time::Duration;

use rand::Rng;
use rig::completion::Prompt;
use rig::providers::openai;

use crate::config::{LlmProviderConfig, PipelineConfig};
use crate::model::Summary;

pub use parsing::parse_summary_response;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider `{provider}` call failed: {source}")]
    ProviderCall {
        provider: String,
        #[source]
        source: eyre::Error,
    },
    #[error("all providers exhausted")]
    AllProvidersFailed,
}

struct Provider {
    name: String,
    model: openai::CompletionModel,
    primary: bool,
}

/// Ordered provider fallback list behind one `summarize`/`generate_text`/
/// `generate_title` interface (spec §4.3's router contract).
pub struct LlmRouter {
    providers: Vec<Provider>,
    primary_attempts: u32,
    call_timeout: Duration,
}

impl LlmRouter {
    pub fn new(config: &PipelineConfig) -> Result<Self, eyre::Error> {
        if config.llm_providers.is_empty() {
            return Err(eyre::eyre!("no LLM providers configured"));
        }

        let providers = config
            .llm_providers
            .iter()
            .enumerate()
            .map(|(i, p)| build_provider(p, i == 0))
            .collect();

        Ok(Self {
            providers,
            primary_attempts: config.llm_primary_attempts,
            call_timeout: config.llm_call_timeout,
        })
    }

    /// Run `prompt` against the provider list with per-provider retry and
    /// cross-provider fallback (spec §4.3).
    #[tracing::instrument(skip(self, prompt))]
    async fn complete(&self, prompt: &str) -> Result<(String, String), LlmError> {
        for provider in &self.providers {
            let attempts = if provider.primary { self.primary_attempts } else { 1 };

            for attempt in 0..attempts {
                let result = tokio::time::timeout(self.call_timeout, call_provider(provider, prompt)).await;

                match result {
                    Ok(Ok(text)) => return Ok((text, provider.name.clone())),
                    Ok(Err(err)) => {
                        tracing::warn!(provider = provider.name, attempt, ?err, "provider call failed");
                    }
                    Err(_) => {
                        tracing::warn!(provider = provider.name, attempt, "provider call timed out");
                    }
                }

                if attempt + 1 < attempts {
                    backoff_sleep(attempt).await;
                }
            }
        }

        Err(LlmError::AllProvidersFailed)
    }

    /// Summarize an item into 3-4 bullets (spec §4.3).
    pub async fn summarize(
        &self,
        title: &str,
        body: &str,
        url: &str,
        source: &str,
    ) -> Result<(Summary, String), LlmError> {
        let prompt = crate::prompts::summarize_prompt(title, body, url, source);
        let (raw, provider) = self.complete(&prompt).await?;
        let summary = parse_summary_response(&raw, &provider)
            .unwrap_or_else(|| parsing::fallback_bullets(&raw, &provider));
        Ok((summary, provider))
    }

    /// Free-form text generation (spec §4.3 `generate_text`).
    pub async fn generate_text(&self, prompt: &str) -> Result<Option<String>, LlmError> {
        match self.complete(prompt).await {
            Ok((text, _)) => Ok(crate::validation::strip_meta_artifacts(&text)),
            Err(LlmError::AllProvidersFailed) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Title generation (spec §4.3 `generate_title`).
    pub async fn generate_title(&self, article_summary: &str) -> Result<Option<String>, LlmError> {
        let prompt = crate::prompts::title_prompt(article_summary);
        self.generate_text(&prompt).await
    }
}

fn build_provider(config: &LlmProviderConfig, primary: bool) -> Provider {
    let client = match &config.base_url {
        Some(base) => openai::Client::from_url(&config.api_key, base),
        None => openai::Client::new(&config.api_key),
    };
    let model = openai::CompletionModel::new(client, &config.model);
    Provider {
        name: config.name.clone(),
        model,
        primary,
    }
}

async fn call_provider(provider: &Provider, prompt: &str) -> Result<String, eyre::Error> {
    let agent = provider.model.clone().into_agent_builder().build();
    agent
        .prompt(prompt)
        .await
        .map_err(|err| eyre::eyre!("{err}"))
}

async fn backoff_sleep(attempt: u32) {
    let base_ms = 250u64 * 2u64.pow(attempt);
    let jitter_ms = rand::rng().random_range(0..100);
    tokio::time::sleep(Duration::from_millis(base_ms + jitter_ms)).await;
}

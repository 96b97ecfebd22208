//! S2 — Relevance filter (spec §4.2). Scores each [`RawItem`] for
//! AI-relatedness and applies a dynamic threshold, lowering the bar until
//! either a minimum target count is reached or the floor is hit.

use serde::Deserialize;

use crate::config::PipelineConfig;
use crate::model::{RawItem, ScoredItem};

const KEYWORDS_JSON: &str = include_str!("../data/relevance_keywords.json");

/// Small exemplar sets for the semantic score (spec §4.2 step 2). Kept in
/// code, not JSON, since they're consumed only as embedding inputs.
const POSITIVE_EXEMPLARS: &[&str] = &[
    "A research lab releases a new large language model with improved reasoning.",
    "A company ships an AI coding assistant that autocompletes functions.",
    "Researchers publish a paper on a new neural network architecture.",
];
const NEGATIVE_EXEMPLARS: &[&str] = &[
    "A car manufacturer announces a new electric vehicle lineup.",
    "Cryptocurrency prices surge after a regulatory announcement.",
    "A phone maker ships an operating system update with battery fixes.",
];

const NEGATIVE_ALPHA: f64 = 0.5;

#[derive(Deserialize)]
struct KeywordEntry {
    term: String,
    weight: f64,
}

#[derive(Deserialize)]
struct KeywordTable {
    keywords: Vec<KeywordEntry>,
    early_reject_patterns: Vec<String>,
}

fn keyword_table() -> &'static KeywordTable {
    static TABLE: std::sync::OnceLock<KeywordTable> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| serde_json::from_str(KEYWORDS_JSON).expect("bundled relevance_keywords.json is valid"))
}

/// An optional embedding backend the semantic score activates against
/// (spec §4.2: "optional, activated when an embedding client is available").
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, eyre::Error>;
}

fn keyword_score(text: &str) -> f64 {
    let table = keyword_table();
    let lowercase = text.to_lowercase();

    for pattern in &table.early_reject_patterns {
        if lowercase.contains(pattern.as_str()) {
            return 0.03 + 0.02 * (pattern.len() % 2) as f64;
        }
    }

    let mut score = 0.0;
    let mut matched = 0;
    for entry in &table.keywords {
        if lowercase.contains(entry.term.as_str()) {
            score += entry.weight;
            matched += 1;
        }
    }

    if matched == 0 {
        0.0
    } else {
        (score / matched as f64).min(1.0)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)) as f64
    }
}

fn avg_top3(mut sims: Vec<f64>) -> f64 {
    sims.sort_by(|a, b| b.partial_cmp(a).unwrap());
    sims.truncate(3);
    if sims.is_empty() {
        0.0
    } else {
        sims.iter().sum::<f64>() / sims.len() as f64
    }
}

async fn semantic_score(
    embedder: &dyn EmbeddingClient,
    item_text: &str,
) -> Result<f64, eyre::Error> {
    let mut batch: Vec<String> = vec![item_text.to_string()];
    batch.extend(POSITIVE_EXEMPLARS.iter().map(|s| s.to_string()));
    batch.extend(NEGATIVE_EXEMPLARS.iter().map(|s| s.to_string()));

    let vectors = embedder.embed(&batch).await?;
    let item_vec = &vectors[0];
    let pos_sims: Vec<f64> = vectors[1..1 + POSITIVE_EXEMPLARS.len()]
        .iter()
        .map(|v| cosine(item_vec, v))
        .collect();
    let neg_sims: Vec<f64> = vectors[1 + POSITIVE_EXEMPLARS.len()..]
        .iter()
        .map(|v| cosine(item_vec, v))
        .collect();

    let score = avg_top3(pos_sims) - NEGATIVE_ALPHA * avg_top3(neg_sims);
    Ok(score.max(0.0))
}

/// Score every item, then apply the dynamic-threshold policy.
#[tracing::instrument(skip(config, items, embedder))]
pub async fn filter(
    config: &PipelineConfig,
    items: Vec<RawItem>,
    embedder: Option<&dyn EmbeddingClient>,
) -> Result<(Vec<ScoredItem>, Vec<crate::model::LogEntry>), eyre::Error> {
    let mut log = Vec::new();
    let mut scored = Vec::with_capacity(items.len());

    for item in items {
        let text = format!("{} {}", item.title, item.body);
        let kw = keyword_score(&text);

        let (combined, matched_keywords) = if let Some(embedder) = embedder {
            match semantic_score(embedder, &text).await {
                Ok(sem) => (0.7 * kw + 0.3 * sem, matched_terms(&text)),
                Err(err) => {
                    tracing::warn!(?err, "semantic scoring failed, falling back to keyword-only");
                    (0.7 * kw, matched_terms(&text))
                }
            }
        } else {
            (0.7 * kw, matched_terms(&text))
        };

        scored.push(ScoredItem {
            item,
            ai_relevance: combined.clamp(0.0, 1.0),
            matched_keywords,
            filter_reason: String::new(),
        });
    }

    let mut threshold = config.relevance_base_threshold;
    let mut accepted: Vec<ScoredItem> = scored
        .iter()
        .filter(|s| s.ai_relevance >= threshold)
        .cloned()
        .collect();

    while accepted.len() < config.relevance_min_target_count && threshold > config.relevance_min_threshold {
        threshold -= 0.02;
        accepted = scored
            .iter()
            .filter(|s| s.ai_relevance >= threshold)
            .cloned()
            .collect();
    }

    if accepted.len() < config.relevance_min_target_count {
        let mut by_score = scored.clone();
        by_score.sort_by(|a, b| b.ai_relevance.partial_cmp(&a.ai_relevance).unwrap());
        accepted = by_score
            .into_iter()
            .take(config.relevance_min_target_count.min(scored.len()))
            .collect();
        log.push(crate::model::LogEntry {
            stage: "relevance",
            level: crate::model::LogLevel::Warn,
            message: format!(
                "threshold floor reached, backfilled to {} items by score",
                accepted.len()
            ),
            at: chrono::Utc::now(),
        });
    }

    for item in &mut accepted {
        item.filter_reason = format!("combined score {:.3} at threshold {:.3}", item.ai_relevance, threshold);
    }

    accepted.sort_by(|a, b| b.ai_relevance.partial_cmp(&a.ai_relevance).unwrap());
    accepted.truncate(config.relevance_max_pool);

    Ok((accepted, log))
}

fn matched_terms(text: &str) -> Vec<String> {
    let lowercase = text.to_lowercase();
    keyword_table()
        .keywords
        .iter()
        .filter(|e| lowercase.contains(e.term.as_str()))
        .map(|e| e.term.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_score_recognizes_ai_terms() {
        let score = keyword_score("OpenAI released a new large language model today");
        assert!(score > 0.5);
    }

    #[test]
    fn early_reject_pattern_forces_low_score() {
        let score = keyword_score("The new electric vehicle lineup was unveiled today");
        assert!(score < 0.1);
    }

    #[test]
    fn unrelated_text_scores_zero() {
        assert_eq!(keyword_score("A local bakery opened downtown"), 0.0);
    }

    #[tokio::test]
    async fn filter_backfills_when_pool_is_thin() {
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "test");
        }
        let cli = crate::config::CliArgs {
            max_items: 30,
            edition: "daily".to_string(),
            output_dir: "drafts".into(),
            dry_run: true,
            embedding_model: "AllMiniLML12V2".to_string(),
            embedding_dimensions: 384,
            sources_file: "sources.json".into(),
        };
        let config = PipelineConfig::new_from_env(&cli).unwrap();
        let items = vec![RawItem {
            id: "1".to_string(),
            source_id: "s".to_string(),
            source_kind: crate::model::SourceKind::Feed,
            title: "A local bakery opened downtown".to_string(),
            body: String::new(),
            url: "https://example.com/1".to_string(),
            published_at: chrono::Utc::now(),
            fetched_at: chrono::Utc::now(),
        }];
        let (accepted, log) = filter(&config, items, None).await.unwrap();
        assert_eq!(accepted.len(), 1);
        assert!(!log.is_empty());
    }
}

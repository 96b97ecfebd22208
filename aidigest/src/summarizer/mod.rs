//! S3 — Summarizer (spec §4.3). One router call per item, a lightweight
//! quality-gated retry, and a degenerate fallback on total provider failure,
//! bounded by a semaphore the way `recommendation::crawler::run_crawl`
//! bounds its own fan-out.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::StreamExt;
use tokio::sync::Semaphore;

use crate::config::PipelineConfig;
use crate::llm::LlmRouter;
use crate::model::{ScoredItem, Summary, SourceReliability, SummarizedItem};
use crate::validation::{self, TextKind};

const QUALITY_GATE: f64 = 0.4;

/// Summarize every accepted item concurrently, bounded by
/// `summarizer_concurrency` (spec §4.3 "Concurrency").
#[tracing::instrument(skip(router, config, items))]
pub async fn summarize_all(
    router: &LlmRouter,
    config: &PipelineConfig,
    items: Vec<ScoredItem>,
) -> Vec<SummarizedItem> {
    let semaphore = Arc::new(Semaphore::new(config.summarizer_concurrency));

    futures::stream::iter(items)
        .map(|item| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                summarize_one(router, item).await
            }
        })
        .buffer_unordered(config.summarizer_concurrency)
        .collect()
        .await
}

async fn summarize_one(router: &LlmRouter, scored: ScoredItem) -> SummarizedItem {
    let start = Instant::now();
    let title = scored.item.title.clone();
    let body = scored.item.body.clone();
    let url = scored.item.url.clone();
    let source = scored.item.source_id.clone();

    let first = router.summarize(&title, &body, &url, &source).await;

    let (summary, retry_count) = match first {
        Ok((summary, _provider)) if quality_score(&summary) >= QUALITY_GATE => (summary, 0),
        Ok((first_summary, _)) => match router.summarize(&title, &body, &url, &source).await {
            Ok((second_summary, _)) => {
                if quality_score(&second_summary) >= quality_score(&first_summary) {
                    (second_summary, 1)
                } else {
                    (first_summary, 1)
                }
            }
            Err(_) => (first_summary, 1),
        },
        Err(err) => {
            tracing::warn!(item_id = scored.item.id, ?err, "all providers failed, synthesizing degenerate summary");
            (degenerate_summary(&scored), 0)
        }
    };

    SummarizedItem {
        scored,
        summary,
        processing_duration_ms: start.elapsed().as_millis() as u64,
        retry_count,
    }
}

fn quality_score(summary: &Summary) -> f64 {
    validation::validate_bullet_set(&summary.bullets).score.min(
        summary
            .bullets
            .iter()
            .map(|b| validation::validate_text(b, TextKind::SummaryBullet, false).score)
            .fold(1.0, f64::min),
    )
}

/// Degenerate fallback summary on total provider failure (spec §4.3): first
/// bullet is the title, second is a body prefix, third is a failure notice.
fn degenerate_summary(scored: &ScoredItem) -> Summary {
    let body_prefix: String = scored.item.body.chars().take(140).collect();
    let bullets = vec![
        validation::ensure_terminal_form(&scored.item.title),
        validation::ensure_terminal_form(if body_prefix.is_empty() {
            "No further detail was available from the source"
        } else {
            body_prefix.as_str()
        }),
        "Automated summarization was unavailable for this item.".to_string(),
    ];

    Summary {
        bullets,
        confidence: 0.0,
        source_reliability: SourceReliability::Low,
        producing_model: "none".to_string(),
        fallback_used: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawItem, SourceKind};

    fn sample_item() -> ScoredItem {
        ScoredItem {
            item: RawItem {
                id: "1".to_string(),
                source_id: "s".to_string(),
                source_kind: SourceKind::Feed,
                title: "A model shipped today".to_string(),
                body: "Full body text describing the release in some detail.".to_string(),
                url: "https://example.com/1".to_string(),
                published_at: chrono::Utc::now(),
                fetched_at: chrono::Utc::now(),
            },
            ai_relevance: 0.9,
            matched_keywords: vec!["model".to_string()],
            filter_reason: String::new(),
        }
    }

    #[test]
    fn degenerate_summary_has_three_bullets_and_zero_confidence() {
        let summary = degenerate_summary(&sample_item());
        assert_eq!(summary.bullets.len(), 3);
        assert_eq!(summary.confidence, 0.0);
        assert!(summary.fallback_used);
    }
}

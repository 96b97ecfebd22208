//! S4 Phase B — context (follow-up) analysis (spec §4.4). Embeds each
//! consolidated item, queries the historical index for near neighbors, and
//! asks the LLM router to adjudicate KEEP/UPDATE/RELATED for each candidate.
//! Concurrency follows spec §5's adaptive cap: `min(cap, ceil(N/4))`.

use std::sync::Arc;

use futures::stream::StreamExt;
use tokio::sync::Semaphore;

use crate::config::PipelineConfig;
use crate::dedup::ConsolidatedGroup;
use crate::history::{HistoricalIndex, HistoricalMatch};
use crate::llm::LlmRouter;
use crate::model::{
    ConsolidatedSibling, ContextDecision, ContextVerdict, HistoricalRecord, ProcessedArticle, RelationshipKind,
    RelationshipRecord, SummarizedItem,
};
use crate::relevance::EmbeddingClient;

/// Run Phase B over every consolidated group's representative, producing
/// one [`ProcessedArticle`] per group plus any relationship records written
/// along the way.
#[tracing::instrument(skip(config, router, embedder, index, groups))]
pub async fn analyze(
    config: &PipelineConfig,
    router: &LlmRouter,
    embedder: &dyn EmbeddingClient,
    index: &dyn HistoricalIndex,
    mut groups: Vec<ConsolidatedGroup>,
) -> (Vec<ProcessedArticle>, Vec<RelationshipRecord>) {
    for group in &mut groups {
        crate::dedup::enhance_representative(config, group);
    }

    let n = groups.len().max(1);
    let adaptive_cap = (n.div_ceil(4)).clamp(2, config.max_concurrent_llm);
    let semaphore = Arc::new(Semaphore::new(adaptive_cap));

    let results: Vec<(ProcessedArticle, Vec<RelationshipRecord>)> = futures::stream::iter(groups)
        .map(|group| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                analyze_one(config, router, embedder, index, group).await
            }
        })
        .buffer_unordered(adaptive_cap)
        .collect()
        .await;

    let mut articles = Vec::with_capacity(results.len());
    let mut relationships = Vec::new();
    for (article, rels) in results {
        articles.push(article);
        relationships.extend(rels);
    }
    (articles, relationships)
}

async fn analyze_one(
    config: &PipelineConfig,
    router: &LlmRouter,
    embedder: &dyn EmbeddingClient,
    index: &dyn HistoricalIndex,
    group: ConsolidatedGroup,
) -> (ProcessedArticle, Vec<RelationshipRecord>) {
    let rep_idx = group.representative_idx;
    let cross_source_upgrade = group.cross_source_upgrade;
    let consolidated_siblings: Vec<ConsolidatedSibling> = group
        .items
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != rep_idx)
        .map(|(_, item)| ConsolidatedSibling {
            source_id: item.scored.item.source_id.clone(),
            url: item.scored.item.url.clone(),
            title: item.scored.item.title.clone(),
            body: item.summary.bullets.join(" "),
        })
        .collect();

    let mut items = group.items;
    let representative = items.remove(rep_idx);

    let verdict_text = format!("{} {}", representative.scored.item.title, representative.summary.bullets.join(" "));

    let embedding = crate::embedding::embed_one(embedder, &verdict_text).await;

    let mut relationships = Vec::new();
    let mut context_verdict = None;
    let mut is_update = cross_source_upgrade;
    let mut final_summary = representative.summary.clone();

    if let Ok(vector) = embedding {
        match index.search(&vector, 3).await {
            Ok(matches) if !matches.is_empty() => {
                let candidates: Vec<(String, String)> = matches
                    .iter()
                    .filter(|m| m.cosine >= config.context_similarity_threshold)
                    .map(|m| (m.record.item_id.clone(), format!("{} — {}", m.record.title, m.record.summary_text)))
                    .collect();

                if candidates.is_empty() {
                    context_verdict = None;
                } else {
                    match adjudicate(router, &representative, &candidates, &matches).await {
                        Some(verdict) => {
                            match verdict.decision {
                                ContextDecision::Update => {
                                    is_update = true;
                                    if let Some(best) = matches.iter().max_by(|a, b| a.cosine.partial_cmp(&b.cosine).unwrap()) {
                                        if let Some(updated) = resummarize_contextual(router, &representative, best).await {
                                            final_summary = updated;
                                        }
                                        relationships.push(RelationshipRecord {
                                            parent_item_id: best.record.item_id.clone(),
                                            child_item_id: representative.scored.item.id.clone(),
                                            kind: RelationshipKind::Update,
                                            similarity: best.cosine,
                                            reasoning: verdict.reasoning.clone(),
                                        });
                                    }
                                }
                                ContextDecision::Keep => {
                                    if let Some(best) = matches.first() {
                                        relationships.push(RelationshipRecord {
                                            parent_item_id: best.record.item_id.clone(),
                                            child_item_id: representative.scored.item.id.clone(),
                                            kind: RelationshipKind::Related,
                                            similarity: best.cosine,
                                            reasoning: verdict.reasoning.clone(),
                                        });
                                    }
                                }
                                ContextDecision::Skip => {}
                            }
                            context_verdict = Some(verdict);
                        }
                        None => context_verdict = None,
                    }
                }
            }
            _ => {}
        }

        let historical_record = HistoricalRecord {
            item_id: representative.scored.item.id.clone(),
            title: representative.scored.item.title.clone(),
            summary_text: final_summary.bullets.join(" "),
            published_at: representative.scored.item.published_at,
            source_id: representative.scored.item.source_id.clone(),
            ai_relevance: representative.scored.ai_relevance,
            embedding: None,
            display_title: None,
            is_update,
            topic_cluster: None,
        };

        if let Err(err) = index.append(historical_record, vector).await {
            tracing::warn!(?err, "failed to append historical record");
        }
    } else {
        tracing::warn!(item_id = representative.scored.item.id, "embedding failed, context analysis skipped");
    }

    let duplicate = crate::model::DuplicateVerdict {
        is_duplicate: false,
        method: crate::model::DuplicateMethod::FastScreening,
        similarity: 0.0,
        duplicate_of_id: None,
    };

    let article = ProcessedArticle {
        summarized: SummarizedItem {
            summary: final_summary,
            ..representative
        },
        duplicate,
        context: context_verdict,
        display_title: String::new(),
        citations: Vec::new(),
        is_update,
        cluster_id: None,
        consolidated_siblings,
    };

    (article, relationships)
}

async fn adjudicate(
    router: &LlmRouter,
    representative: &SummarizedItem,
    candidates: &[(String, String)],
    matches: &[HistoricalMatch],
) -> Option<ContextVerdict> {
    let prompt = crate::prompts::context_adjudication_prompt(
        &representative.scored.item.title,
        &representative.summary.bullets.join(" "),
        candidates,
    );

    let raw = router.generate_text(&prompt).await.ok().flatten()?;
    let decision = if raw.to_lowercase().contains("update") {
        ContextDecision::Update
    } else if raw.to_lowercase().contains("related") {
        ContextDecision::Keep
    } else {
        ContextDecision::Skip
    };

    let similarity = matches.iter().map(|m| m.cosine).fold(0.0, f64::max);
    Some(ContextVerdict {
        decision,
        references: candidates.iter().map(|(id, _)| id.clone()).collect(),
        similarity,
        reasoning: raw,
    })
}

async fn resummarize_contextual(
    router: &LlmRouter,
    representative: &SummarizedItem,
    best: &HistoricalMatch,
) -> Option<crate::model::Summary> {
    let prompt = crate::prompts::contextual_resummarize_prompt(
        &representative.scored.item.title,
        &representative.summary.bullets,
        &best.record.title,
        &[best.record.summary_text.clone()],
    );

    let raw = router.generate_text(&prompt).await.ok().flatten()?;
    let summary = crate::llm::parse_summary_response(&raw, "context")?;
    if (3..=4).contains(&summary.bullets.len())
        && summary.bullets.iter().all(|b| (100..=250).contains(&b.chars().count()))
    {
        Some(summary)
    } else {
        None
    }
}

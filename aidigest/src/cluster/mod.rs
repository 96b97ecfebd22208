//! S5 — Topic clusterer (spec §4.5). No clustering crate exists anywhere in
//! the reference stack, so the density-based pass and its KMeans fallback
//! are hand-rolled here, translating `original_source`'s
//! `topic_clustering.py` (`hdbscan.HDBSCAN` / `sklearn.cluster.KMeans`) into
//! plain similarity-graph and Lloyd's-iteration code rather than pulling in
//! an unrelated dependency.

mod domain_tags;

use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::model::{ProcessedArticle, TopicCluster};
use crate::relevance::EmbeddingClient;

pub use domain_tags::{classify_domain_tags, mutually_exclusive};

const GENERIC_LABEL_DENYLIST: &[&str] = &["ai news", "technology update", "tech news", "ai update", "news roundup"];

struct Candidate {
    member_idx: Vec<usize>,
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

/// Density-based clustering: connect points whose cosine similarity is at
/// least `epsilon_similarity`, then take connected components (spec §4.5
/// step 2's `cluster_selection_epsilon` translated to a similarity floor).
fn density_cluster(vectors: &[Vec<f32>], min_size: usize, epsilon_similarity: f64) -> Vec<Candidate> {
    let n = vectors.len();
    let mut visited = vec![false; n];
    let mut candidates = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut stack = vec![start];
        let mut members = Vec::new();
        visited[start] = true;

        while let Some(i) = stack.pop() {
            members.push(i);
            for j in 0..n {
                if !visited[j] && cosine(&vectors[i], &vectors[j]) >= epsilon_similarity {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }

        if members.len() >= min_size {
            candidates.push(Candidate { member_idx: members });
        }
    }

    candidates
}

/// KMeans fallback (Lloyd's algorithm, fixed iteration count) when density
/// clustering finds nothing (spec §4.5 step 2's fallback).
fn kmeans_cluster(vectors: &[Vec<f32>], k: usize) -> Vec<Candidate> {
    if k == 0 || vectors.is_empty() {
        return Vec::new();
    }
    let dim = vectors[0].len();
    let mut centroids: Vec<Vec<f32>> = (0..k).map(|i| vectors[i * vectors.len() / k].clone()).collect();
    let mut assignment = vec![0usize; vectors.len()];

    for _ in 0..25 {
        for (i, v) in vectors.iter().enumerate() {
            assignment[i] = centroids
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| cosine(v, a).partial_cmp(&cosine(v, b)).unwrap())
                .map(|(idx, _)| idx)
                .unwrap_or(0);
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f32>> = vectors
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(v, _)| v)
                .collect();
            if members.is_empty() {
                continue;
            }
            let mut sum = vec![0f32; dim];
            for m in &members {
                for (s, x) in sum.iter_mut().zip(m.iter()) {
                    *s += x;
                }
            }
            *centroid = sum.iter().map(|x| x / members.len() as f32).collect();
        }
    }

    (0..k)
        .map(|c| Candidate {
            member_idx: assignment.iter().enumerate().filter(|(_, a)| **a == c).map(|(i, _)| i).collect(),
        })
        .filter(|cand| !cand.member_idx.is_empty())
        .collect()
}

fn mean_pairwise_coherence(vectors: &[Vec<f32>], members: &[usize]) -> f64 {
    if members.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut count = 0;
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            total += cosine(&vectors[members[i]], &vectors[members[j]]);
            count += 1;
        }
    }
    if count == 0 { 1.0 } else { total / count as f64 }
}

fn per_member_mean_similarity(vectors: &[Vec<f32>], members: &[usize], idx: usize) -> f64 {
    let others: Vec<usize> = members.iter().copied().filter(|&m| m != idx).collect();
    if others.is_empty() {
        return 1.0;
    }
    others.iter().map(|&o| cosine(&vectors[idx], &vectors[o])).sum::<f64>() / others.len() as f64
}

/// Domain-coherence guard (spec §4.5 step 4): reject a cluster if any two
/// members fall into a mutually-exclusive domain-tag pair.
fn passes_domain_guard(articles: &[&ProcessedArticle], members: &[usize]) -> bool {
    let tags: Vec<Vec<&'static str>> = members
        .iter()
        .map(|&i| classify_domain_tags(&format!("{} {}", articles[i].summarized.scored.item.title, articles[i].summarized.scored.item.body)))
        .collect();

    for i in 0..tags.len() {
        for j in (i + 1)..tags.len() {
            for &ta in &tags[i] {
                for &tb in &tags[j] {
                    if mutually_exclusive(ta, tb) {
                        return false;
                    }
                }
            }
        }
    }
    true
}

fn source_priority_score(article: &ProcessedArticle) -> f64 {
    let domain = url::Url::parse(article.summarized.scored.item.url.as_str())
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default();
    if crate::dedup::is_official(&domain) {
        0.15
    } else if crate::dedup::is_reputable(&domain) {
        0.08
    } else {
        0.0
    }
}

fn representative_idx(articles: &[&ProcessedArticle], members: &[usize]) -> usize {
    let mut source_counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for &i in members {
        *source_counts.entry(articles[i].summarized.scored.item.source_id.as_str()).or_insert(0) += 1;
    }
    let majority_source = source_counts.iter().max_by_key(|(_, count)| **count).map(|(source, _)| *source);

    // Spec §4.5 step 6's source-diversity preference: a candidate from a
    // source other than the cluster's majority source is slightly preferred,
    // so the representative doesn't always come from whichever source
    // happened to contribute the most siblings.
    let diversity_bonus = |idx: usize| -> f64 {
        let source = articles[idx].summarized.scored.item.source_id.as_str();
        if source_counts.len() >= 2 && Some(source) != majority_source {
            0.1
        } else {
            0.0
        }
    };

    members
        .iter()
        .copied()
        .max_by(|&a, &b| {
            let score_a = articles[a].summarized.scored.ai_relevance + articles[a].summarized.summary.confidence
                + source_priority_score(articles[a])
                + diversity_bonus(a);
            let score_b = articles[b].summarized.scored.ai_relevance + articles[b].summarized.summary.confidence
                + source_priority_score(articles[b])
                + diversity_bonus(b);
            score_a.partial_cmp(&score_b).unwrap()
        })
        .unwrap_or(members[0])
}

async fn name_cluster(router: &crate::llm::LlmRouter, articles: &[&ProcessedArticle], members: &[usize]) -> String {
    let titles: Vec<String> = members.iter().map(|&i| articles[i].summarized.scored.item.title.clone()).collect();
    let prompt = crate::prompts::cluster_name_prompt(&titles);

    if let Ok(Some(name)) = router.generate_text(&prompt).await {
        let normalized = name.trim().to_lowercase();
        if !GENERIC_LABEL_DENYLIST.iter().any(|g| normalized == *g) && !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    fallback_label(&titles)
}

fn fallback_label(titles: &[String]) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for title in titles {
        for word in title.split_whitespace() {
            if word.chars().next().is_some_and(|c| c.is_uppercase()) && word.len() > 2 {
                *counts.entry(word.trim_matches(|c: char| !c.is_alphanumeric()).to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, c)| *c)
        .map(|(word, _)| word)
        .unwrap_or_else(|| "AI Industry Roundup".to_string())
}

/// Run S5 over up to ~30 context-processed articles, returning topic
/// clusters in importance order (spec §4.5's "Multi-source priority mode").
#[tracing::instrument(skip(config, router, embedder, articles))]
pub async fn cluster(
    config: &PipelineConfig,
    router: &crate::llm::LlmRouter,
    embedder: &dyn EmbeddingClient,
    articles: &[ProcessedArticle],
) -> Vec<TopicCluster> {
    if articles.is_empty() {
        return Vec::new();
    }

    let texts: Vec<String> = articles
        .iter()
        .map(|a| format!("{} {}", a.summarized.scored.item.title, a.summarized.summary.bullets.join(" ")))
        .collect();

    let vectors = match embedder.embed(&texts).await {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(?err, "clustering embedding failed, skipping clustering");
            return Vec::new();
        }
    };

    let epsilon_similarity = config.coherence_threshold.min(1.0 - 0.25);
    let mut candidates = density_cluster(&vectors, config.min_cluster_size, epsilon_similarity);

    if candidates.is_empty() {
        let k = config.max_clusters.min((articles.len() / config.min_cluster_size.max(1)).max(2));
        candidates = kmeans_cluster(&vectors, k);
    }

    let article_refs: Vec<&ProcessedArticle> = articles.iter().collect();
    let mut clusters = Vec::new();

    for candidate in candidates {
        if !passes_domain_guard(&article_refs, &candidate.member_idx) {
            continue;
        }

        let retained: Vec<usize> = candidate
            .member_idx
            .iter()
            .copied()
            .filter(|&i| per_member_mean_similarity(&vectors, &candidate.member_idx, i) >= 0.8 * config.coherence_threshold)
            .collect();

        if retained.len() < config.min_cluster_size {
            continue;
        }
        if !passes_domain_guard(&article_refs, &retained) {
            continue;
        }
        let coherence = mean_pairwise_coherence(&vectors, &retained);
        if coherence < config.coherence_threshold {
            continue;
        }

        let rep_idx = representative_idx(&article_refs, &retained);
        let topic_name = name_cluster(router, &article_refs, &retained).await;

        let sibling_ids: Vec<String> = retained
            .iter()
            .copied()
            .filter(|&i| i != rep_idx)
            .map(|i| articles[i].id().to_string())
            .collect();

        clusters.push((
            TopicCluster {
                cluster_id: uuid::Uuid::new_v4().to_string(),
                representative_id: articles[rep_idx].id().to_string(),
                sibling_ids,
                confidence: coherence,
                topic_name,
            },
            retained,
        ));
    }

    order_by_importance(config, &article_refs, clusters)
}

/// Importance = 0.4·source_diversity + 0.2·article_count_score +
/// 0.2·coherence + 0.2·avg_relevance + a premium-source quality bonus
/// (spec §4.5 "Multi-source priority mode").
fn order_by_importance(
    config: &PipelineConfig,
    articles: &[&ProcessedArticle],
    mut clusters: Vec<(TopicCluster, Vec<usize>)>,
) -> Vec<TopicCluster> {
    clusters.sort_by(|(a, a_members), (b, b_members)| {
        importance(config, articles, a, a_members)
            .partial_cmp(&importance(config, articles, b, b_members))
            .unwrap()
            .reverse()
    });
    clusters.into_iter().map(|(c, _)| c).collect()
}

fn importance(config: &PipelineConfig, articles: &[&ProcessedArticle], cluster: &TopicCluster, members: &[usize]) -> f64 {
    let source_diversity = members
        .iter()
        .map(|&i| articles[i].summarized.scored.item.source_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len() as f64
        / members.len().max(1) as f64;

    let article_count_score = (members.len() as f64 / config.target_article_max as f64).min(1.0);
    let avg_relevance = members.iter().map(|&i| articles[i].summarized.scored.ai_relevance).sum::<f64>() / members.len().max(1) as f64;
    let quality_bonus = members.iter().map(|&i| source_priority_score(articles[i])).fold(0.0, f64::max);

    0.4 * source_diversity + 0.2 * article_count_score + 0.2 * cluster.confidence + 0.2 * avg_relevance + quality_bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_cluster_groups_near_identical_vectors() {
        let vectors = vec![vec![1.0, 0.0], vec![0.99, 0.01], vec![0.0, 1.0]];
        let candidates = density_cluster(&vectors, 2, 0.9);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].member_idx.len(), 2);
    }

    #[test]
    fn fallback_label_picks_most_common_proper_noun() {
        let titles = vec!["OpenAI ships GPT-5".to_string(), "OpenAI announces pricing".to_string()];
        assert_eq!(fallback_label(&titles), "OpenAI");
    }
}

//! S4 Phase A — consolidation (spec §4.4). Sequential single-linkage
//! grouping over comparison text, grounded on `original_source`'s
//! `duplicate_checker.py` (Jaccard + `SequenceMatcher` weighted blend,
//! carried here as `strsim::jaccard`/`strsim::normalized_levenshtein`).

use std::collections::HashSet;

use chrono::Utc;

use crate::config::PipelineConfig;
use crate::model::{DuplicateMethod, DuplicateVerdict, SummarizedItem};

/// Stop-word list carried verbatim from `duplicate_checker.py`'s
/// `_normalize_text`.
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "can", "this", "that", "these", "those",
];

/// Reputable domains earning the cross-source bonus (spec §4.4's
/// "cross-reputable-source bonus"), grounded on `mappings.py`'s
/// `REPUTABLE_DOMAINS`.
const REPUTABLE_DOMAINS: &[&str] = &[
    "techcrunch.com",
    "theverge.com",
    "wired.com",
    "venturebeat.com",
    "arstechnica.com",
    "engadget.com",
    "zdnet.com",
    "cnet.com",
];

/// Curated source-priority bonus used in representative scoring, grounded
/// on `mappings.py`'s `OFFICIAL_DOMAINS` (official company sources outrank
/// aggregated coverage).
const OFFICIAL_DOMAINS: &[&str] = &[
    "openai.com",
    "google.com",
    "meta.com",
    "anthropic.com",
    "microsoft.com",
    "apple.com",
    "amazon.com",
    "nvidia.com",
];

const WEIGHT_TITLE: f64 = 0.40;
const WEIGHT_CONTENT: f64 = 0.35;
const WEIGHT_EXCERPT: f64 = 0.20;
const WEIGHT_SOURCE_BONUS: f64 = 0.05;
const EXCERPT_LEN: usize = 500;

/// A group of [`SummarizedItem`]s deemed duplicates, with the chosen
/// representative's index into `group`.
pub struct ConsolidatedGroup {
    pub items: Vec<SummarizedItem>,
    pub representative_idx: usize,
    /// Set by [`enhance_representative`] when a sibling's source differs
    /// from the representative's — the trigger for S7's upgrade-marker
    /// application (spec §4.4/§4.7; the marker itself is applied exactly
    /// once, in S7, regardless of which trigger fired it).
    pub cross_source_upgrade: bool,
}

fn normalize_comparison_text(title: &str, body: &str) -> String {
    let lower = format!("{title} {body}").to_lowercase();
    let stripped: String = lower
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    stripped
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default()
}

pub fn is_reputable(domain: &str) -> bool {
    REPUTABLE_DOMAINS.iter().any(|d| domain.ends_with(d))
}

pub fn is_official(domain: &str) -> bool {
    OFFICIAL_DOMAINS.iter().any(|d| domain.ends_with(d))
}

/// Weighted similarity combining title/content Jaccard+sequence maxima, a
/// body-prefix sequence score, and the cross-reputable-source bonus (spec
/// §4.4 "Phase A — consolidation").
fn weighted_similarity(a: &SummarizedItem, b: &SummarizedItem) -> f64 {
    let title_a = normalize_comparison_text(&a.scored.item.title, "");
    let title_b = normalize_comparison_text(&b.scored.item.title, "");
    let title_sim = strsim::jaccard(&title_a, &title_b).max(strsim::normalized_levenshtein(&title_a, &title_b));

    let text_a = normalize_comparison_text(&a.scored.item.title, &a.scored.item.body);
    let text_b = normalize_comparison_text(&b.scored.item.title, &b.scored.item.body);
    let content_sim = strsim::jaccard(&text_a, &text_b).max(strsim::normalized_levenshtein(&text_a, &text_b));

    let excerpt_a: String = a.scored.item.body.chars().take(EXCERPT_LEN).collect();
    let excerpt_b: String = b.scored.item.body.chars().take(EXCERPT_LEN).collect();
    let excerpt_sim = strsim::normalized_levenshtein(&excerpt_a, &excerpt_b);

    let domain_a = domain_of(&a.scored.item.url);
    let domain_b = domain_of(&b.scored.item.url);
    let source_bonus = if domain_a != domain_b && is_reputable(&domain_a) && is_reputable(&domain_b) {
        WEIGHT_SOURCE_BONUS * 2.0
    } else {
        0.0
    };

    (title_sim * WEIGHT_TITLE + content_sim * WEIGHT_CONTENT + excerpt_sim * WEIGHT_EXCERPT + source_bonus).min(1.0)
}

/// Single-linkage grouping over `items` in order, matching spec §5's
/// "Phase A must be sequential... order matters for single-linkage".
#[tracing::instrument(skip(config, items))]
pub fn consolidate(config: &PipelineConfig, items: Vec<SummarizedItem>) -> Vec<ConsolidatedGroup> {
    let threshold = config.consolidation_threshold;
    let mut groups: Vec<Vec<SummarizedItem>> = Vec::new();

    'outer: for item in items {
        for group in &mut groups {
            if group.iter().any(|existing| weighted_similarity(existing, &item) >= threshold) {
                group.push(item);
                continue 'outer;
            }
        }
        groups.push(vec![item]);
    }

    groups
        .into_iter()
        .map(|items| {
            let representative_idx = select_representative(&items);
            ConsolidatedGroup { items, representative_idx, cross_source_upgrade: false }
        })
        .collect()
}

fn content_length_bonus(item: &SummarizedItem) -> f64 {
    (item.scored.item.body.chars().count() as f64 / 2000.0).min(0.1)
}

fn recency_bonus(item: &SummarizedItem) -> f64 {
    let age_days = (Utc::now() - item.scored.item.published_at).num_hours() as f64 / 24.0;
    (1.0 - age_days / 10.0).clamp(0.0, 1.0) * 0.1
}

fn source_priority_bonus(item: &SummarizedItem) -> f64 {
    let domain = domain_of(&item.scored.item.url);
    if is_official(&domain) {
        0.15
    } else if is_reputable(&domain) {
        0.08
    } else {
        0.0
    }
}

fn representative_score(item: &SummarizedItem) -> f64 {
    item.scored.ai_relevance
        + item.summary.confidence
        + source_priority_bonus(item)
        + content_length_bonus(item)
        + recency_bonus(item)
}

fn select_representative(items: &[SummarizedItem]) -> usize {
    items
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| representative_score(a).partial_cmp(&representative_score(b)).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Enhance the representative's summary with a source-attribution note and
/// flag the group for S7's upgrade-marker application if any sibling's
/// source differs from the representative's (spec §4.4/§4.7; marker text
/// itself is chosen and applied once, in S7, not here).
pub fn enhance_representative(_config: &PipelineConfig, group: &mut ConsolidatedGroup) {
    let rep_idx = group.representative_idx;
    let rep_source = group.items[rep_idx].scored.item.source_id.clone();

    let sibling_sources: HashSet<String> = group
        .items
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != rep_idx)
        .map(|(_, item)| item.scored.item.source_id.clone())
        .filter(|s| *s != rep_source)
        .collect();

    if sibling_sources.is_empty() {
        return;
    }

    group.cross_source_upgrade = true;
    let mut names: Vec<&str> = sibling_sources.iter().map(String::as_str).collect();
    names.sort_unstable();
    let note = format!(" Also covered by {}.", names.join(", "));

    let rep = &mut group.items[rep_idx];
    if let Some(last) = rep.summary.bullets.last_mut() {
        if !last.contains("Also covered by") {
            *last = format!("{} {note}", last.trim_end_matches('.').trim_end());
            *last = crate::validation::ensure_terminal_form(last);
        }
    }
}

/// Duplicate verdict for each non-representative member (for processing-log
/// purposes) and a pass-through verdict for representatives.
pub fn duplicate_verdict_for(group: &ConsolidatedGroup, idx: usize) -> DuplicateVerdict {
    if idx == group.representative_idx {
        DuplicateVerdict {
            is_duplicate: false,
            method: DuplicateMethod::FastScreening,
            similarity: 0.0,
            duplicate_of_id: None,
        }
    } else {
        let similarity = weighted_similarity(&group.items[group.representative_idx], &group.items[idx]);
        DuplicateVerdict {
            is_duplicate: true,
            method: DuplicateMethod::FastScreening,
            similarity,
            duplicate_of_id: Some(group.items[group.representative_idx].scored.item.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawItem, ScoredItem, Summary, SourceKind, SourceReliability};

    fn item(id: &str, title: &str, body: &str, source: &str) -> SummarizedItem {
        SummarizedItem {
            scored: ScoredItem {
                item: RawItem {
                    id: id.to_string(),
                    source_id: source.to_string(),
                    source_kind: SourceKind::Feed,
                    title: title.to_string(),
                    body: body.to_string(),
                    url: format!("https://{source}.example.com/{id}"),
                    published_at: Utc::now(),
                    fetched_at: Utc::now(),
                },
                ai_relevance: 0.8,
                matched_keywords: Vec::new(),
                filter_reason: String::new(),
            },
            summary: Summary {
                bullets: vec!["First point about the launch.".to_string(), "Second point.".to_string(), "Third point.".to_string()],
                confidence: 0.7,
                source_reliability: SourceReliability::Medium,
                producing_model: "test".to_string(),
                fallback_used: false,
            },
            processing_duration_ms: 1,
            retry_count: 0,
        }
    }

    #[test]
    fn near_identical_titles_group_together() {
        let a = item("1", "OpenAI releases new model with better reasoning", "Full details about the release today", "source-a");
        let b = item("2", "OpenAI releases new model with better reasoning today", "Full details about the release today", "source-b");
        let sim = weighted_similarity(&a, &b);
        assert!(sim > 0.5, "expected high similarity, got {sim}");
    }

    #[test]
    fn unrelated_items_score_low() {
        let a = item("1", "OpenAI releases new model", "Details about the model release", "source-a");
        let b = item("2", "Local bakery opens downtown", "The bakery serves fresh bread daily", "source-b");
        let sim = weighted_similarity(&a, &b);
        assert!(sim < 0.3, "expected low similarity, got {sim}");
    }

    #[test]
    fn enhance_representative_appends_attribution_once() {
        let rep = item("1", "A model launched", "Body", "source-a");
        let sib = item("2", "A model launched today", "Body", "source-b");
        let mut group = ConsolidatedGroup {
            items: vec![rep, sib],
            representative_idx: 0,
            cross_source_upgrade: false,
        };
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
        let config = PipelineConfig::new_from_env(&cli).unwrap();
        enhance_representative(&config, &mut group);
        enhance_representative(&config, &mut group);
        let last = group.items[0].summary.bullets.last().unwrap();
        assert_eq!(last.matches("Also covered by").count(), 1);
    }
}

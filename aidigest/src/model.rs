//! Shared entity types (spec §3). These are plain data; stage logic lives in
//! each stage's own module. Entities are never mutated in place once handed
//! to the next stage — every stage produces new values and appends to the
//! run's processing log instead of rewriting earlier collections.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};

/// Where a [`RawItem`] originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Feed,
    Video,
}

/// An item as fetched from a source, before any scoring or summarization.
/// Immutable after S1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawItem {
    /// Content hash of `source_id` + `url`; stable across runs.
    pub id: String,
    pub source_id: String,
    pub source_kind: SourceKind,
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// [`RawItem`] plus S2's relevance verdict.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: RawItem,
    pub ai_relevance: f64,
    pub matched_keywords: Vec<String>,
    pub filter_reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceReliability {
    High,
    Medium,
    Low,
}

/// S3's structured output: 3-4 bullets plus provenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Summary {
    pub bullets: Vec<String>,
    pub confidence: f64,
    pub source_reliability: SourceReliability,
    pub producing_model: String,
    pub fallback_used: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummarizedItem {
    pub scored: ScoredItem,
    pub summary: Summary,
    pub processing_duration_ms: u64,
    pub retry_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMethod {
    FastScreening,
    EmbeddingSimilarity,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub method: DuplicateMethod,
    pub similarity: f64,
    pub duplicate_of_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextDecision {
    Keep,
    Update,
    Skip,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextVerdict {
    pub decision: ContextDecision,
    pub references: Vec<String>,
    pub similarity: f64,
    pub reasoning: String,
}

/// A pointer to a source article with a short reader-facing summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Citation {
    pub source_display_name: String,
    pub url: String,
    pub original_title: String,
    pub summary: String,
}

/// A same-story item from a different source that S4a's consolidation
/// merged into this article's representative. The sibling item itself never
/// becomes a [`ProcessedArticle`] (only the representative survives
/// consolidation), so its citation-worthy fields are carried forward here
/// rather than lost — S6 treats these as a citation candidate pool
/// alongside S5 cluster siblings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsolidatedSibling {
    pub source_id: String,
    pub url: String,
    pub title: String,
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessedArticle {
    pub summarized: SummarizedItem,
    pub duplicate: DuplicateVerdict,
    pub context: Option<ContextVerdict>,
    pub display_title: String,
    pub citations: Vec<Citation>,
    pub is_update: bool,
    pub cluster_id: Option<String>,
    pub consolidated_siblings: Vec<ConsolidatedSibling>,
}

impl ProcessedArticle {
    pub fn id(&self) -> &str {
        &self.summarized.scored.item.id
    }

    pub fn ai_relevance(&self) -> f64 {
        self.summarized.scored.ai_relevance
    }

    pub fn source_id(&self) -> &str {
        &self.summarized.scored.item.source_id
    }

    pub fn url(&self) -> &str {
        &self.summarized.scored.item.url
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicCluster {
    pub cluster_id: String,
    pub representative_id: String,
    pub sibling_ids: Vec<String>,
    pub confidence: f64,
    pub topic_name: String,
}

impl TopicCluster {
    /// Invariant 4: representative is a member of siblings-plus-representative.
    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.representative_id.as_str())
            .chain(self.sibling_ids.iter().map(String::as_str))
    }
}

/// A historical item persisted at the end of S4, queried by future runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub item_id: String,
    pub title: String,
    pub summary_text: String,
    pub published_at: DateTime<Utc>,
    pub source_id: String,
    pub ai_relevance: f64,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub display_title: Option<String>,
    pub is_update: bool,
    pub topic_cluster: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Update,
    Related,
    Sequel,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub parent_item_id: String,
    pub child_item_id: String,
    pub kind: RelationshipKind,
    pub similarity: f64,
    pub reasoning: String,
}

/// Run-terminal status (spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub stage: &'static str,
    pub level: LogLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

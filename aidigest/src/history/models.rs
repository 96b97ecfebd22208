//! Diesel row types for the four tables in spec §6, grounded on
//! `models/recommendation.rs`'s `Queryable`/`Insertable` split.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use pgvector::Vector;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::processed_content)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProcessedContentRow {
    pub id: i32,
    pub processing_date: NaiveDate,
    pub edition: String,
    pub content_type: String,
    pub title: String,
    pub lead_paragraph: String,
    pub articles_count: i32,
    pub multi_source_topics: serde_json::Value,
    pub content_md: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = crate::schema::processed_content)]
pub struct NewProcessedContent {
    pub processing_date: NaiveDate,
    pub edition: String,
    pub content_type: String,
    pub title: String,
    pub lead_paragraph: String,
    pub articles_count: i32,
    pub multi_source_topics: serde_json::Value,
    pub content_md: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::processing_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProcessingLogRow {
    pub id: i32,
    pub processing_date: NaiveDate,
    pub edition: String,
    pub status: String,
    pub articles_processed: i32,
    pub articles_failed: i32,
    pub llm_calls: i32,
    pub total_tokens: i64,
    pub processing_time_seconds: f64,
    pub data: serde_json::Value,
    pub error_details: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = crate::schema::processing_logs)]
pub struct NewProcessingLog {
    pub processing_date: NaiveDate,
    pub edition: String,
    pub status: String,
    pub articles_processed: i32,
    pub articles_failed: i32,
    pub llm_calls: i32,
    pub total_tokens: i64,
    pub processing_time_seconds: f64,
    pub data: serde_json::Value,
    pub error_details: Option<serde_json::Value>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::contextual_articles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContextualArticleRow {
    pub id: i32,
    pub article_id: String,
    pub title: String,
    pub content_summary: String,
    pub published_date: DateTime<Utc>,
    pub source_url: String,
    pub source_id: String,
    pub topic_cluster: Option<String>,
    pub ai_relevance_score: f64,
    pub summary_points: serde_json::Value,
    pub display_title: Option<String>,
    pub is_update: bool,
    pub embedding: Vector,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = crate::schema::contextual_articles)]
pub struct NewContextualArticle {
    pub article_id: String,
    pub title: String,
    pub content_summary: String,
    pub published_date: DateTime<Utc>,
    pub source_url: String,
    pub source_id: String,
    pub topic_cluster: Option<String>,
    pub ai_relevance_score: f64,
    pub summary_points: serde_json::Value,
    pub display_title: Option<String>,
    pub is_update: bool,
    pub embedding: Vector,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::article_relationships)]
pub struct NewArticleRelationship {
    pub parent_article_id: String,
    pub child_article_id: String,
    pub relationship_type: String,
    pub similarity_score: f64,
    pub reasoning: String,
}

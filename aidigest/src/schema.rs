// Hand-maintained, in the shape Diesel CLI would generate from the four
// tables in spec §6 (`processed_content`, `processing_logs`,
// `contextual_articles`, `article_relationships`).

#[allow(unused_imports)]
use diesel::sql_types::*;
pub type PgVector = pgvector::sql_types::Vector;

diesel::table! {
    processed_content (id) {
        id -> Int4,
        processing_date -> Date,
        #[max_length = 64]
        edition -> Varchar,
        #[max_length = 32]
        content_type -> Varchar,
        title -> Text,
        lead_paragraph -> Text,
        articles_count -> Int4,
        multi_source_topics -> Jsonb,
        content_md -> Text,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    processing_logs (id) {
        id -> Int4,
        processing_date -> Date,
        #[max_length = 64]
        edition -> Varchar,
        #[max_length = 16]
        status -> Varchar,
        articles_processed -> Int4,
        articles_failed -> Int4,
        llm_calls -> Int4,
        total_tokens -> Int8,
        processing_time_seconds -> Float8,
        data -> Jsonb,
        error_details -> Nullable<Jsonb>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    contextual_articles (id) {
        id -> Int4,
        #[max_length = 64]
        article_id -> Varchar,
        title -> Text,
        content_summary -> Text,
        published_date -> Timestamptz,
        source_url -> Text,
        #[max_length = 128]
        source_id -> Varchar,
        #[max_length = 64]
        topic_cluster -> Nullable<Varchar>,
        ai_relevance_score -> Float8,
        summary_points -> Jsonb,
        display_title -> Nullable<Text>,
        is_update -> Bool,
        embedding -> crate::schema::PgVector,
        created_at -> Timestamp,
    }
}

diesel::table! {
    article_relationships (id) {
        id -> Int4,
        #[max_length = 64]
        parent_article_id -> Varchar,
        #[max_length = 64]
        child_article_id -> Varchar,
        #[max_length = 16]
        relationship_type -> Varchar,
        similarity_score -> Float8,
        reasoning -> Text,
        created_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    processed_content,
    processing_logs,
    contextual_articles,
    article_relationships,
);

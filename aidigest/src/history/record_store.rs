//! Diesel/Postgres-backed [`RecordStore`] over the four tables in spec §6,
//! grounded on the `recommendation` module's upsert-by-key idiom
//! (`get_or_create_source`).

use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::config::DatabaseConfig;
use crate::model::{RelationshipKind, RelationshipRecord, RunStatus};

use super::models::*;

/// Persistent record store (spec §6). Upserts are keyed per-table as
/// documented there; `article_relationships` is insert-only.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_processed_content(&self, row: NewProcessedContent) -> Result<(), eyre::Error>;
    async fn upsert_processing_log(&self, row: NewProcessingLog) -> Result<(), eyre::Error>;
    async fn upsert_contextual_article(&self, row: NewContextualArticle) -> Result<(), eyre::Error>;
    async fn insert_relationship(&self, row: NewArticleRelationship) -> Result<(), eyre::Error>;
}

pub struct PgRecordStore {
    pool: Pool<AsyncPgConnection>,
}

impl PgRecordStore {
    pub fn new(config: &DatabaseConfig) -> Result<Self, eyre::Error> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);
        let pool = Pool::builder(manager)
            .build()
            .map_err(|err| eyre::eyre!("failed to build Postgres pool: {err}"))?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl RecordStore for PgRecordStore {
    #[tracing::instrument(skip(self, row))]
    async fn upsert_processed_content(&self, row: NewProcessedContent) -> Result<(), eyre::Error> {
        use crate::schema::processed_content::dsl;

        let mut conn = self.pool.get().await?;
        let existing = dsl::processed_content
            .filter(dsl::processing_date.eq(row.processing_date))
            .filter(dsl::edition.eq(&row.edition))
            .filter(dsl::content_type.eq(&row.content_type))
            .select(dsl::id)
            .first::<i32>(&mut conn)
            .await
            .optional()?;

        match existing {
            Some(id) => {
                diesel::update(dsl::processed_content.filter(dsl::id.eq(id)))
                    .set(&row)
                    .execute(&mut conn)
                    .await?;
            }
            None => {
                diesel::insert_into(dsl::processed_content)
                    .values(&row)
                    .execute(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, row))]
    async fn upsert_processing_log(&self, row: NewProcessingLog) -> Result<(), eyre::Error> {
        use crate::schema::processing_logs::dsl;

        let mut conn = self.pool.get().await?;
        let existing = dsl::processing_logs
            .filter(dsl::processing_date.eq(row.processing_date))
            .filter(dsl::edition.eq(&row.edition))
            .select(dsl::id)
            .first::<i32>(&mut conn)
            .await
            .optional()?;

        match existing {
            Some(id) => {
                diesel::update(dsl::processing_logs.filter(dsl::id.eq(id)))
                    .set(&row)
                    .execute(&mut conn)
                    .await?;
            }
            None => {
                diesel::insert_into(dsl::processing_logs)
                    .values(&row)
                    .execute(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, row))]
    async fn upsert_contextual_article(&self, row: NewContextualArticle) -> Result<(), eyre::Error> {
        use crate::schema::contextual_articles::dsl;

        let mut conn = self.pool.get().await?;
        let existing = dsl::contextual_articles
            .filter(dsl::article_id.eq(&row.article_id))
            .select(dsl::id)
            .first::<i32>(&mut conn)
            .await
            .optional()?;

        match existing {
            Some(id) => {
                diesel::update(dsl::contextual_articles.filter(dsl::id.eq(id)))
                    .set(&row)
                    .execute(&mut conn)
                    .await?;
            }
            None => {
                diesel::insert_into(dsl::contextual_articles)
                    .values(&row)
                    .execute(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, row))]
    async fn insert_relationship(&self, row: NewArticleRelationship) -> Result<(), eyre::Error> {
        use crate::schema::article_relationships::dsl;

        let mut conn = self.pool.get().await?;
        diesel::insert_into(dsl::article_relationships)
            .values(&row)
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

pub fn relationship_kind_str(kind: RelationshipKind) -> &'static str {
    match kind {
        RelationshipKind::Update => "update",
        RelationshipKind::Related => "related",
        RelationshipKind::Sequel => "sequel",
    }
}

pub fn run_status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "success",
        RunStatus::Partial => "partial",
        RunStatus::Failed => "failed",
    }
}

pub fn relationship_row(record: &RelationshipRecord) -> NewArticleRelationship {
    NewArticleRelationship {
        parent_article_id: record.parent_item_id.clone(),
        child_article_id: record.child_item_id.clone(),
        relationship_type: relationship_kind_str(record.kind).to_string(),
        similarity_score: record.similarity,
        reasoning: record.reasoning.clone(),
    }
}

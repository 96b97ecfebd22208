//! ChromaDB-backed [`HistoricalIndex`], grounded on
//! `discord/tools/vector_client.rs`'s `ChromaClient`/`ChromaCollection` usage.

use chromadb::client::ChromaClientOptions;
use chromadb::collection::{CollectionEntries, QueryOptions};
use chromadb::{ChromaClient, ChromaCollection};
use tokio::sync::Mutex;

use crate::config::VectorDbConfig;
use crate::model::HistoricalRecord;

use super::HistoricalMatch;

/// Append-only historical vector store (spec §6). Appends are serialized
/// behind a single-writer lock even while reads stay concurrent, per
/// spec §5's "Shared-resource policy".
#[async_trait::async_trait]
pub trait HistoricalIndex: Send + Sync {
    async fn append(&self, record: HistoricalRecord, vector: Vec<f32>) -> Result<(), eyre::Error>;
    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<HistoricalMatch>, eyre::Error>;
    async fn persist(&self) -> Result<(), eyre::Error>;
}

pub struct ChromaHistoricalIndex {
    client: ChromaClient,
    collection_name: String,
    write_lock: Mutex<()>,
}

impl ChromaHistoricalIndex {
    pub async fn new(config: &VectorDbConfig) -> Result<Self, eyre::Error> {
        let options = ChromaClientOptions {
            url: Some(config.url.clone()),
            database: config.database.clone(),
            auth: chromadb::client::ChromaAuthMethod::TokenAuth {
                token: config.token.clone(),
                header: chromadb::client::ChromaTokenHeader::XChromaToken,
            },
        };

        let client = ChromaClient::new(options)
            .await
            .map_err(|err| eyre::eyre!("failed to create ChromaDB client: {err}"))?;

        Ok(Self {
            client,
            collection_name: config.collection.clone(),
            write_lock: Mutex::new(()),
        })
    }

    async fn collection(&self) -> Result<ChromaCollection, eyre::Error> {
        self.client
            .get_or_create_collection(&self.collection_name, None)
            .await
            .map_err(|err| eyre::eyre!("failed to get or create collection {}: {err}", self.collection_name))
    }
}

#[async_trait::async_trait]
impl HistoricalIndex for ChromaHistoricalIndex {
    #[tracing::instrument(skip(self, record, vector))]
    async fn append(&self, record: HistoricalRecord, vector: Vec<f32>) -> Result<(), eyre::Error> {
        let _guard = self.write_lock.lock().await;
        let collection = self.collection().await?;

        let metadata = serde_json::json!({
            "title": record.title,
            "summary_text": record.summary_text,
            "published_at": record.published_at.to_rfc3339(),
            "source_id": record.source_id,
            "ai_relevance": record.ai_relevance,
            "display_title": record.display_title,
            "is_update": record.is_update,
            "topic_cluster": record.topic_cluster,
        });
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        let entries = CollectionEntries {
            ids: vec![&record.item_id],
            embeddings: Some(vec![vector]),
            metadatas: Some(vec![metadata]),
            documents: Some(vec![&record.summary_text]),
        };

        collection
            .upsert(entries, None)
            .await
            .map_err(|err| eyre::eyre!("failed to append historical record: {err}"))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, query_vector))]
    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<HistoricalMatch>, eyre::Error> {
        let collection = self.collection().await?;

        let options = QueryOptions {
            query_texts: None,
            query_embeddings: Some(vec![query_vector.to_vec()]),
            where_metadata: None,
            where_document: None,
            n_results: Some(k),
            include: Some(vec!["documents", "metadatas", "distances"]),
        };

        let mut result = collection
            .query(options, None)
            .await
            .map_err(|err| eyre::eyre!("failed to query historical index: {err}"))?;

        let ids = result.ids.pop().unwrap_or_default();
        let distances = result.distances.take().and_then(|mut v| v.pop()).unwrap_or_default();
        let metadatas = result.metadatas.take().and_then(|mut v| v.pop()).unwrap_or_default();

        let matches = ids
            .into_iter()
            .zip(distances)
            .zip(metadatas.into_iter().map(Some).chain(std::iter::repeat(None)))
            .filter_map(|((id, distance), metadata)| {
                let metadata = metadata?;
                let record = record_from_metadata(id, &metadata)?;
                Some(HistoricalMatch {
                    record,
                    cosine: 1.0 - (distance as f64).clamp(0.0, 1.0),
                })
            })
            .collect();

        Ok(matches)
    }

    async fn persist(&self) -> Result<(), eyre::Error> {
        // ChromaDB persists on write; nothing further to flush.
        Ok(())
    }
}

fn record_from_metadata(item_id: String, metadata: &serde_json::Map<String, serde_json::Value>) -> Option<HistoricalRecord> {
    Some(HistoricalRecord {
        item_id,
        title: metadata.get("title")?.as_str()?.to_string(),
        summary_text: metadata.get("summary_text")?.as_str()?.to_string(),
        published_at: metadata
            .get("published_at")
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now),
        source_id: metadata.get("source_id")?.as_str()?.to_string(),
        ai_relevance: metadata.get("ai_relevance").and_then(|v| v.as_f64()).unwrap_or(0.0),
        embedding: None,
        display_title: metadata.get("display_title").and_then(|v| v.as_str()).map(str::to_string),
        is_update: metadata.get("is_update").and_then(|v| v.as_bool()).unwrap_or(false),
        topic_cluster: metadata.get("topic_cluster").and_then(|v| v.as_str()).map(str::to_string),
    })
}

//! Historical vector index and persistent record store (spec §6).
//!
//! `HistoricalIndex` is grounded directly on
//! `discord/tools/vector_client.rs`'s `chromadb` + `fastembed` usage,
//! generalized from a Discord-channel-scoped collection to one
//! `historical_items` collection. `RecordStore` is grounded on the
//! `recommendation` module's Diesel/`diesel-async` upsert idiom
//! (`get_or_create_source`), targeting the four tables in spec §6.

mod models;
mod record_store;
mod vector_index;

pub use models::*;
pub use record_store::{relationship_kind_str, relationship_row, run_status_str, PgRecordStore, RecordStore};
pub use vector_index::{ChromaHistoricalIndex, HistoricalIndex};

use crate::model::HistoricalRecord;

/// A search hit from [`HistoricalIndex::search`]: the stored record's id
/// plus cosine similarity to the query vector.
#[derive(Clone, Debug)]
pub struct HistoricalMatch {
    pub record: HistoricalRecord,
    pub cosine: f64,
}

//! The `VectorIndex` capability set (§4.2, §9 "back-end pluggability") and
//! the shared in-memory search logic both back-ends use.

use std::collections::HashMap;

use async_trait::async_trait;
use ledger_core::Receipt;
use serde::{Deserialize, Serialize};

use crate::error::VectorError;
use crate::metadata::{matches_filter, Metadata};

/// One indexed receipt: its document string, embedding, and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

/// A single ranked result from `search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
}

/// Capability set implemented by both the persistent and in-memory
/// back-ends. Identical contract either way, including ordering and
/// tie-breaks — callers never need to know which is active.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and index `receipt` under `id`, replacing any existing entry
    /// (re-embedding occurs on every update, per §4.2).
    async fn add(&self, id: i64, receipt: &Receipt) -> Result<(), VectorError>;

    /// Evict the entry for `id`, if any.
    async fn remove(&self, id: i64) -> Result<(), VectorError>;

    /// Top-`k` identifiers by cosine similarity to `query_text`, filtered by
    /// an equality conjunction over metadata keys. Ties broken by
    /// descending identifier.
    async fn search(
        &self,
        query_text: &str,
        k: usize,
        filter: &Metadata,
    ) -> Result<Vec<SearchHit>, VectorError>;
}

/// Rank `entries` against `query_embedding`, applying `filter` first, then
/// taking the top `k` by cosine similarity with ties broken by descending
/// identifier.
pub(crate) fn rank_entries(
    entries: &HashMap<i64, IndexEntry>,
    query_embedding: &[f32],
    k: usize,
    filter: &Metadata,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = entries
        .iter()
        .filter(|(_, entry)| matches_filter(&entry.metadata, filter))
        .map(|(&id, entry)| SearchHit {
            id,
            score: crate::similarity::cosine_similarity(query_embedding, &entry.embedding),
        })
        .collect();

    // Ties break on descending identifier only, not descending timestamp
    // then identifier as the planner's own source ordering does (§4.1);
    // `IndexEntry` carries just the embedding and string metadata, not a
    // receipt timestamp, to sort on. The planner falls back to its own
    // store-ordered domain list whenever these candidates don't overlap
    // it, which is where the date-first ordering actually applies.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.id.cmp(&a.id))
    });
    hits.truncate(k);
    hits
}

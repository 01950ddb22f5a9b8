//! Persistent on-disk back-end. Holds the same guarded in-memory map as
//! `InMemoryIndex` for search performance, and fsyncs a JSON snapshot on
//! every mutation so the index survives a process restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ledger_completion::CompletionClient;
use ledger_core::Receipt;
use tracing::warn;

use crate::document::build_document_text;
use crate::error::VectorError;
use crate::index::{rank_entries, IndexEntry, SearchHit, VectorIndex};
use crate::metadata::{build_metadata, Metadata};

pub struct PersistentIndex {
    entries: RwLock<HashMap<i64, IndexEntry>>,
    embedder: Arc<dyn CompletionClient>,
    snapshot_path: PathBuf,
}

impl PersistentIndex {
    /// Open (or create) a persistent index rooted at `dir`. Loads any
    /// existing snapshot found there.
    pub fn open(dir: impl AsRef<Path>, embedder: Arc<dyn CompletionClient>) -> Result<Self, VectorError> {
        std::fs::create_dir_all(&dir)?;
        let snapshot_path = dir.as_ref().join("index.json");
        let entries = if snapshot_path.exists() {
            let text = std::fs::read_to_string(&snapshot_path)?;
            serde_json::from_str(&text)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            entries: RwLock::new(entries),
            embedder,
            snapshot_path,
        })
    }

    fn save(&self) -> Result<(), VectorError> {
        let guard = self.entries.read().expect("index lock poisoned");
        let text = serde_json::to_string(&*guard)?;
        drop(guard);
        std::fs::write(&self.snapshot_path, text)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild the snapshot from a full sweep of receipts — used on first
    /// use after a process restart to reconcile any entries that never made
    /// it into the last snapshot (§9, "a full re-index sweep").
    pub async fn reindex_all(&self, receipts: &[Receipt]) -> Result<(), VectorError> {
        for receipt in receipts {
            if let Some(id) = receipt.id {
                self.add(id, receipt).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PersistentIndex {
    async fn add(&self, id: i64, receipt: &Receipt) -> Result<(), VectorError> {
        let document = build_document_text(receipt);
        let mut embedding = self.embedder.embed(&document).await?;
        crate::similarity::l2_normalize(&mut embedding);
        let metadata: Metadata = build_metadata(receipt);

        {
            let mut guard = self.entries.write().expect("index lock poisoned");
            guard.insert(
                id,
                IndexEntry {
                    document,
                    embedding,
                    metadata,
                },
            );
        }
        if let Err(e) = self.save() {
            warn!(error = %e, receipt_id = id, "failed to persist vector index snapshot");
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, id: i64) -> Result<(), VectorError> {
        {
            let mut guard = self.entries.write().expect("index lock poisoned");
            guard.remove(&id);
        }
        self.save()
    }

    async fn search(
        &self,
        query_text: &str,
        k: usize,
        filter: &Metadata,
    ) -> Result<Vec<SearchHit>, VectorError> {
        let mut query_embedding = self.embedder.embed(query_text).await?;
        crate::similarity::l2_normalize(&mut query_embedding);

        let guard = self.entries.read().expect("index lock poisoned");
        Ok(rank_entries(&guard, &query_embedding, k, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_completion::StubCompletionClient;
    use ledger_core::{AuditFlags, LineItem};
    use rust_decimal_macros::dec;

    fn receipt(vendor: &str, desc: &str) -> Receipt {
        Receipt {
            id: Some(1),
            vendor: vendor.to_string(),
            timestamp: Utc::now(),
            total_amount: dec!(10.00),
            tax_amount: dec!(1.00),
            currency: "EUR".to_string(),
            category: Some("groceries".to_string()),
            payment_method: None,
            receipt_number: None,
            image_ref: None,
            line_items: vec![LineItem {
                id: None,
                description: desc.to_string(),
                quantity: 1,
                unit_price: dec!(10.00),
                line_total: dec!(10.00),
                vat_percent: None,
            }],
            flags: AuditFlags::default(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn CompletionClient> = Arc::new(StubCompletionClient::default());

        {
            let index = PersistentIndex::open(dir.path(), embedder.clone()).unwrap();
            index.add(1, &receipt("REWE", "Brot")).await.unwrap();
        }

        let reopened = PersistentIndex::open(dir.path(), embedder).unwrap();
        assert_eq!(reopened.len(), 1);
        let hits = reopened.search("Brot", 5, &Metadata::new()).await.unwrap();
        assert_eq!(hits[0].id, 1);
    }
}

//! In-memory back-end: a `HashMap` guarded by a reader-writer lock (§5:
//! readers are `search`, writers are `add`/`remove`).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ledger_completion::CompletionClient;
use ledger_core::Receipt;

use crate::document::build_document_text;
use crate::error::VectorError;
use crate::index::{rank_entries, IndexEntry, SearchHit, VectorIndex};
use crate::metadata::{build_metadata, Metadata};

pub struct InMemoryIndex {
    entries: RwLock<HashMap<i64, IndexEntry>>,
    embedder: Arc<dyn CompletionClient>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn CompletionClient>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            embedder,
        }
    }

    /// Number of indexed entries. Exposed for `GET /api/health` and tests.
    pub fn len(&self) -> usize {
        self.entries.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, id: i64, receipt: &Receipt) -> Result<(), VectorError> {
        let document = build_document_text(receipt);
        let mut embedding = self.embedder.embed(&document).await?;
        crate::similarity::l2_normalize(&mut embedding);
        let metadata: Metadata = build_metadata(receipt);

        let mut guard = self.entries.write().expect("index lock poisoned");
        guard.insert(
            id,
            IndexEntry {
                document,
                embedding,
                metadata,
            },
        );
        Ok(())
    }

    async fn remove(&self, id: i64) -> Result<(), VectorError> {
        let mut guard = self.entries.write().expect("index lock poisoned");
        guard.remove(&id);
        Ok(())
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
    async fn add_then_search_finds_matching_document() {
        let index = InMemoryIndex::new(Arc::new(StubCompletionClient::default()));
        index.add(1, &receipt("REWE", "Brot")).await.unwrap();
        index.add(2, &receipt("Aldi", "Schokolade")).await.unwrap();

        let hits = index.search("Brot", 5, &Metadata::new()).await.unwrap();
        assert_eq!(hits[0].id, 1);
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn remove_evicts_entry() {
        let index = InMemoryIndex::new(Arc::new(StubCompletionClient::default()));
        index.add(1, &receipt("REWE", "Brot")).await.unwrap();
        index.remove(1).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn filter_restricts_results() {
        let index = InMemoryIndex::new(Arc::new(StubCompletionClient::default()));
        index.add(1, &receipt("REWE", "Brot")).await.unwrap();
        index.add(2, &receipt("Aldi", "Brot")).await.unwrap();

        let mut filter = Metadata::new();
        filter.insert("vendor".to_string(), "Aldi".to_string());
        let hits = index.search("Brot", 5, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
    }
}

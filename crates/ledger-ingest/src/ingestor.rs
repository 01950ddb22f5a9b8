//! The Ingestor (§4.5): the single entry point that turns a candidate
//! `Receipt` into a stored, audited, searchable one.

use std::sync::Arc;

use tracing::warn;

use ledger_core::{validate_receipt, DuplicateProbe, LedgerError, LedgerResult, Receipt, ReceiptId};
use ledger_store::RelationalStore;
use ledger_vector::VectorIndex;

use crate::reconciliation::ReconciliationQueue;

fn validation_error(receipt: &Receipt) -> Option<LedgerError> {
    let errors = validate_receipt(receipt);
    if errors.is_empty() {
        return None;
    }
    let joined = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Some(LedgerError::Validation(joined))
}

/// Write-through coordinator: validate, audit, store, index — with the
/// vector-index half of the write-through able to fall behind the store
/// without rolling it back (§4.5 step 4).
#[derive(Clone)]
pub struct Ingestor {
    store: RelationalStore,
    index: Arc<dyn VectorIndex>,
    queue: Arc<ReconciliationQueue>,
}

impl Ingestor {
    pub fn new(
        store: RelationalStore,
        index: Arc<dyn VectorIndex>,
        queue: Arc<ReconciliationQueue>,
    ) -> Self {
        Self { store, index, queue }
    }

    pub fn store(&self) -> &RelationalStore {
        &self.store
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Steps 1-5 of §4.5: validate, audit, write-through, reconcile on
    /// partial failure, return the assigned identifier and flags.
    pub async fn ingest(&self, mut receipt: Receipt) -> LedgerResult<Receipt> {
        if let Some(err) = validation_error(&receipt) {
            return Err(err);
        }

        receipt.flags = ledger_audit::evaluate(&receipt, &self.store).await?;
        let stored = self.store.insert_receipt(receipt).await?;
        let id = stored.id.expect("relational store assigns an id on insert");

        if let Err(err) = self.index.add(id, &stored).await {
            warn!(
                receipt_id = id,
                error = %err,
                "vector index upsert failed after store write; queued for reconciliation"
            );
            self.queue.push_upsert(id).await;
        }

        self.sync_neighbor_duplicate_flags(&stored).await?;
        Ok(stored)
    }

    /// The duplicate flag is the one audit rule that depends on other
    /// receipts, so a new or changed receipt can make an existing neighbor's
    /// stored flag stale the moment it's written. Re-run just that rule for
    /// every same-day, same-vendor neighbor and persist whatever changed, so
    /// the stored flag never needs an explicit recompute to catch up (§3,
    /// §8's "for all matching pairs, both carry the duplicate flag").
    async fn sync_neighbor_duplicate_flags(&self, receipt: &Receipt) -> LedgerResult<()> {
        let vendor_key = ledger_core::normalize_vendor_key(&receipt.vendor);
        let neighbors = self
            .store
            .find_same_day_same_vendor(&vendor_key, receipt.calendar_date(), receipt.id)
            .await?;

        for neighbor in neighbors {
            let neighbor_id = neighbor.id.expect("stored receipts always carry an id");
            let is_duplicate = ledger_audit::duplicate(&neighbor, &self.store).await?;
            if neighbor.flags.duplicate != is_duplicate {
                let mut updated = neighbor;
                updated.flags.duplicate = is_duplicate;
                self.store.update_receipt(neighbor_id, updated).await?;
            }
        }
        Ok(())
    }

    /// Full-replacement update (§3 lifecycle): re-runs validation and audit,
    /// re-embeds unconditionally (§4.2 "re-embedding occurs on every
    /// update"), and reconciles the same way `ingest` does.
    pub async fn update(&self, id: ReceiptId, mut receipt: Receipt) -> LedgerResult<Receipt> {
        if let Some(err) = validation_error(&receipt) {
            return Err(err);
        }

        receipt.flags = ledger_audit::evaluate(&receipt, &self.store).await?;
        let stored = self.store.update_receipt(id, receipt).await?;

        if let Err(err) = self.index.add(id, &stored).await {
            warn!(
                receipt_id = id,
                error = %err,
                "vector index upsert failed after store update; queued for reconciliation"
            );
            self.queue.push_upsert(id).await;
        }

        self.sync_neighbor_duplicate_flags(&stored).await?;
        Ok(stored)
    }

    /// Delete a receipt and evict its vector entry, queueing the eviction
    /// for reconciliation on failure rather than leaving the deletion
    /// half-applied.
    pub async fn delete(&self, id: ReceiptId) -> LedgerResult<()> {
        self.store.delete_receipt(id).await?;
        if let Err(err) = self.index.remove(id).await {
            warn!(
                receipt_id = id,
                error = %err,
                "vector index eviction failed after store delete; queued for reconciliation"
            );
            self.queue.push_remove(id).await;
        }
        Ok(())
    }

    /// The "recompute all" maintenance hook (spec.md §9): re-run the Audit
    /// Engine over every stored receipt and persist any flags that changed.
    /// Returns the number of receipts whose flags were updated.
    pub async fn recompute_audit_flags(&self) -> LedgerResult<usize> {
        let receipts = self
            .store
            .list_receipts(ledger_store::ReceiptFilter::default())
            .await?;

        let mut changed = 0;
        for receipt in receipts {
            let id = receipt.id.expect("stored receipts always carry an id");
            let recomputed = ledger_audit::evaluate(&receipt, &self.store).await?;
            if recomputed != receipt.flags {
                let mut updated = receipt;
                updated.flags = recomputed;
                self.store.update_receipt(id, updated.clone()).await?;
                if let Err(err) = self.index.add(id, &updated).await {
                    warn!(
                        receipt_id = id,
                        error = %err,
                        "vector index upsert failed during audit recompute; queued for reconciliation"
                    );
                    self.queue.push_upsert(id).await;
                }
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_completion::StubCompletionClient;
    use ledger_vector::InMemoryIndex;
    use rust_decimal_macros::dec;

    fn sample_receipt() -> Receipt {
        Receipt {
            id: None,
            vendor: "  REWE  ".to_string(),
            timestamp: Utc::now(),
            total_amount: dec!(45.67),
            tax_amount: dec!(7.32),
            currency: "EUR".to_string(),
            category: None,
            payment_method: None,
            receipt_number: None,
            image_ref: None,
            line_items: vec![],
            flags: Default::default(),
            created_at: None,
            updated_at: None,
        }
    }

    fn ingestor() -> Ingestor {
        let store = RelationalStore::open_in_memory().unwrap();
        let embedder = Arc::new(StubCompletionClient::default());
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(embedder));
        Ingestor::new(store, index, Arc::new(ReconciliationQueue::new()))
    }

    #[tokio::test]
    async fn ingest_assigns_id_and_normalizes_vendor() {
        let ingestor = ingestor();
        let stored = ingestor.ingest(sample_receipt()).await.unwrap();
        assert!(stored.id.is_some());
        assert_eq!(stored.vendor, "REWE");
    }

    #[tokio::test]
    async fn ingest_rejects_invalid_receipt() {
        let ingestor = ingestor();
        let mut bad = sample_receipt();
        bad.tax_amount = dec!(100.00);
        let result = ingestor.ingest(bad).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn ingest_then_search_finds_receipt_via_vector_index() {
        let ingestor = ingestor();
        let stored = ingestor.ingest(sample_receipt()).await.unwrap();
        let hits = ingestor
            .index()
            .search("REWE", 5, &Default::default())
            .await
            .unwrap();
        assert!(hits.iter().any(|h| h.id == stored.id.unwrap()));
    }

    #[tokio::test]
    async fn update_reembeds_and_preserves_identifier() {
        let ingestor = ingestor();
        let stored = ingestor.ingest(sample_receipt()).await.unwrap();
        let mut updated_receipt = stored.clone();
        updated_receipt.vendor = "Lidl".to_string();
        let updated = ingestor
            .update(stored.id.unwrap(), updated_receipt)
            .await
            .unwrap();
        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.vendor, "Lidl");
    }

    #[tokio::test]
    async fn delete_evicts_from_both_store_and_index() {
        let ingestor = ingestor();
        let stored = ingestor.ingest(sample_receipt()).await.unwrap();
        let id = stored.id.unwrap();
        ingestor.delete(id).await.unwrap();
        assert!(ingestor.store().get_receipt(id).await.unwrap().is_none());
        let hits = ingestor
            .index()
            .search("REWE", 5, &Default::default())
            .await
            .unwrap();
        assert!(!hits.iter().any(|h| h.id == id));
    }

    #[tokio::test]
    async fn ingest_resyncs_neighbor_duplicate_flag() {
        let ingestor = ingestor();
        let first = ingestor.ingest(sample_receipt()).await.unwrap();
        let mut second_receipt = sample_receipt();
        second_receipt.timestamp = first.timestamp;
        let second = ingestor.ingest(second_receipt).await.unwrap();

        assert!(second.flags.duplicate);
        assert!(
            !first.flags.duplicate,
            "first receipt's flags were computed before its duplicate existed"
        );

        let reloaded_first = ingestor
            .store()
            .get_receipt(first.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(
            reloaded_first.flags.duplicate,
            "ingesting the matching second receipt should resync the first receipt's stored flag"
        );
    }

    #[tokio::test]
    async fn recompute_audit_flags_repairs_drifted_flag() {
        let ingestor = ingestor();
        let first = ingestor.ingest(sample_receipt()).await.unwrap();
        let mut second_receipt = sample_receipt();
        second_receipt.timestamp = first.timestamp;
        ingestor.ingest(second_receipt).await.unwrap();

        // Simulate a flag drifting out of sync with current store state
        // (e.g. an external edit) to exercise the maintenance hook directly.
        let mut drifted = ingestor
            .store()
            .get_receipt(first.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        drifted.flags.duplicate = false;
        ingestor
            .store()
            .update_receipt(first.id.unwrap(), drifted)
            .await
            .unwrap();

        let changed = ingestor.recompute_audit_flags().await.unwrap();
        assert_eq!(changed, 1, "recompute should catch the drifted first receipt");

        let repaired = ingestor
            .store()
            .get_receipt(first.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(repaired.flags.duplicate);
    }
}

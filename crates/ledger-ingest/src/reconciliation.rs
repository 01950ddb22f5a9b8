//! The in-memory reconciliation queue (§4.5 step 4): when the vector-index
//! half of a write-through fails after the relational store half has
//! already committed, the affected receipt is retried here on a bounded
//! exponential backoff instead of rolling back the store write.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use ledger_core::ReceiptId;
use ledger_store::RelationalStore;
use ledger_vector::VectorIndex;

/// Maximum retry attempts before an entry is dropped with a warning.
const MAX_ATTEMPTS: u32 = 8;
/// Backoff ceiling, per §4.5.
const BACKOFF_CEILING: Duration = Duration::from_secs(300);
/// Base backoff before the first doubling.
const BACKOFF_BASE_SECS: u64 = 5;

/// What the queue should do to bring the vector index back in step for one
/// receipt. The spec calls out upsert failures explicitly; eviction failures
/// on delete reuse the same queue rather than inventing a second mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Upsert,
    Remove,
}

#[derive(Debug, Clone)]
pub struct ReconcileEntry {
    pub receipt_id: ReceiptId,
    pub action: ReconcileAction,
    pub attempts: u32,
    pub next_attempt_at: Instant,
}

impl ReconcileEntry {
    fn new(receipt_id: ReceiptId, action: ReconcileAction) -> Self {
        Self {
            receipt_id,
            action,
            attempts: 0,
            next_attempt_at: Instant::now(),
        }
    }
}

fn backoff_for(attempts: u32) -> Duration {
    let scaled = BACKOFF_BASE_SECS.saturating_mul(1u64 << attempts.min(20));
    Duration::from_secs(scaled).min(BACKOFF_CEILING)
}

/// A process-wide queue of receipts whose vector-index state has fallen out
/// of step with the relational store.
#[derive(Default)]
pub struct ReconciliationQueue {
    entries: Mutex<VecDeque<ReconcileEntry>>,
}

impl ReconciliationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_upsert(&self, receipt_id: ReceiptId) {
        self.entries
            .lock()
            .await
            .push_back(ReconcileEntry::new(receipt_id, ReconcileAction::Upsert));
    }

    pub async fn push_remove(&self, receipt_id: ReceiptId) {
        self.entries
            .lock()
            .await
            .push_back(ReconcileEntry::new(receipt_id, ReconcileAction::Remove));
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Pop every entry whose backoff has elapsed, leaving not-yet-due
    /// entries in the queue.
    async fn drain_due(&self) -> Vec<ReconcileEntry> {
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        let mut due = Vec::new();
        let mut still_waiting = VecDeque::with_capacity(guard.len());
        for entry in guard.drain(..) {
            if entry.next_attempt_at <= now {
                due.push(entry);
            } else {
                still_waiting.push_back(entry);
            }
        }
        *guard = still_waiting;
        due
    }

    async fn requeue_or_drop(&self, mut entry: ReconcileEntry) {
        entry.attempts += 1;
        if entry.attempts >= MAX_ATTEMPTS {
            warn!(
                receipt_id = entry.receipt_id,
                attempts = entry.attempts,
                action = ?entry.action,
                "dropping receipt from reconciliation queue after repeated vector-index failures"
            );
            return;
        }
        entry.next_attempt_at = Instant::now() + backoff_for(entry.attempts);
        self.entries.lock().await.push_back(entry);
    }
}

/// Run one reconciliation pass: attempt every due entry, requeueing or
/// dropping on failure. Called by the periodic ticker and directly by tests.
pub async fn run_once(
    queue: &ReconciliationQueue,
    store: &RelationalStore,
    index: &dyn VectorIndex,
) {
    for entry in queue.drain_due().await {
        let result = match entry.action {
            ReconcileAction::Upsert => match store.get_receipt(entry.receipt_id).await {
                Ok(Some(receipt)) => index.add(entry.receipt_id, &receipt).await.map_err(|e| e.to_string()),
                Ok(None) => {
                    info!(
                        receipt_id = entry.receipt_id,
                        "receipt deleted before reconciliation; dropping queued upsert"
                    );
                    continue;
                }
                Err(err) => Err(err.to_string()),
            },
            ReconcileAction::Remove => index.remove(entry.receipt_id).await.map_err(|e| e.to_string()),
        };

        if let Err(err) = result {
            warn!(
                receipt_id = entry.receipt_id,
                action = ?entry.action,
                attempt = entry.attempts + 1,
                error = %err,
                "reconciliation attempt failed, will retry with backoff"
            );
            queue.requeue_or_drop(entry).await;
        }
    }
}

/// Spawn the background ticker that drives `run_once` periodically, per
/// §4.5/§5's "process-wide structure with its own periodic tick".
pub fn spawn_ticker(
    queue: Arc<ReconciliationQueue>,
    store: RelationalStore,
    index: Arc<dyn VectorIndex>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            run_once(&queue, &store, index.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        assert_eq!(backoff_for(0), Duration::from_secs(5));
        assert_eq!(backoff_for(1), Duration::from_secs(10));
        assert_eq!(backoff_for(2), Duration::from_secs(20));
        assert_eq!(backoff_for(10), BACKOFF_CEILING);
    }

    #[tokio::test]
    async fn push_then_drain_due_returns_immediately_due_entry() {
        let queue = ReconciliationQueue::new();
        queue.push_upsert(42).await;
        let due = queue.drain_due().await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].receipt_id, 42);
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn requeue_drops_after_max_attempts() {
        let queue = ReconciliationQueue::new();
        let mut entry = ReconcileEntry::new(7, ReconcileAction::Upsert);
        entry.attempts = MAX_ATTEMPTS - 1;
        queue.requeue_or_drop(entry).await;
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn requeue_keeps_entry_under_max_attempts() {
        let queue = ReconciliationQueue::new();
        let entry = ReconcileEntry::new(7, ReconcileAction::Upsert);
        queue.requeue_or_drop(entry).await;
        assert_eq!(queue.len().await, 1);
    }
}

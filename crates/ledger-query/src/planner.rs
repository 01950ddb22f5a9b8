//! The Query Planner (§4.6): classify, retrieve, aggregate deterministically,
//! then delegate prose formulation to the text completion service.

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use ledger_completion::CompletionClient;
use ledger_core::{LedgerResult, Receipt, ReceiptId};
use ledger_store::{ReceiptFilter, RelationalStore};
use ledger_vector::{Metadata, VectorIndex};

use crate::extraction::{extract_category, extract_period, extract_vendor, CategoryFilter};
use crate::intent::{classify, Intent};

/// The fixed system prompt (§4.6 step 4): the model restates, never computes.
const SYSTEM_PROMPT: &str = "You are a bookkeeping assistant. You may only restate the numbers \
and receipts provided in the context below; you may not compute, infer, or estimate any new \
numbers. If the context says there are no matching receipts, say so plainly.";

/// Vector search breadth, per §4.6 step 2.
const CANDIDATE_K: usize = 20;
/// Source-receipt list length shown alongside a non-freeform answer.
const SOURCE_DISPLAY_K: usize = 5;

/// The answer record returned to callers (§4.6).
#[derive(Debug, Clone)]
pub struct Answer {
    pub prose: String,
    pub numeric_total: Option<Decimal>,
    pub source_count: usize,
    pub source_receipt_ids: Vec<ReceiptId>,
}

#[derive(Serialize)]
struct ContextBlock<'a> {
    intent: &'a str,
    numeric_total: Option<String>,
    source_count: usize,
    source_receipts: Vec<ReceiptSummary>,
}

#[derive(Serialize)]
struct ReceiptSummary {
    id: ReceiptId,
    vendor: String,
    date: String,
    total: String,
    category: Option<String>,
}

fn summarize(receipt: &Receipt) -> ReceiptSummary {
    ReceiptSummary {
        id: receipt.id.unwrap_or_default(),
        vendor: receipt.vendor.clone(),
        date: receipt.timestamp.date_naive().to_string(),
        total: receipt.total_amount.to_string(),
        category: receipt.category.clone(),
    }
}

/// Domain receipts plus the deterministic numeric answer for a non-freeform
/// intent.
struct Aggregation {
    total: Option<Decimal>,
    domain: Vec<Receipt>,
}

pub struct QueryPlanner {
    store: RelationalStore,
    index: std::sync::Arc<dyn VectorIndex>,
    completion: std::sync::Arc<dyn CompletionClient>,
}

impl QueryPlanner {
    pub fn new(
        store: RelationalStore,
        index: std::sync::Arc<dyn VectorIndex>,
        completion: std::sync::Arc<dyn CompletionClient>,
    ) -> Self {
        Self { store, index, completion }
    }

    pub async fn answer(&self, question: &str) -> LedgerResult<Answer> {
        let intent = classify(question);

        let candidates = self
            .index
            .search(question, CANDIDATE_K, &Metadata::new())
            .await?;

        if intent == Intent::Freeform {
            let ids: Vec<ReceiptId> = candidates.iter().map(|h| h.id).collect();
            let receipts = self.fetch_many(&ids).await?;
            let prose = self
                .complete(intent, None, receipts.len(), &receipts)
                .await?;
            return Ok(Answer {
                prose,
                numeric_total: None,
                source_count: receipts.len(),
                source_receipt_ids: ids,
            });
        }

        let aggregation = self.aggregate(intent, question).await?;
        let domain_ids: HashSet<ReceiptId> = aggregation
            .domain
            .iter()
            .filter_map(|r| r.id)
            .collect();

        let mut source_ids: Vec<ReceiptId> = candidates
            .into_iter()
            .filter(|hit| domain_ids.contains(&hit.id))
            .map(|hit| hit.id)
            .collect();
        if source_ids.is_empty() {
            // The domain already comes back ordered by descending timestamp,
            // then descending identifier (§4.1); that ordering is the
            // fallback when semantic similarity doesn't overlap the domain.
            source_ids = aggregation.domain.iter().filter_map(|r| r.id).collect();
        }
        source_ids.truncate(SOURCE_DISPLAY_K);

        let displayed: Vec<Receipt> = aggregation
            .domain
            .iter()
            .filter(|r| r.id.map(|id| source_ids.contains(&id)).unwrap_or(false))
            .cloned()
            .collect();

        let prose = self
            .complete(intent, aggregation.total, aggregation.domain.len(), &displayed)
            .await?;

        Ok(Answer {
            prose,
            numeric_total: aggregation.total,
            source_count: aggregation.domain.len(),
            source_receipt_ids: source_ids,
        })
    }

    /// Re-fetch the full records for a set of identifiers, e.g. to attach
    /// full receipt bodies to an `Answer`'s source list in the HTTP layer.
    pub async fn fetch_many(&self, ids: &[ReceiptId]) -> LedgerResult<Vec<Receipt>> {
        let mut receipts = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(receipt) = self.store.get_receipt(id).await? {
                receipts.push(receipt);
            }
        }
        Ok(receipts)
    }

    async fn complete(
        &self,
        intent: Intent,
        total: Option<Decimal>,
        count: usize,
        receipts: &[Receipt],
    ) -> LedgerResult<String> {
        if count == 0 {
            return Ok("No matching receipts.".to_string());
        }
        let context = ContextBlock {
            intent: intent_label(intent),
            numeric_total: total.map(|t| t.to_string()),
            source_count: count,
            source_receipts: receipts.iter().map(summarize).collect(),
        };
        let serialized = serde_json::to_string(&context).unwrap_or_default();
        match self.completion.text_complete(SYSTEM_PROMPT, &serialized).await {
            Ok(prose) => Ok(prose),
            Err(ledger_completion::CompletionError::Unavailable(_))
            | Err(ledger_completion::CompletionError::Timeout) => {
                tracing::warn!("completion service unreachable, falling back to templated prose");
                Ok("Totals computed; prose unavailable because the language service is offline."
                    .to_string())
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn aggregate(&self, intent: Intent, question: &str) -> LedgerResult<Aggregation> {
        match intent {
            Intent::SumByCategory => self.aggregate_by_category(question).await,
            Intent::SumByVendor => self.aggregate_by_vendor(question).await,
            Intent::SumByPeriod => self.aggregate_by_period(question).await,
            Intent::Count => self.aggregate_count(question).await,
            Intent::ListTopK => self.aggregate_top_k(question).await,
            Intent::FindSpecific => self.aggregate_find_specific(question).await,
            Intent::Freeform => unreachable!("freeform is handled before aggregation"),
        }
    }

    async fn known_categories(&self) -> LedgerResult<Vec<String>> {
        let all = self.store.list_receipts(ReceiptFilter::default()).await?;
        let mut seen = HashSet::new();
        Ok(all
            .into_iter()
            .filter_map(|r| r.category)
            .filter(|c| seen.insert(c.clone()))
            .collect())
    }

    async fn known_vendors(&self) -> LedgerResult<Vec<String>> {
        let all = self.store.list_receipts(ReceiptFilter::default()).await?;
        let mut seen = HashSet::new();
        Ok(all
            .into_iter()
            .map(|r| r.vendor)
            .filter(|v| seen.insert(v.clone()))
            .collect())
    }

    async fn aggregate_by_category(&self, question: &str) -> LedgerResult<Aggregation> {
        let known = self.known_categories().await?;
        match extract_category(question, &known) {
            Some(filter) if filter.is_watchlist() => self.aggregate_watchlist_category().await,
            Some(CategoryFilter::Exact(category)) => {
                let domain = self
                    .store
                    .list_receipts(ReceiptFilter {
                        category: Some(category.to_string()),
                        ..Default::default()
                    })
                    .await?;
                let total = domain.iter().map(|r| r.total_amount).sum();
                Ok(Aggregation { total: Some(total), domain })
            }
            Some(CategoryFilter::Watchlist(_)) => self.aggregate_watchlist_category().await,
            None => {
                let domain = self.store.list_receipts(ReceiptFilter::default()).await?;
                let total = domain.iter().map(|r| r.total_amount).sum();
                Ok(Aggregation { total: Some(total), domain })
            }
        }
    }

    /// Line-item-level aggregation for watchlist categories: the numeric
    /// total is the sum of matching line items, not whole-receipt totals,
    /// since a receipt's own `category` field is often unset even when a
    /// line item trips the watchlist (e.g. a bar tab).
    async fn aggregate_watchlist_category(&self) -> LedgerResult<Aggregation> {
        let all = self.store.list_receipts(ReceiptFilter::default()).await?;
        let mut total = Decimal::ZERO;
        let mut domain = Vec::new();
        for receipt in all {
            let matches: Decimal = receipt
                .line_items
                .iter()
                .filter(|item| ledger_audit::line_item_matches_watchlist(&item.description))
                .map(|item| item.line_total)
                .sum();
            if matches > Decimal::ZERO || receipt.flags.suspicious_category {
                total += matches;
                domain.push(receipt);
            }
        }
        Ok(Aggregation { total: Some(total), domain })
    }

    async fn aggregate_by_vendor(&self, question: &str) -> LedgerResult<Aggregation> {
        let known = self.known_vendors().await?;
        let domain = match extract_vendor(question, &known) {
            Some(vendor) => {
                self.store
                    .list_receipts(ReceiptFilter {
                        vendor: Some(vendor.to_string()),
                        ..Default::default()
                    })
                    .await?
            }
            None => self.store.list_receipts(ReceiptFilter::default()).await?,
        };
        let total = domain.iter().map(|r| r.total_amount).sum();
        Ok(Aggregation { total: Some(total), domain })
    }

    async fn aggregate_by_period(&self, question: &str) -> LedgerResult<Aggregation> {
        let domain = match extract_period(question, Utc::now()) {
            Some(range) => {
                self.store
                    .list_receipts(ReceiptFilter {
                        start_date: Some(range.start),
                        end_date: Some(range.end),
                        ..Default::default()
                    })
                    .await?
            }
            None => self.store.list_receipts(ReceiptFilter::default()).await?,
        };
        let total = domain.iter().map(|r| r.total_amount).sum();
        Ok(Aggregation { total: Some(total), domain })
    }

    async fn aggregate_count(&self, question: &str) -> LedgerResult<Aggregation> {
        let known_categories = self.known_categories().await?;
        let known_vendors = self.known_vendors().await?;
        let mut filter = ReceiptFilter::default();
        if let Some(CategoryFilter::Exact(c)) = extract_category(question, &known_categories) {
            filter.category = Some(c.to_string());
        }
        if let Some(vendor) = extract_vendor(question, &known_vendors) {
            filter.vendor = Some(vendor.to_string());
        }
        let domain = self.store.list_receipts(filter).await?;
        Ok(Aggregation { total: None, domain })
    }

    async fn aggregate_top_k(&self, question: &str) -> LedgerResult<Aggregation> {
        let k = parse_leading_count(question).unwrap_or(5);
        let mut domain = self.store.list_receipts(ReceiptFilter::default()).await?;
        domain.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then_with(|| b.id.cmp(&a.id))
        });
        domain.truncate(k);
        let total = domain.iter().map(|r| r.total_amount).sum();
        Ok(Aggregation { total: Some(total), domain })
    }

    async fn aggregate_find_specific(&self, question: &str) -> LedgerResult<Aggregation> {
        let known_vendors = self.known_vendors().await?;
        let domain = match extract_vendor(question, &known_vendors) {
            Some(vendor) => {
                self.store
                    .list_receipts(ReceiptFilter {
                        vendor: Some(vendor.to_string()),
                        ..Default::default()
                    })
                    .await?
            }
            None => Vec::new(),
        };
        let total = domain.iter().map(|r| r.total_amount).sum();
        Ok(Aggregation { total: Some(total), domain })
    }
}

fn parse_leading_count(question: &str) -> Option<usize> {
    let lower = question.to_lowercase();
    let idx = lower.find("top ")?;
    lower[idx + 4..]
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<usize>().ok())
}

fn intent_label(intent: Intent) -> &'static str {
    match intent {
        Intent::SumByCategory => "sum_by_category",
        Intent::SumByVendor => "sum_by_vendor",
        Intent::SumByPeriod => "sum_by_period",
        Intent::Count => "count",
        Intent::ListTopK => "list_top_k",
        Intent::FindSpecific => "find_specific",
        Intent::Freeform => "freeform",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_completion::StubCompletionClient;
    use ledger_core::LineItem;
    use ledger_vector::InMemoryIndex;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn bar_receipt() -> Receipt {
        Receipt {
            id: None,
            vendor: "Bar".to_string(),
            timestamp: Utc::now(),
            total_amount: dec!(30.00),
            tax_amount: dec!(4.75),
            currency: "EUR".to_string(),
            category: None,
            payment_method: None,
            receipt_number: None,
            image_ref: None,
            line_items: vec![
                LineItem {
                    id: None,
                    description: "Beer".to_string(),
                    quantity: 1,
                    unit_price: dec!(5.00),
                    line_total: dec!(5.00),
                    vat_percent: None,
                },
                LineItem {
                    id: None,
                    description: "Wine".to_string(),
                    quantity: 1,
                    unit_price: dec!(20.00),
                    line_total: dec!(20.00),
                    vat_percent: None,
                },
            ],
            flags: Default::default(),
            created_at: None,
            updated_at: None,
        }
    }

    fn grocery_receipt() -> Receipt {
        Receipt {
            id: None,
            vendor: "REWE".to_string(),
            timestamp: Utc::now(),
            total_amount: dec!(45.67),
            tax_amount: dec!(7.32),
            currency: "EUR".to_string(),
            category: None,
            payment_method: None,
            receipt_number: None,
            image_ref: None,
            line_items: vec![
                LineItem {
                    id: None,
                    description: "Brot".to_string(),
                    quantity: 1,
                    unit_price: dec!(2.99),
                    line_total: dec!(2.99),
                    vat_percent: None,
                },
                LineItem {
                    id: None,
                    description: "Milch".to_string(),
                    quantity: 1,
                    unit_price: dec!(1.29),
                    line_total: dec!(1.29),
                    vat_percent: None,
                },
                LineItem {
                    id: None,
                    description: "Käse".to_string(),
                    quantity: 1,
                    unit_price: dec!(41.39),
                    line_total: dec!(41.39),
                    vat_percent: None,
                },
            ],
            flags: Default::default(),
            created_at: None,
            updated_at: None,
        }
    }

    async fn planner_with(receipts: Vec<Receipt>) -> (QueryPlanner, Vec<ReceiptId>) {
        let store = RelationalStore::open_in_memory().unwrap();
        let completion = Arc::new(StubCompletionClient::default());
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(completion.clone()));
        let mut ids = Vec::new();
        for mut receipt in receipts {
            receipt.flags = ledger_audit::evaluate(&receipt, &store).await.unwrap();
            let stored = store.insert_receipt(receipt).await.unwrap();
            index.add(stored.id.unwrap(), &stored).await.unwrap();
            ids.push(stored.id.unwrap());
        }
        (QueryPlanner::new(store, index, completion), ids)
    }

    #[tokio::test]
    async fn spend_on_alcohol_matches_literal_spec_scenario() {
        let (planner, ids) = planner_with(vec![grocery_receipt(), bar_receipt()]).await;
        let answer = planner.answer("how much did I spend on alcohol?").await.unwrap();
        assert_eq!(answer.numeric_total, Some(dec!(25.00)));
        assert_eq!(answer.source_count, 1);
        assert_eq!(answer.source_receipt_ids, vec![ids[1]]);
    }

    #[tokio::test]
    async fn empty_store_yields_no_matching_receipts() {
        let (planner, _ids) = planner_with(vec![]).await;
        let answer = planner.answer("how much did I spend on alcohol?").await.unwrap();
        assert_eq!(answer.numeric_total, Some(Decimal::ZERO));
        assert_eq!(answer.source_count, 0);
        assert!(answer.source_receipt_ids.is_empty());
        assert_eq!(answer.prose, "No matching receipts.");
    }

    #[tokio::test]
    async fn count_intent_counts_without_a_numeric_total() {
        let (planner, _ids) = planner_with(vec![grocery_receipt(), bar_receipt()]).await;
        let answer = planner.answer("how many receipts do I have?").await.unwrap();
        assert_eq!(answer.source_count, 2);
        assert_eq!(answer.numeric_total, None);
    }

    #[tokio::test]
    async fn sum_by_vendor_filters_to_matching_vendor_only() {
        let (planner, ids) = planner_with(vec![grocery_receipt(), bar_receipt()]).await;
        let answer = planner.answer("how much did I spend at rewe?").await.unwrap();
        assert_eq!(answer.numeric_total, Some(dec!(45.67)));
        assert_eq!(answer.source_receipt_ids, vec![ids[0]]);
    }

    #[tokio::test]
    async fn freeform_question_skips_aggregation() {
        let (planner, _ids) = planner_with(vec![grocery_receipt()]).await;
        let answer = planner.answer("what's the weather in Berlin?").await.unwrap();
        assert_eq!(answer.numeric_total, None);
    }
}

//! A narrow capability the Audit Engine needs from the Relational Store,
//! kept here so `ledger-audit` never depends on SQL directly.

use async_trait::async_trait;

use crate::error::LedgerResult;
use crate::models::Receipt;

/// Looks up receipts that could be duplicates of a candidate, by the rule in §4.3:
/// same normalized vendor, same calendar date, total within one minor unit.
#[async_trait]
pub trait DuplicateProbe: Send + Sync {
    /// Candidates matching `(vendor, calendar_date)`, excluding `exclude_id` if given.
    async fn find_same_day_same_vendor(
        &self,
        vendor_key: &str,
        date: chrono::NaiveDate,
        exclude_id: Option<i64>,
    ) -> LedgerResult<Vec<Receipt>>;
}

//! # ledger-audit
//!
//! The Audit Engine (§4.3): a pure, deterministic function from a receipt
//! (plus a duplicate probe over the store) to the four audit flags. Never
//! mutates state.

use rust_decimal::Decimal;

use ledger_core::{AuditFlags, DuplicateProbe, LedgerResult, Receipt};
use ledger_core::validate::MINOR_UNIT_TOLERANCE;

/// Substrings in a line-item description that mark a suspicious category,
/// matched case-insensitively (§4.3 rule 3).
pub const WATCHLIST_TERMS: &[&str] = &["alcohol", "wine", "beer", "spirits", "tobacco", "cigarette"];

/// Category values that are suspicious outright, matched case-insensitively.
pub const WATCHLIST_CATEGORIES: &[&str] = &["bar", "alcohol", "tobacco"];

/// True if a line-item description contains any watchlist term.
pub fn line_item_matches_watchlist(description: &str) -> bool {
    let desc = description.to_lowercase();
    WATCHLIST_TERMS.iter().any(|term| desc.contains(term))
}

/// True if `term` (e.g. a category name pulled from a question) names one of
/// the watchlist groups, so callers can decide to aggregate at line-item
/// granularity instead of by the receipt's `category` field.
pub fn is_watchlist_term(term: &str) -> bool {
    let lower = term.trim().to_lowercase();
    WATCHLIST_TERMS.contains(&lower.as_str()) || WATCHLIST_CATEGORIES.contains(&lower.as_str())
}

/// `tax_amount == 0`, or every line item has VAT percentage exactly zero
/// and the list is non-empty.
pub fn missing_vat(receipt: &Receipt) -> bool {
    if receipt.tax_amount == Decimal::ZERO {
        return true;
    }
    !receipt.line_items.is_empty()
        && receipt
            .line_items
            .iter()
            .all(|item| item.vat_percent == Some(Decimal::ZERO))
}

/// The sum of per-line totals, when the list is non-empty, differs from
/// `total_amount` (line totals are gross, tax-inclusive figures) by more
/// than one minor unit.
pub fn math_error(receipt: &Receipt) -> bool {
    if receipt.line_items.is_empty() {
        return false;
    }
    let line_sum: Decimal = receipt.line_items.iter().map(|item| item.line_total).sum();
    (line_sum - receipt.total_amount).abs() > MINOR_UNIT_TOLERANCE
}

/// A line-item description matches a watchlist term, or the category is one
/// of the watchlist categories.
pub fn suspicious_category(receipt: &Receipt) -> bool {
    if let Some(category) = &receipt.category {
        let category = category.trim().to_lowercase();
        if WATCHLIST_CATEGORIES.contains(&category.as_str()) {
            return true;
        }
    }
    receipt.line_items.iter().any(|item| {
        let desc = item.description.to_lowercase();
        WATCHLIST_TERMS.iter().any(|term| desc.contains(term))
    })
}

/// The store contains another receipt with the same normalized vendor, the
/// same calendar date, and a total within one minor unit. Self-match is
/// excluded by identifier.
pub async fn duplicate(receipt: &Receipt, probe: &dyn DuplicateProbe) -> LedgerResult<bool> {
    let vendor_key = ledger_core::normalize_vendor_key(&receipt.vendor);
    let candidates = probe
        .find_same_day_same_vendor(&vendor_key, receipt.calendar_date(), receipt.id)
        .await?;
    Ok(candidates
        .iter()
        .any(|other| (other.total_amount - receipt.total_amount).abs() <= MINOR_UNIT_TOLERANCE))
}

/// Evaluate all four flags for `receipt` against the current store state.
/// Pure aside from the duplicate probe's read-only query; never mutates
/// anything.
pub async fn evaluate(receipt: &Receipt, probe: &dyn DuplicateProbe) -> LedgerResult<AuditFlags> {
    Ok(AuditFlags {
        duplicate: duplicate(receipt, probe).await?,
        suspicious_category: suspicious_category(receipt),
        missing_vat: missing_vat(receipt),
        math_error: math_error(receipt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use ledger_core::LineItem;
    use rust_decimal_macros::dec;

    struct FakeProbe(Vec<Receipt>);

    #[async_trait]
    impl DuplicateProbe for FakeProbe {
        async fn find_same_day_same_vendor(
            &self,
            vendor_key: &str,
            date: NaiveDate,
            exclude_id: Option<i64>,
        ) -> LedgerResult<Vec<Receipt>> {
            Ok(self
                .0
                .iter()
                .filter(|r| ledger_core::normalize_vendor_key(&r.vendor) == vendor_key)
                .filter(|r| r.calendar_date() == date)
                .filter(|r| exclude_id.map(|ex| r.id != Some(ex)).unwrap_or(true))
                .cloned()
                .collect())
        }
    }

    fn base_receipt() -> Receipt {
        Receipt {
            id: Some(1),
            vendor: "REWE".to_string(),
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

    #[test]
    fn zero_tax_is_missing_vat() {
        let mut r = base_receipt();
        r.tax_amount = Decimal::ZERO;
        assert!(missing_vat(&r));
    }

    #[test]
    fn nonzero_tax_with_no_line_items_is_not_missing_vat() {
        assert!(!missing_vat(&base_receipt()));
    }

    #[test]
    fn math_error_detects_mismatched_line_sum() {
        let mut r = base_receipt();
        r.total_amount = dec!(30.00);
        r.tax_amount = dec!(4.75);
        r.line_items = vec![
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
        ];
        assert!(math_error(&r));
        assert!(suspicious_category(&r));
    }

    #[test]
    fn empty_line_items_never_math_error() {
        assert!(!math_error(&base_receipt()));
    }

    #[test]
    fn category_bar_is_suspicious() {
        let mut r = base_receipt();
        r.category = Some("Bar".to_string());
        assert!(suspicious_category(&r));
    }

    #[tokio::test]
    async fn duplicate_flag_true_when_store_has_matching_receipt() {
        let mut existing = base_receipt();
        existing.id = Some(99);
        let probe = FakeProbe(vec![existing]);

        let mut candidate = base_receipt();
        candidate.id = Some(1);
        assert!(duplicate(&candidate, &probe).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_flag_false_when_self_is_only_match() {
        let probe = FakeProbe(vec![base_receipt()]);
        assert!(!duplicate(&base_receipt(), &probe).await.unwrap());
    }
}

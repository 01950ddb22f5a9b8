//! Per-receipt metadata mapping and the equality-conjunction filter (§4.2).

use std::collections::HashMap;

use ledger_core::Receipt;

/// Metadata attached to one indexed document: vendor, category, total,
/// date, and the four audit flags, all as strings so a `Metadata` also
/// doubles as a filter (equality conjunction over these keys).
pub type Metadata = HashMap<String, String>;

pub fn build_metadata(receipt: &Receipt) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("vendor".to_string(), receipt.vendor.clone());
    meta.insert(
        "category".to_string(),
        receipt
            .category
            .clone()
            .unwrap_or_else(|| "uncategorized".to_string()),
    );
    meta.insert("total".to_string(), receipt.total_amount.to_string());
    meta.insert(
        "date".to_string(),
        receipt.timestamp.date_naive().to_string(),
    );
    meta.insert(
        "flag_duplicate".to_string(),
        receipt.flags.duplicate.to_string(),
    );
    meta.insert(
        "flag_suspicious_category".to_string(),
        receipt.flags.suspicious_category.to_string(),
    );
    meta.insert(
        "flag_missing_vat".to_string(),
        receipt.flags.missing_vat.to_string(),
    );
    meta.insert(
        "flag_math_error".to_string(),
        receipt.flags.math_error.to_string(),
    );
    meta
}

/// True if every key in `filter` is present in `meta` with an equal value.
pub fn matches_filter(meta: &Metadata, filter: &Metadata) -> bool {
    filter.iter().all(|(k, v)| meta.get(k) == Some(v))
}

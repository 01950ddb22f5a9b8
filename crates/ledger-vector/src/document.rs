//! The fixed document template embedded for each receipt (§4.2).

use ledger_core::Receipt;

/// Concatenate vendor, date, total, category, and every line-item
/// description into the string that gets embedded and indexed.
pub fn build_document_text(receipt: &Receipt) -> String {
    let date = receipt.timestamp.date_naive();
    let category = receipt.category.as_deref().unwrap_or("uncategorized");
    let descriptions = receipt
        .line_items
        .iter()
        .map(|item| item.description.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{vendor} | {date} | {total} {currency} | {category} | {descriptions}",
        vendor = receipt.vendor,
        total = receipt.total_amount,
        currency = receipt.currency,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_core::{AuditFlags, LineItem};
    use rust_decimal_macros::dec;

    #[test]
    fn document_includes_line_item_descriptions() {
        let receipt = Receipt {
            id: Some(1),
            vendor: "REWE".to_string(),
            timestamp: Utc::now(),
            total_amount: dec!(45.67),
            tax_amount: dec!(7.32),
            currency: "EUR".to_string(),
            category: Some("groceries".to_string()),
            payment_method: None,
            receipt_number: None,
            image_ref: None,
            line_items: vec![LineItem {
                id: None,
                description: "Brot".to_string(),
                quantity: 1,
                unit_price: dec!(2.99),
                line_total: dec!(2.99),
                vat_percent: None,
            }],
            flags: AuditFlags::default(),
            created_at: None,
            updated_at: None,
        };

        let doc = build_document_text(&receipt);
        assert!(doc.contains("REWE"));
        assert!(doc.contains("Brot"));
        assert!(doc.contains("groceries"));
    }
}

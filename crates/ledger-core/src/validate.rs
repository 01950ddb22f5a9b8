//! Field-level constraint checking for receipts (§3 invariants).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{LineItem, Receipt};

/// The rounding tolerance for arithmetic checks: one currency minor unit.
pub const MINOR_UNIT_TOLERANCE: Decimal = dec!(0.01);

/// A single validation failure with a field path, mirroring the
/// field-path + message shape used for invoice validation in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a receipt against §3's invariants. Returns every violation found,
/// not just the first.
pub fn validate_receipt(receipt: &Receipt) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if receipt.vendor.trim().is_empty() {
        errors.push(ValidationError::new("vendor", "vendor must not be empty"));
    }

    if receipt.total_amount < Decimal::ZERO {
        errors.push(ValidationError::new(
            "total_amount",
            "total amount must be non-negative",
        ));
    }

    if receipt.tax_amount < Decimal::ZERO {
        errors.push(ValidationError::new(
            "tax_amount",
            "tax amount must be non-negative",
        ));
    }

    if receipt.total_amount < receipt.tax_amount {
        errors.push(ValidationError::new(
            "total_amount",
            "total amount must be greater than or equal to tax amount",
        ));
    }

    if receipt.currency.trim().len() != 3 {
        errors.push(ValidationError::new(
            "currency",
            "currency must be a three-letter code",
        ));
    }

    for (idx, item) in receipt.line_items.iter().enumerate() {
        validate_line_item(idx, item, &mut errors);
    }

    errors
}

fn validate_line_item(idx: usize, item: &LineItem, errors: &mut Vec<ValidationError>) {
    let field = |suffix: &str| format!("line_items[{idx}].{suffix}");

    if item.description.trim().is_empty() {
        errors.push(ValidationError::new(
            field("description"),
            "description must not be empty",
        ));
    }

    if item.quantity == 0 {
        errors.push(ValidationError::new(
            field("quantity"),
            "quantity must be a positive integer",
        ));
    }

    if item.unit_price < Decimal::ZERO {
        errors.push(ValidationError::new(
            field("unit_price"),
            "unit price must be non-negative",
        ));
    }

    if item.line_total < Decimal::ZERO {
        errors.push(ValidationError::new(
            field("line_total"),
            "line total must be non-negative",
        ));
    }

    if let Some(vat) = item.vat_percent {
        if vat < Decimal::ZERO || vat > dec!(100) {
            errors.push(ValidationError::new(
                field("vat_percent"),
                "VAT percentage must be between 0 and 100",
            ));
        }
    }

    let expected = Decimal::from(item.quantity) * item.unit_price;
    if (expected - item.line_total).abs() > MINOR_UNIT_TOLERANCE {
        errors.push(ValidationError::new(
            field("line_total"),
            format!(
                "quantity * unit_price ({expected}) does not match line_total ({}) within tolerance",
                item.line_total
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_receipt() -> Receipt {
        Receipt {
            id: None,
            vendor: "REWE".to_string(),
            timestamp: Utc::now(),
            total_amount: dec!(10.00),
            tax_amount: dec!(1.00),
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
    fn empty_line_items_is_legal() {
        assert!(validate_receipt(&base_receipt()).is_empty());
    }

    #[test]
    fn total_below_tax_is_rejected() {
        let mut r = base_receipt();
        r.tax_amount = dec!(20.00);
        let errors = validate_receipt(&r);
        assert!(errors.iter().any(|e| e.field == "total_amount"));
    }

    #[test]
    fn line_total_mismatch_is_rejected() {
        let mut r = base_receipt();
        r.line_items.push(LineItem {
            id: None,
            description: "Widget".to_string(),
            quantity: 2,
            unit_price: dec!(3.00),
            line_total: dec!(9.00),
            vat_percent: None,
        });
        let errors = validate_receipt(&r);
        assert!(errors.iter().any(|e| e.field.contains("line_total")));
    }

    #[test]
    fn line_total_within_tolerance_is_legal() {
        let mut r = base_receipt();
        r.line_items.push(LineItem {
            id: None,
            description: "Widget".to_string(),
            quantity: 3,
            unit_price: dec!(3.005),
            line_total: dec!(9.02),
            vat_percent: None,
        });
        assert!(validate_receipt(&r).is_empty());
    }
}

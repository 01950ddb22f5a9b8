//! Receipt and line-item domain types (§3 of the spec).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stable identifier assigned on ingest, monotonic within the store.
pub type ReceiptId = i64;

/// Stable identifier for a line item, monotonic within its parent receipt.
pub type LineItemId = i64;

/// The configured local currency when a receipt doesn't specify one.
pub const DEFAULT_CURRENCY: &str = "EUR";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_quantity() -> u32 {
    1
}

/// The four independent audit flags, recomputed on every write.
///
/// These are a derived cache: for any stored receipt they must equal the
/// Audit Engine's output on that receipt. Never set by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFlags {
    pub duplicate: bool,
    pub suspicious_category: bool,
    pub missing_vat: bool,
    pub math_error: bool,
}

impl AuditFlags {
    /// True if at least one flag is set.
    pub fn any(&self) -> bool {
        self.duplicate || self.suspicious_category || self.missing_vat || self.math_error
    }
}

/// One row inside a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub id: Option<LineItemId>,
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    #[serde(default)]
    pub vat_percent: Option<Decimal>,
}

/// The primary entity: one purchase event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub id: Option<ReceiptId>,
    pub vendor: String,
    pub timestamp: DateTime<Utc>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub flags: AuditFlags,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Trim and collapse whitespace in the vendor name in place, as §3 requires.
    pub fn normalize(&mut self) {
        self.vendor = normalize_whitespace(&self.vendor);
    }

    /// The calendar date this receipt falls on, used by duplicate detection.
    pub fn calendar_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Trim a string and collapse internal whitespace runs to single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive, whitespace-normalized vendor key used for duplicate matching.
///
/// `"  REWE  "` and `"rewe"` must compare equal.
pub fn normalize_vendor_key(s: &str) -> String {
    normalize_whitespace(s).to_lowercase()
}

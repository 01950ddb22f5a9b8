//! Wire shapes for `/api/receipts` and `/api/ingest` (§6, §8 scenario 1):
//! the external JSON shape (`date`/`total`/`tax`/`items`/`desc`/`amount`)
//! differs from the internal `Receipt`/`LineItem` field names, so requests
//! and responses pass through one conversion stage here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledger_core::{AuditFlags, LineItem, Receipt, ReceiptId};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestLineItemRequest {
    pub desc: String,
    pub amount: Decimal,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub vat_percent: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub vendor: String,
    pub date: DateTime<Utc>,
    pub total: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub items: Vec<IngestLineItemRequest>,
}

impl From<IngestRequest> for Receipt {
    fn from(req: IngestRequest) -> Self {
        let line_items = req
            .items
            .into_iter()
            .map(|item| {
                let quantity = item.quantity.unwrap_or(1);
                LineItem {
                    id: None,
                    description: item.desc,
                    quantity,
                    unit_price: item.amount,
                    line_total: item.amount,
                    vat_percent: item.vat_percent,
                }
            })
            .collect();

        Receipt {
            id: None,
            vendor: req.vendor,
            timestamp: req.date,
            total_amount: req.total,
            tax_amount: req.tax,
            currency: req.currency.unwrap_or_else(|| ledger_core::DEFAULT_CURRENCY.to_string()),
            category: req.category,
            payment_method: req.payment_method,
            receipt_number: req.receipt_number,
            image_ref: None,
            line_items,
            flags: AuditFlags::default(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResponse {
    pub id: Option<i64>,
    pub desc: String,
    pub quantity: u32,
    pub amount: Decimal,
    pub vat_percent: Option<Decimal>,
}

impl From<&LineItem> for LineItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id,
            desc: item.description.clone(),
            quantity: item.quantity,
            amount: item.line_total,
            vat_percent: item.vat_percent,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub id: ReceiptId,
    pub vendor: String,
    pub date: DateTime<Utc>,
    pub total: Decimal,
    pub tax: Decimal,
    pub currency: String,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub receipt_number: Option<String>,
    pub image_ref: Option<String>,
    pub items: Vec<LineItemResponse>,
    pub flags: AuditFlags,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Receipt> for ReceiptResponse {
    fn from(receipt: &Receipt) -> Self {
        Self {
            id: receipt.id.unwrap_or_default(),
            vendor: receipt.vendor.clone(),
            date: receipt.timestamp,
            total: receipt.total_amount,
            tax: receipt.tax_amount,
            currency: receipt.currency.clone(),
            category: receipt.category.clone(),
            payment_method: receipt.payment_method.clone(),
            receipt_number: receipt.receipt_number.clone(),
            image_ref: receipt.image_ref.clone(),
            items: receipt.line_items.iter().map(LineItemResponse::from).collect(),
            flags: receipt.flags,
            created_at: receipt.created_at,
            updated_at: receipt.updated_at,
        }
    }
}

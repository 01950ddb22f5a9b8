//! The Extractor (§4.4): turns a receipt image into a candidate `Receipt`
//! plus a confidence classification, by calling the vision completion model
//! and running its output through the JSON repair and coercion pipeline.

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

use ledger_completion::{CompletionClient, CompletionError};
use ledger_core::{LineItem, Receipt};

use crate::coercion::{coerce_decimal, coerce_timestamp};
use crate::repair::try_parse_json;

/// How much of the extracted record could be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Every field the model reported parsed and coerced cleanly.
    Ok,
    /// The required fields (vendor, total) are present, but something else
    /// was missing or had to be defaulted.
    Partial,
    /// The response wasn't recoverable JSON, or a required field is absent.
    Failed,
}

/// The full result of one extraction attempt, including the raw model
/// output so a caller can log or display it when confidence is imperfect.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub receipt: Option<Receipt>,
    pub confidence: Confidence,
    pub raw_model_output: String,
    /// Hex-encoded SHA-256 of the original image bytes, for debugging a
    /// failed extraction without re-transmitting the image (§7).
    pub checksum: String,
}

const SCHEMA_PROMPT: &str = r#"You are extracting a structured receipt record from an image of a purchase receipt.

Respond with a single JSON object and nothing else — no prose, no markdown fences. The object must have these fields:

{
  "vendor": string,
  "date": string (ISO-8601 date or date-time),
  "total": string or number,
  "tax": string or number (optional, omit if not shown),
  "currency": string (optional, 3-letter code),
  "category": string (optional),
  "payment_method": string (optional),
  "receipt_number": string (optional),
  "items": [
    {
      "description": string,
      "quantity": number (optional, default 1),
      "unit_price": string or number,
      "line_total": string or number,
      "vat_percent": string or number (optional)
    }
  ]
}

"vendor" and "total" are required. If you cannot read a field, omit it rather than guessing."#;

fn checksum_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

fn coerce_line_item(value: &Value) -> Option<LineItem> {
    let description = value.get("description")?.as_str()?.to_string();
    let unit_price = coerce_decimal(value.get("unit_price")?)?;
    let line_total = value
        .get("line_total")
        .and_then(coerce_decimal)
        .unwrap_or(unit_price);
    let quantity = value
        .get("quantity")
        .and_then(|v| v.as_u64())
        .map(|q| q as u32)
        .unwrap_or(1);
    let vat_percent = value.get("vat_percent").and_then(coerce_decimal);
    Some(LineItem {
        id: None,
        description,
        quantity,
        unit_price,
        line_total,
        vat_percent,
    })
}

/// Build a `Receipt` plus confidence from the repaired JSON value. Returns
/// `None` only when `vendor` or `total` is missing (§4.4 step (e)).
fn coerce_to_receipt(value: &Value) -> Option<(Receipt, Confidence)> {
    let vendor = value.get("vendor")?.as_str()?.trim().to_string();
    if vendor.is_empty() {
        return None;
    }
    let total_amount = coerce_decimal(value.get("total")?)?;

    let mut confidence = Confidence::Ok;

    let timestamp = value
        .get("date")
        .and_then(coerce_timestamp)
        .unwrap_or_else(|| {
            confidence = Confidence::Partial;
            Utc::now()
        });

    let tax_amount = match value.get("tax") {
        Some(v) => coerce_decimal(v).unwrap_or_else(|| {
            confidence = Confidence::Partial;
            Default::default()
        }),
        None => Default::default(),
    };

    let currency = value
        .get("currency")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ledger_core::DEFAULT_CURRENCY.to_string());

    let category = value
        .get("category")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let payment_method = value
        .get("payment_method")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let receipt_number = value
        .get("receipt_number")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let line_items = match value.get("items").and_then(|v| v.as_array()) {
        Some(raw_items) => {
            let mut items = Vec::with_capacity(raw_items.len());
            for raw in raw_items {
                match coerce_line_item(raw) {
                    Some(item) => items.push(item),
                    None => confidence = Confidence::Partial,
                }
            }
            items
        }
        None => Vec::new(),
    };

    let mut receipt = Receipt {
        id: None,
        vendor,
        timestamp,
        total_amount,
        tax_amount,
        currency,
        category,
        payment_method,
        receipt_number,
        image_ref: None,
        line_items,
        flags: Default::default(),
        created_at: None,
        updated_at: None,
    };
    receipt.normalize();

    Some((receipt, confidence))
}

/// Drives one extraction attempt against a completion client.
pub struct Extractor<'a> {
    client: &'a dyn CompletionClient,
}

impl<'a> Extractor<'a> {
    pub fn new(client: &'a dyn CompletionClient) -> Self {
        Self { client }
    }

    /// Call the vision model, repair and coerce its JSON response, and
    /// classify confidence. Only a transport-level failure (timeout,
    /// connection error, non-2xx upstream status) returns `Err`; an
    /// unparseable or incomplete response is reported as `Confidence::Failed`
    /// rather than an error, so callers decide how to react.
    pub async fn extract(
        &self,
        image: &[u8],
        mime: &str,
    ) -> Result<ExtractionOutcome, CompletionError> {
        let raw_model_output = self.client.vision_complete(SCHEMA_PROMPT, image, mime).await?;
        let checksum = checksum_hex(image);

        let outcome = match try_parse_json(&raw_model_output).and_then(|v| coerce_to_receipt(&v)) {
            Some((receipt, confidence)) => ExtractionOutcome {
                receipt: Some(receipt),
                confidence,
                raw_model_output,
                checksum,
            },
            None => ExtractionOutcome {
                receipt: None,
                confidence: Confidence::Failed,
                raw_model_output,
                checksum,
            },
        };
        Ok(outcome)
    }
}

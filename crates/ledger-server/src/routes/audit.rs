//! `GET /api/audit` (§6): receipts with at least one flag, grouped by flag
//! kind. A receipt with multiple flags appears in every matching group.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use ledger_core::LedgerError;
use ledger_store::ReceiptFilter;

use crate::app_state::AppState;
use crate::dto::ReceiptResponse;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    pub duplicate: Vec<ReceiptResponse>,
    pub suspicious_category: Vec<ReceiptResponse>,
    pub missing_vat: Vec<ReceiptResponse>,
    pub math_error: Vec<ReceiptResponse>,
}

pub async fn audit(State(state): State<AppState>) -> ApiResult<Json<AuditResponse>> {
    let filter = ReceiptFilter {
        flagged_only: true,
        ..Default::default()
    };
    let flagged = state
        .ingestor
        .store()
        .list_receipts(filter)
        .await
        .map_err(LedgerError::from)?;

    let mut response = AuditResponse {
        duplicate: Vec::new(),
        suspicious_category: Vec::new(),
        missing_vat: Vec::new(),
        math_error: Vec::new(),
    };
    for receipt in &flagged {
        if receipt.flags.duplicate {
            response.duplicate.push(ReceiptResponse::from(receipt));
        }
        if receipt.flags.suspicious_category {
            response.suspicious_category.push(ReceiptResponse::from(receipt));
        }
        if receipt.flags.missing_vat {
            response.missing_vat.push(ReceiptResponse::from(receipt));
        }
        if receipt.flags.math_error {
            response.math_error.push(ReceiptResponse::from(receipt));
        }
    }
    Ok(Json(response))
}

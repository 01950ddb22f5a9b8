//! `GET /api/receipts`, `POST /api/ingest`, `POST /api/ingest/db` (§6).

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use ledger_core::LedgerError;
use ledger_store::ReceiptFilter;

use crate::app_state::AppState;
use crate::dto::{IngestRequest, ReceiptResponse};
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReceiptsQuery {
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub receipt_id: Option<i64>,
}

pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<ListReceiptsQuery>,
) -> ApiResult<Json<Vec<ReceiptResponse>>> {
    if let Some(id) = query.receipt_id {
        let receipt = state
            .ingestor
            .store()
            .get_receipt(id)
            .await
            .map_err(LedgerError::from)?
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {id}")))?;
        return Ok(Json(vec![ReceiptResponse::from(&receipt)]));
    }

    let filter = ReceiptFilter {
        vendor: query.vendor,
        category: query.category,
        start_date: query.start_date,
        end_date: query.end_date,
        flagged_only: false,
    };
    let receipts = state
        .ingestor
        .store()
        .list_receipts(filter)
        .await
        .map_err(LedgerError::from)?;
    Ok(Json(receipts.iter().map(ReceiptResponse::from).collect()))
}

pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> ApiResult<Json<ReceiptResponse>> {
    let receipt = state.ingestor.ingest(req.into()).await?;
    Ok(Json(ReceiptResponse::from(&receipt)))
}

//! `GET /api/analytics/{summary,monthly,categories,vendors}` (§6).

use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

use ledger_core::LedgerError;
use ledger_store::{AmountTotal, ReceiptFilter};

use crate::app_state::AppState;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    pub total: Decimal,
}

impl From<AmountTotal> for Bucket {
    fn from(bucket: AmountTotal) -> Self {
        Self {
            name: bucket.name,
            total: bucket.total,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub receipt_count: usize,
    pub total_amount: Decimal,
    pub tax_total: Decimal,
    pub average_amount: Decimal,
    pub monthly: Vec<Bucket>,
    pub categories: Vec<Bucket>,
    pub vendors: Vec<Bucket>,
}

pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<SummaryResponse>> {
    let store = state.ingestor.store();
    let receipts = store
        .list_receipts(ReceiptFilter::default())
        .await
        .map_err(LedgerError::from)?;

    let receipt_count = receipts.len();
    let total_amount: Decimal = receipts.iter().map(|r| r.total_amount).sum();
    let tax_total: Decimal = receipts.iter().map(|r| r.tax_amount).sum();
    let average_amount = if receipt_count == 0 {
        Decimal::ZERO
    } else {
        total_amount / Decimal::from(receipt_count as u64)
    };

    let monthly = store.monthly_totals().await.map_err(LedgerError::from)?;
    let categories = store.category_totals().await.map_err(LedgerError::from)?;
    let vendors = store.vendor_totals().await.map_err(LedgerError::from)?;

    Ok(Json(SummaryResponse {
        receipt_count,
        total_amount,
        tax_total,
        average_amount,
        monthly: monthly.into_iter().map(Bucket::from).collect(),
        categories: categories.into_iter().map(Bucket::from).collect(),
        vendors: vendors.into_iter().map(Bucket::from).collect(),
    }))
}

pub async fn monthly(State(state): State<AppState>) -> ApiResult<Json<Vec<Bucket>>> {
    let totals = state
        .ingestor
        .store()
        .monthly_totals()
        .await
        .map_err(LedgerError::from)?;
    Ok(Json(totals.into_iter().map(Bucket::from).collect()))
}

pub async fn categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Bucket>>> {
    let totals = state
        .ingestor
        .store()
        .category_totals()
        .await
        .map_err(LedgerError::from)?;
    Ok(Json(totals.into_iter().map(Bucket::from).collect()))
}

pub async fn vendors(State(state): State<AppState>) -> ApiResult<Json<Vec<Bucket>>> {
    let totals = state
        .ingestor
        .store()
        .vendor_totals()
        .await
        .map_err(LedgerError::from)?;
    Ok(Json(totals.into_iter().map(Bucket::from).collect()))
}

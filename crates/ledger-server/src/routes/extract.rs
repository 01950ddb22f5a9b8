//! `POST /api/extract`, `POST /api/extract/upload` (§6, §4.4): drive the
//! Extractor against the configured vision model and write through the
//! Ingestor on anything better than `Confidence::Failed`.

use axum::extract::{Multipart, State};
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use ledger_core::LedgerError;
use ledger_extract::{Confidence, Extractor};

use crate::app_state::AppState;
use crate::dto::ReceiptResponse;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub image: String,
    pub mime: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub confidence: &'static str,
    pub receipt: ReceiptResponse,
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Ok => "ok",
        Confidence::Partial => "partial",
        Confidence::Failed => "failed",
    }
}

async fn run_extraction(state: &AppState, image: &[u8], mime: &str) -> ApiResult<ExtractResponse> {
    let extractor = Extractor::new(state.completion.as_ref());
    let outcome = extractor.extract(image, mime).await.map_err(LedgerError::from)?;

    match outcome.receipt {
        Some(receipt) if outcome.confidence != Confidence::Failed => {
            let stored = state.ingestor.ingest(receipt).await?;
            Ok(ExtractResponse {
                confidence: confidence_label(outcome.confidence),
                receipt: ReceiptResponse::from(&stored),
            })
        }
        _ => Err(LedgerError::ExtractionFailed(format!(
            "vision model output was not recoverable (checksum {})",
            outcome.checksum
        ))
        .into()),
    }
}

pub async fn extract_base64(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> ApiResult<Json<ExtractResponse>> {
    let bytes = STANDARD
        .decode(req.image.as_bytes())
        .map_err(|e| LedgerError::Validation(format!("invalid base64 image: {e}")))?;
    Ok(Json(run_extraction(&state, &bytes, &req.mime).await?))
}

pub async fn extract_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ExtractResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| LedgerError::Validation(format!("invalid multipart body: {e}")))?
    {
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| LedgerError::Validation(format!("could not read upload: {e}")))?;
        return Ok(Json(run_extraction(&state, &bytes, &mime).await?));
    }
    Err(LedgerError::Validation("multipart body carried no file field".to_string()).into())
}

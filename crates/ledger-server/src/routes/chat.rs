//! `POST /api/chat/query`, `POST /api/chat` (§6, §4.6): the two Query
//! Planner entry points — a structured answer with a verifiable numeric
//! total and source list, and a looser prose-only chat surface.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use ledger_core::ReceiptId;

use crate::app_state::AppState;
use crate::dto::ReceiptResponse;
use crate::error::ApiResult;

/// Chat history is bounded to the last 10 turns (§6); older turns are
/// dropped before being folded into the question sent to the planner.
const MAX_HISTORY_TURNS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ChatQueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQueryResponse {
    pub answer: String,
    pub total_amount: Option<rust_decimal::Decimal>,
    pub count: usize,
    pub receipt_ids: Vec<ReceiptId>,
    pub receipts: Vec<ReceiptResponse>,
}

pub async fn chat_query(
    State(state): State<AppState>,
    Json(req): Json<ChatQueryRequest>,
) -> ApiResult<Json<ChatQueryResponse>> {
    let answer = state.planner.answer(&req.query).await?;

    let receipts = state
        .planner
        .fetch_many(&answer.source_receipt_ids)
        .await?;

    Ok(Json(ChatQueryResponse {
        answer: answer.prose,
        total_amount: answer.numeric_total,
        count: answer.source_count,
        receipt_ids: answer.source_receipt_ids,
        receipts: receipts.iter().map(ReceiptResponse::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

/// Prose-only variant. History only informs the question actually sent to
/// the planner (prefixed as context); the planner itself is stateless, per
/// §4.6 — only the most recent turns bound the size of that prefix.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let recent = if req.history.len() > MAX_HISTORY_TURNS {
        &req.history[req.history.len() - MAX_HISTORY_TURNS..]
    } else {
        &req.history[..]
    };

    let question = if recent.is_empty() {
        req.message.clone()
    } else {
        let context = recent
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{context}\nuser: {}", req.message)
    };

    let answer = state.planner.answer(&question).await?;
    Ok(Json(ChatResponse { answer: answer.prose }))
}

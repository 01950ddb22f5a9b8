//! `GET /api/health` (§6): liveness of the completion service and the
//! vector index. Neither probe is allowed to panic or fail the request —
//! an unreachable dependency is reported, not propagated as an error.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    completion_service: bool,
    vector_index: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let completion_service = state.completion.health().await;
    let vector_index = state
        .index
        .search("", 1, &Default::default())
        .await
        .is_ok();

    Json(HealthResponse {
        completion_service,
        vector_index,
    })
}

//! `POST /api/maintenance/recompute-audit` (§9, SPEC_FULL §4.1): the
//! "recompute all" hook, also exposed as the `--recompute-audit` CLI
//! subcommand in `main.rs`.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    pub changed: usize,
}

pub async fn recompute_audit(State(state): State<AppState>) -> ApiResult<Json<RecomputeResponse>> {
    let changed = state.ingestor.recompute_audit_flags().await?;
    Ok(Json(RecomputeResponse { changed }))
}

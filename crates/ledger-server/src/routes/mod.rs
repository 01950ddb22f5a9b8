//! Route modules and the top-level `Router` assembly, following
//! `datasynth-server`'s `rest` module split.

pub mod analytics;
pub mod audit;
pub mod chat;
pub mod extract;
pub mod health;
pub mod maintenance;
pub mod receipts;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/receipts", get(receipts::list_receipts))
        .route("/api/ingest", post(receipts::ingest))
        .route("/api/ingest/db", post(receipts::ingest))
        .route("/api/extract", post(extract::extract_base64))
        .route("/api/extract/upload", post(extract::extract_upload))
        .route("/api/audit", get(audit::audit))
        .route("/api/analytics/summary", get(analytics::summary))
        .route("/api/analytics/monthly", get(analytics::monthly))
        .route("/api/analytics/categories", get(analytics::categories))
        .route("/api/analytics/vendors", get(analytics::vendors))
        .route("/api/chat/query", post(chat::chat_query))
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/maintenance/recompute-audit",
            post(maintenance::recompute_audit),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

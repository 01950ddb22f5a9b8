//! Maps the shared `LedgerError` taxonomy onto HTTP status codes and the
//! `{error: {kind, message}}` error body (§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ledger_core::LedgerError;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub LedgerError);

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        LedgerError::UpstreamUnavailable(_)
        | LedgerError::StoreFailure(_)
        | LedgerError::IndexFailure(_)
        | LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.0.kind(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

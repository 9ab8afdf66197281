pub mod metrics;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::history::StoreError;
use crate::sampler::SampleError;

pub const SAMPLING_FAILED: &str = "failed to collect metrics";
pub const HISTORY_FAILED: &str = "failed to load metric history";

// ─── Unified error type ──────────────────────────────────────────

/// Provider and store failures reach the caller only as a generic
/// message; the cause goes to the log.
#[derive(Debug)]
pub enum AppError {
    Sampling(SampleError),
    History(StoreError),
}

impl From<SampleError> for AppError {
    fn from(e: SampleError) -> Self {
        Self::Sampling(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        Self::History(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Sampling(e) => {
                error!(error = %e, "sampling failed");
                SAMPLING_FAILED
            }
            Self::History(e) => {
                error!(error = %e, "history query failed");
                HISTORY_FAILED
            }
        };

        let body = serde_json::json!({ "error": message });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

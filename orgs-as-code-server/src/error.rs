use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::events::EventDecodeError;
use crate::pipeline::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid webhook signature")]
    Signature,

    #[error("missing X-GitHub-Event header")]
    MissingEvent,

    #[error(transparent)]
    Decode(#[from] EventDecodeError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AppError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Signature => StatusCode::UNAUTHORIZED,
            Self::MissingEvent | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(error = %self, "webhook delivery failed");
        } else {
            tracing::warn!(error = %self, "webhook delivery rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

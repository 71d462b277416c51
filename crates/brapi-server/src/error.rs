//! Server-specific error types

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use brapi_ingest::IngestError;
use thiserror::Error;

use crate::api::response::ApiResponse;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ingest(IngestError::DuplicateStudy(_)) => StatusCode::CONFLICT,
            AppError::Ingest(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
            AppError::Ingest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart(e) => e.status(),
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(error = ?self, "Upload failed");
            match self {
                AppError::Ingest(IngestError::StorageWrite { ref study_db_id, .. }) => {
                    format!("Failed to store study '{}'", study_db_id)
                },
                AppError::Ingest(IngestError::FileIo { .. }) => {
                    "Failed to store the uploaded file".to_string()
                },
                _ => "An internal error occurred".to_string(),
            }
        } else {
            tracing::warn!(error = %self, "Upload rejected");
            self.to_string()
        };

        (status, Json(ApiResponse::error(message))).into_response()
    }
}

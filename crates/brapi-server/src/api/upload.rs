//! `POST /brapi/v2/upload`

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use super::response::ApiResponse;
use crate::{error::AppError, AppState};

/// Multipart field carrying the VCF
pub const FILE_FIELD: &str = "file";

/// Accept a VCF upload and ingest it within the request
pub async fn upload_vcf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Upload field 'file' has no filename".into()))?;
        let bytes = field.bytes().await?;

        info!(filename = %filename, size = bytes.len(), "Received VCF upload");

        let report = state.pipeline.ingest_upload(&filename, bytes).await?;
        let datafiles = vec![json!({
            "fileURL": report.file_url,
            "fileName": filename,
        })];
        let message = format!(
            "Ingested {} variants for study {}",
            report.variant_count, report.study_db_id
        );

        return Ok((
            StatusCode::CREATED,
            Json(ApiResponse::info(report, message).with_datafiles(datafiles)),
        ));
    }

    Err(AppError::BadRequest(format!(
        "Multipart field '{}' is required",
        FILE_FIELD
    )))
}

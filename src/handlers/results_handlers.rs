//! HTTP handlers for report and raw log uploads and downloads.
//!
//! Upload bodies are taken as raw bytes and decoded by the validator, so a
//! malformed body is a 400 like any other rejected upload.

use crate::{
    errors::AppError,
    models::payload::{RawPayload, ReportPayload},
    services::{artifact_store::ArtifactStore, validator},
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;

/// 201 Created with the artifact link in `Location`.
fn created(link: &str) -> Result<Response, AppError> {
    let location = HeaderValue::from_str(link)
        .map_err(|err| AppError::bad_request(format!("link `{}` is not a valid header: {}", link, err)))?;
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
}

/// `POST /v1/report`
pub async fn upload_report(
    State(artifacts): State<ArtifactStore>,
    body: Bytes,
) -> Result<Response, AppError> {
    let payload: ReportPayload = validator::parse_payload(&body)?;
    info!(
        scan_id = ?payload.scan_id,
        check_id = ?payload.check_id,
        scan_started_at = ?payload.scan_start_time,
        "Uploading report"
    );

    let (identity, artifact) = validator::validate_report(payload)?;
    let link = artifacts.save_report(&identity, &artifact).await?;

    info!(link = %link, vulnerable = artifact.is_vulnerable(), "Report uploaded");
    created(&link)
}

/// `POST /v1/raw`
pub async fn upload_raw(
    State(artifacts): State<ArtifactStore>,
    body: Bytes,
) -> Result<Response, AppError> {
    let payload: RawPayload = validator::parse_payload(&body)?;
    info!(
        scan_id = ?payload.scan_id,
        check_id = ?payload.check_id,
        scan_started_at = ?payload.scan_start_time,
        "Uploading raw logs"
    );

    let (identity, artifact) = validator::validate_raw(payload)?;
    let link = artifacts.save_log(&identity, &artifact).await?;

    info!(link = %link, size = artifact.payload.len(), "Raw logs uploaded");
    created(&link)
}

/// `GET /v1/reports/{date}/{scan}/{check}`
pub async fn download_report(
    State(artifacts): State<ArtifactStore>,
    Path((date, scan, check)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    info!(date = %date, scan = %scan, check = %check, "Downloading report");
    let content = artifacts.get_report(&date, &scan, &check).await?;
    info!("Report downloaded");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        content,
    )
        .into_response())
}

/// `GET /v1/logs/{date}/{scan}/{check}`
pub async fn download_log(
    State(artifacts): State<ArtifactStore>,
    Path((date, scan, check)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    info!(date = %date, scan = %scan, check = %check, "Downloading log");
    let content = artifacts.get_log(&date, &scan, &check).await?;
    info!("Log downloaded");

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        )],
        content,
    )
        .into_response())
}

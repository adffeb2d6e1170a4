//! Ingestion validation for reports and raw logs.
//!
//! Validation never touches storage: a payload is either turned into a
//! `(ScanIdentity, artifact)` pair or rejected with a [`ValidationError`].

use crate::models::{
    artifact::{LogArtifact, ReportArtifact},
    payload::{RawPayload, ReportPayload},
    report::Report,
    scan::ScanIdentity,
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required parameters: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("raw payload is missing")]
    MissingPayload,
    #[error("malformed request payload: {0}")]
    MalformedPayload(String),
    #[error("the report can not be parsed: {0}")]
    Unparseable(String),
    #[error("the raw payload is not valid base64: {0}")]
    BadEncoding(#[from] base64::DecodeError),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Decode a JSON request body into one of the payload types.
pub fn parse_payload<T: DeserializeOwned>(body: &[u8]) -> ValidationResult<T> {
    serde_json::from_slice(body).map_err(|err| ValidationError::MalformedPayload(err.to_string()))
}

/// Collect the names of absent fields, logging each one.
fn missing_fields(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| {
            error!(field = name, "{} is missing", name);
            *name
        })
        .collect()
}

/// Validate a report upload, parse the report and classify it.
pub fn validate_report(payload: ReportPayload) -> ValidationResult<(ScanIdentity, ReportArtifact)> {
    let missing = missing_fields(&[
        ("check_id", payload.check_id.is_some()),
        ("scan_id", payload.scan_id.is_some()),
        ("scan_start_time", payload.scan_start_time.is_some()),
        ("report", payload.report.is_some()),
    ]);

    let (Some(check_id), Some(scan_id), Some(started_at), Some(raw_report)) = (
        payload.check_id,
        payload.scan_id,
        payload.scan_start_time,
        payload.report,
    ) else {
        return Err(ValidationError::MissingFields(missing));
    };

    let report =
        Report::parse(&raw_report).map_err(|err| ValidationError::Unparseable(err.to_string()))?;
    let raw_json = report
        .to_normalized_json()
        .map_err(|err| ValidationError::Unparseable(err.to_string()))?;

    let identity = ScanIdentity::new(scan_id.to_string(), check_id.to_string(), started_at);
    let artifact = ReportArtifact {
        raw_json,
        vulnerability_count: report.vulnerability_count(),
    };
    Ok((identity, artifact))
}

/// Validate a raw log upload and decode its base64 payload.
///
/// An absent `raw` field is logged and then rejected: there is nothing to
/// store and an empty object is never written in its place.
pub fn validate_raw(payload: RawPayload) -> ValidationResult<(ScanIdentity, LogArtifact)> {
    if payload.raw.is_none() {
        info!("raw is missing");
    }

    let missing = missing_fields(&[
        ("check_id", payload.check_id.is_some()),
        ("scan_id", payload.scan_id.is_some()),
        ("scan_start_time", payload.scan_start_time.is_some()),
    ]);

    let (Some(check_id), Some(scan_id), Some(started_at)) =
        (payload.check_id, payload.scan_id, payload.scan_start_time)
    else {
        return Err(ValidationError::MissingFields(missing));
    };

    let raw = payload.raw.ok_or(ValidationError::MissingPayload)?;
    let decoded = general_purpose::STANDARD.decode(raw)?;

    let identity = ScanIdentity::new(scan_id.to_string(), check_id.to_string(), started_at);
    Ok((
        identity,
        LogArtifact {
            payload: Bytes::from(decoded),
        },
    ))
}

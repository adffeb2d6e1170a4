//! Inbound request bodies for `POST /v1/report` and `POST /v1/raw`.
//!
//! Every field is optional at the serde level so that the validator can report
//! all missing fields at once instead of failing on the first one.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Body of `POST /v1/report`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportPayload {
    pub check_id: Option<Uuid>,
    pub scan_id: Option<Uuid>,
    pub scan_start_time: Option<DateTime<Utc>>,

    /// The check report, a JSON document serialized as a string.
    pub report: Option<String>,
}

/// Body of `POST /v1/raw`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPayload {
    pub check_id: Option<Uuid>,
    pub scan_id: Option<Uuid>,
    pub scan_start_time: Option<DateTime<Utc>>,

    /// Raw check output, standard base64.
    pub raw: Option<String>,
}

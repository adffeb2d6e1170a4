//! Identity of a single check execution within a scan.

use chrono::{DateTime, Utc};

/// The check run an artifact belongs to.
///
/// Supplied with every ingestion request and only used to derive storage keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanIdentity {
    pub scan_id: String,
    pub check_id: String,
    pub started_at: DateTime<Utc>,
}

impl ScanIdentity {
    pub fn new(
        scan_id: impl Into<String>,
        check_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scan_id: scan_id.into(),
            check_id: check_id.into(),
            started_at,
        }
    }
}

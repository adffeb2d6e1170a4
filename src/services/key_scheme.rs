//! Storage key and link derivation.
//!
//! Keys follow the Hive-style partition layout expected by the query layer:
//!
//! ```text
//! dt=YYYY-MM-DD/scan=<scan_id>/<check_id>.<ext>
//! ```
//!
//! Partitioning is by calendar day only (UTC); the time of day is dropped.

use crate::models::{artifact::ArtifactKind, scan::ScanIdentity};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link base `{base}` is not a valid URL: {source}")]
    InvalidBase {
        base: String,
        #[source]
        source: url::ParseError,
    },
    #[error("link base `{0}` cannot carry path segments")]
    CannotBeABase(String),
}

/// Relative location of an artifact inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    partition_date: String,
    scan_partition: String,
    object_name: String,
}

impl StorageKey {
    /// Rebuild a key from path segments previously handed out in a link.
    ///
    /// The segments are used verbatim; nothing is re-derived or validated.
    pub fn from_segments(
        partition_date: impl Into<String>,
        scan_partition: impl Into<String>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            partition_date: partition_date.into(),
            scan_partition: scan_partition.into(),
            object_name: object_name.into(),
        }
    }

    /// `dt=YYYY-MM-DD`
    pub fn partition_date(&self) -> &str {
        &self.partition_date
    }

    /// `scan=<scan_id>`
    pub fn scan_partition(&self) -> &str {
        &self.scan_partition
    }

    /// `<check_id>.<ext>`
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// The key with a suffix appended to the object name, e.g. `.gz`.
    pub fn with_suffix(&self, suffix: &str) -> String {
        format!("{}{}", self, suffix)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.partition_date, self.scan_partition, self.object_name
        )
    }
}

/// Derive the storage key of an artifact.
pub fn derive_key(
    scan_id: &str,
    check_id: &str,
    started_at: DateTime<Utc>,
    kind: ArtifactKind,
) -> StorageKey {
    StorageKey {
        partition_date: started_at.format("dt=%Y-%m-%d").to_string(),
        scan_partition: format!("scan={}", scan_id),
        object_name: format!("{}.{}", check_id, kind.extension()),
    }
}

/// [`derive_key`] for a whole [`ScanIdentity`].
pub fn derive_identity_key(identity: &ScanIdentity, kind: ArtifactKind) -> StorageKey {
    derive_key(
        &identity.scan_id,
        &identity.check_id,
        identity.started_at,
        kind,
    )
}

/// Build the public link of an artifact:
/// `<base>/<reports|logs>/<dt>/<scan>/<object>`.
///
/// Each segment is percent-encoded as a single path component. Any path the
/// base already has is kept, a trailing slash on it is not doubled.
pub fn build_link(base: &str, kind: ArtifactKind, key: &StorageKey) -> Result<String, LinkError> {
    let mut url = Url::parse(base).map_err(|source| LinkError::InvalidBase {
        base: base.to_string(),
        source,
    })?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| LinkError::CannotBeABase(base.to_string()))?;
        segments.pop_if_empty().extend([
            kind.resource(),
            key.partition_date(),
            key.scan_partition(),
            key.object_name(),
        ]);
    }

    Ok(url.to_string())
}

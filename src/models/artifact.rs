//! Artifacts produced by a check: the structured report and the raw log.

use bytes::Bytes;

/// Kind of artifact, which fixes the object extension and the link resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Report,
    Log,
}

impl ArtifactKind {
    /// Extension of the stored object (`<check_id>.<ext>`).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Report => "json",
            Self::Log => "log",
        }
    }

    /// Resource segment used in public links.
    pub fn resource(self) -> &'static str {
        match self {
            Self::Report => "reports",
            Self::Log => "logs",
        }
    }
}

/// A validated report, already normalized for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    /// Normalized JSON, timestamps rendered as strings.
    pub raw_json: String,

    /// Number of entries in the report's vulnerability list.
    pub vulnerability_count: usize,
}

impl ReportArtifact {
    /// A vulnerable report is written twice: compressed to the vulnerable
    /// reports bucket and plain to the reports bucket.
    pub fn is_vulnerable(&self) -> bool {
        self.vulnerability_count > 0
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.raw_json.clone())
    }
}

/// A decoded raw log. Its content is never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogArtifact {
    pub payload: Bytes,
}

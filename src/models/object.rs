//! Metadata of an object stored by the local object store.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata row for a stored blob. The bytes themselves live on disk.
#[derive(Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Parent bucket.
    pub bucket_id: Uuid,

    /// Object key, e.g. `dt=2019-11-16/scan=<id>/<check>.json`.
    pub key: String,

    /// Content type given on upload, if any.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload, lowercase hex.
    pub etag: String,

    /// Timestamp of the last write.
    pub last_modified: DateTime<Utc>,
}

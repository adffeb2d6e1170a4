//! A bucket registered in the local object store.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A named namespace for objects.
///
/// The service only ever uses the buckets it was configured with; they are
/// registered once at startup.
#[derive(Clone, FromRow, Debug)]
pub struct Bucket {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Bucket name (same naming rules as S3).
    pub name: String,

    /// When this bucket was registered.
    pub created_at: DateTime<Utc>,
}

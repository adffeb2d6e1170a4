//! Object store capability used by the artifact store.
//!
//! The artifact store only needs "put bytes at key in bucket" and "get bytes at
//! key from bucket". Backends:
//! - [`local::LocalObjectStore`]: local disk for payloads, SQLite for metadata
//! - [`s3::S3ObjectStore`]: any S3-compatible service
//! - [`memory::MemoryObjectStore`]: in-process, nothing survives a restart

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

pub mod local;
pub mod memory;
pub mod s3;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("object store backend error: {0}")]
    Backend(String),
}

impl ObjectStoreError {
    /// Whether the bucket or the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BucketNotFound(_) | Self::ObjectNotFound { .. }
        )
    }
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// A bucket-scoped blob store.
///
/// Implementations must be safe to share between concurrent requests. A put
/// to an existing key overwrites it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> ObjectStoreResult<()>;

    async fn get(&self, bucket: &str, key: &str) -> ObjectStoreResult<Bytes>;
}

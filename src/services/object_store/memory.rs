//! In-process object store.

use super::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};
use tracing::debug;

/// An object held by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub content: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<(String, String), MemoryObject>,
    /// Every successful put as `(bucket, key)`, in order.
    writes: Vec<(String, String)>,
    failing_buckets: HashSet<String>,
}

/// Object store kept in a map. Buckets exist implicitly.
///
/// Clones share the same contents.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<Inner>>,
}

fn poisoned<T>(_: T) -> ObjectStoreError {
    ObjectStoreError::Backend("memory store lock poisoned".into())
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored object.
    pub fn object(&self, bucket: &str, key: &str) -> Option<MemoryObject> {
        let inner = self.inner.read().ok()?;
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Successful puts so far, oldest first.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .map(|inner| inner.writes.clone())
            .unwrap_or_default()
    }

    /// Make every subsequent put to `bucket` fail.
    pub fn fail_puts_to(&self, bucket: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failing_buckets.insert(bucket.to_string());
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> ObjectStoreResult<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if inner.failing_buckets.contains(bucket) {
            return Err(ObjectStoreError::Backend(format!(
                "put to bucket `{}` rejected",
                bucket
            )));
        }

        debug!(bucket, key, size = content.len(), "storing object in memory");
        inner.objects.insert(
            (bucket.to_string(), key.to_string()),
            MemoryObject {
                content,
                content_type: content_type.map(str::to_string),
            },
        );
        inner.writes.push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> ObjectStoreResult<Bytes> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.content.clone())
            .ok_or_else(|| ObjectStoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

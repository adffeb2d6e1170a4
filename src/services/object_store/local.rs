//! LocalObjectStore: object store backed by SQLite for metadata and local
//! disk for object payloads, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`.

use super::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use crate::models::{bucket::Bucket, object::StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MIGRATION: &str = include_str!("../../../migrations/0001_init.sql");

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Object store for single-node deployments.
///
/// - Upload writes bytes to a temp file and fsyncs it, upserts the metadata
///   row, then renames the file into place (overwrite semantics).
/// - Get reads the metadata row and the payload from disk.
///
/// Buckets must be registered with [`LocalObjectStore::ensure_bucket`] first.
#[derive(Clone)]
pub struct LocalObjectStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Create the metadata tables if they do not exist yet.
    pub async fn migrate(&self) -> ObjectStoreResult<usize> {
        let statements = MIGRATION
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }

        Ok(statements.len())
    }

    /// Register a bucket and create its directory. Idempotent.
    pub async fn ensure_bucket(&self, name: &str) -> ObjectStoreResult<Bucket> {
        ensure_bucket_name_safe(name)?;
        fs::create_dir_all(self.bucket_root(name)).await?;

        sqlx::query(
            "INSERT INTO buckets (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        self.fetch_bucket(name).await
    }

    /// Compute the physical base folder path for a bucket.
    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(bucket_name);
        path
    }

    /// Two-level shard directories for an object: the first two bytes of
    /// MD5(bucket/key) as lowercase hex.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// `base_path/bucket/{shard}/{shard}/{key}`. Parents may not exist yet.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_bucket(&self, bucket: &str) -> ObjectStoreResult<Bucket> {
        ensure_bucket_name_safe(bucket)?;
        sqlx::query_as::<_, Bucket>("SELECT id, name, created_at FROM buckets WHERE name = ?")
            .bind(bucket)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => ObjectStoreError::BucketNotFound(bucket.to_string()),
                other => ObjectStoreError::Sqlx(other),
            })
    }

    /// Fetch the metadata row of an object.
    pub async fn fetch_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<StoredObject> {
        ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        sqlx::query_as::<_, StoredObject>(
            "SELECT id, bucket_id, key, content_type, size_bytes, etag, last_modified
             FROM objects
             WHERE key = ? AND bucket_id = ?",
        )
        .bind(key)
        .bind(bucket_rec.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => ObjectStoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => ObjectStoreError::Sqlx(other),
        })
    }

    /// Write `content` to a fsynced temp file next to `file_path`. The temp
    /// file is removed on any error.
    async fn stage_payload(&self, file_path: &Path, content: &[u8]) -> ObjectStoreResult<PathBuf> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        Ok(tmp_path)
    }

    /// Move a staged payload over `file_path`.
    async fn commit_payload(&self, tmp_path: &Path, file_path: &Path) -> ObjectStoreResult<()> {
        if let Err(err) = fs::rename(tmp_path, file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(file_path).await?;
                fs::rename(tmp_path, file_path).await?;
            } else {
                let _ = fs::remove_file(tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }
        Ok(())
    }

    async fn upsert_metadata(
        &self,
        bucket_id: Uuid,
        key: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> ObjectStoreResult<()> {
        let size_bytes = i64::try_from(content.len()).unwrap_or(i64::MAX);
        let etag = format!("{:x}", md5::compute(content));

        sqlx::query(
            r#"
            INSERT INTO objects (
                id, bucket_id, key, content_type, size_bytes, etag, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bucket_id)
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> ObjectStoreResult<()> {
        ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        debug!(bucket, key, path = %file_path.display(), "uploading content to local bucket");

        // The previous payload stays in place until the metadata row is updated.
        let tmp_path = self.stage_payload(&file_path, &content).await?;
        if let Err(err) = self
            .upsert_metadata(bucket_rec.id, key, &content, content_type)
            .await
        {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        self.commit_payload(&tmp_path, &file_path).await
    }

    async fn get(&self, bucket: &str, key: &str) -> ObjectStoreResult<Bytes> {
        debug!(bucket, key, "downloading content from local bucket");
        let object = self.fetch_object(bucket, key).await?;

        let file_path = self.object_path(bucket, &object.key);
        let content = fs::read(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                ObjectStoreError::Io(err)
            }
        })?;

        Ok(Bytes::from(content))
    }
}

/// Reject keys that could escape the bucket directory.
fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
    let invalid = || ObjectStoreError::InvalidObjectKey(key.to_string());
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(invalid());
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(invalid());
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(invalid());
    }
    Ok(())
}

/// S3 naming rules:
/// - 3-63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - no consecutive dots or dot-hyphen pairs
/// - not formatted like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> ObjectStoreResult<()> {
    let invalid = |reason: &str| ObjectStoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use tempfile::TempDir;

    const KEY: &str =
        "dt=2019-11-16/scan=9126034c-7caf-4acd-93f3-bee1941aa140/e0c1ac1a-1036-4e0e-b5cc-d18ae6673eb0.json";

    async fn store() -> (LocalObjectStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("meta.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        let store = LocalObjectStore::new(Arc::new(pool), dir.path().join("objects"));
        store.migrate().await.unwrap();
        store.ensure_bucket("reports").await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_then_get() {
        let (store, _dir) = store().await;
        store
            .put("reports", KEY, Bytes::from_static(b"{}"), Some("text/json"))
            .await
            .unwrap();

        assert_eq!(store.get("reports", KEY).await.unwrap(), Bytes::from_static(b"{}"));

        let meta = store.fetch_object("reports", KEY).await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/json"));
        assert_eq!(meta.size_bytes, 2);
        assert_eq!(meta.etag, format!("{:x}", md5::compute(b"{}")));
    }

    #[tokio::test]
    async fn repeated_put_overwrites() {
        let (store, _dir) = store().await;
        store
            .put("reports", KEY, Bytes::from_static(b"first"), None)
            .await
            .unwrap();
        store
            .put("reports", KEY, Bytes::from_static(b"second"), None)
            .await
            .unwrap();

        assert_eq!(
            store.get("reports", KEY).await.unwrap(),
            Bytes::from_static(b"second")
        );
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn missing_object_and_bucket_are_not_found() {
        let (store, _dir) = store().await;

        let err = store.get("reports", KEY).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::ObjectNotFound { .. }));

        let err = store
            .put("logs", KEY, Bytes::from_static(b"x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::BucketNotFound(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn ensure_bucket_is_idempotent() {
        let (store, _dir) = store().await;
        let first = store.ensure_bucket("reports").await.unwrap();
        let second = store.ensure_bucket("reports").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn failed_overwrite_keeps_previous_object() {
        let (store, _dir) = store().await;
        store
            .put("reports", KEY, Bytes::from_static(b"first"), None)
            .await
            .unwrap();

        sqlx::query(
            "CREATE TRIGGER objects_read_only BEFORE UPDATE ON objects
             BEGIN SELECT RAISE(ABORT, 'objects are read only'); END",
        )
        .execute(&*store.db)
        .await
        .unwrap();

        let err = store
            .put("reports", KEY, Bytes::from_static(b"second"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::Sqlx(_)));

        assert_eq!(
            store.get("reports", KEY).await.unwrap(),
            Bytes::from_static(b"first")
        );
        let object_path = store.object_path("reports", KEY);
        let mut entries = fs::read_dir(object_path.parent().unwrap()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name();
            assert!(!name.to_string_lossy().starts_with(".tmp-"), "{name:?} left behind");
        }
    }

    #[tokio::test]
    async fn migrate_twice_is_harmless() {
        let (store, _dir) = store().await;
        assert_eq!(store.migrate().await.unwrap(), 2);
    }

    #[test]
    fn rejects_unsafe_keys() {
        assert!(ensure_key_safe(KEY).is_ok());
        assert!(ensure_key_safe("").is_err());
        assert!(ensure_key_safe("/etc/passwd").is_err());
        assert!(ensure_key_safe("dt=x/../../secret").is_err());
        assert!(ensure_key_safe("a\\b").is_err());
        assert!(ensure_key_safe("a\nb").is_err());
    }

    #[test]
    fn validates_bucket_names() {
        assert!(ensure_bucket_name_safe("vulnerable-reports").is_ok());
        assert!(ensure_bucket_name_safe("reports.dev").is_ok());
        assert!(ensure_bucket_name_safe("ab").is_err());
        assert!(ensure_bucket_name_safe("Reports").is_err());
        assert!(ensure_bucket_name_safe("-reports").is_err());
        assert!(ensure_bucket_name_safe("re..ports").is_err());
        assert!(ensure_bucket_name_safe("192.168.1.1").is_err());
    }
}

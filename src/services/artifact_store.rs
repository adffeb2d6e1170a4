//! ArtifactStore: persists reports and raw logs and hands out their links.
//!
//! This is the only component that talks to the object store. Keys come from
//! [`key_scheme`](super::key_scheme); object-store errors are returned as-is,
//! without retries.

use super::{
    compression::gzip_compress,
    key_scheme::{self, LinkError, StorageKey},
    object_store::{ObjectStore, ObjectStoreError},
};
use crate::{
    config::StorageConfig,
    models::{
        artifact::{ArtifactKind, LogArtifact, ReportArtifact},
        scan::ScanIdentity,
    },
};
use bytes::Bytes;
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::{debug, error};

const VULNERABLE_CONTENT_TYPE: &str = "gzip";
const REPORT_CONTENT_TYPE: &str = "text/json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
    #[error("failed to compress report: {0}")]
    Compression(#[source] io::Error),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Read/write access to stored artifacts.
///
/// Cheap to clone; clones share the configuration and the object store.
#[derive(Clone)]
pub struct ArtifactStore {
    config: Arc<StorageConfig>,
    store: Arc<dyn ObjectStore>,
}

impl ArtifactStore {
    pub fn new(config: StorageConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    fn link(&self, kind: ArtifactKind, key: &StorageKey) -> ArtifactResult<String> {
        key_scheme::build_link(&self.config.link_base, kind, key).map_err(|err| {
            error!(link_base = %self.config.link_base, "invalid link base: {}", err);
            ArtifactError::Link(err)
        })
    }

    /// Store a report and return its link.
    ///
    /// Steps, each aborting the call on failure:
    /// 1. vulnerable reports only: gzip and write to the vulnerable reports
    ///    bucket under `<key>.gz`
    /// 2. build the link
    /// 3. write the plain report to the reports bucket under `<key>`
    ///
    /// The writes are not transactional. If step 3 fails after step 1
    /// succeeded, the report stays in the vulnerable reports bucket only; a
    /// retry with the same identity overwrites both objects.
    pub async fn save_report(
        &self,
        identity: &ScanIdentity,
        artifact: &ReportArtifact,
    ) -> ArtifactResult<String> {
        let key = key_scheme::derive_identity_key(identity, ArtifactKind::Report);
        let content = artifact.to_bytes();

        if artifact.is_vulnerable() {
            let compressed = gzip_compress(&content).map_err(ArtifactError::Compression)?;
            let gz_key = key.with_suffix(".gz");
            debug!(
                bucket = %self.config.bucket_vulnerable_reports,
                key = %gz_key,
                vulnerabilities = artifact.vulnerability_count,
                "storing vulnerable report"
            );
            self.store
                .put(
                    &self.config.bucket_vulnerable_reports,
                    &gz_key,
                    Bytes::from(compressed),
                    Some(VULNERABLE_CONTENT_TYPE),
                )
                .await?;
        }

        let link = self.link(ArtifactKind::Report, &key)?;

        self.store
            .put(
                &self.config.bucket_reports,
                &key.to_string(),
                content,
                Some(REPORT_CONTENT_TYPE),
            )
            .await?;

        Ok(link)
    }

    /// Store a raw log and return its link. The link is built before the
    /// write so a misconfigured link base stores nothing.
    pub async fn save_log(
        &self,
        identity: &ScanIdentity,
        artifact: &LogArtifact,
    ) -> ArtifactResult<String> {
        let key = key_scheme::derive_identity_key(identity, ArtifactKind::Log);
        let link = self.link(ArtifactKind::Log, &key)?;

        self.store
            .put(
                &self.config.bucket_logs,
                &key.to_string(),
                artifact.payload.clone(),
                None,
            )
            .await?;

        Ok(link)
    }

    /// Read a report back using the path segments of its link.
    pub async fn get_report(&self, date: &str, scan: &str, check: &str) -> ArtifactResult<Bytes> {
        let key = StorageKey::from_segments(date, scan, check);
        Ok(self
            .store
            .get(&self.config.bucket_reports, &key.to_string())
            .await?)
    }

    /// Read a raw log back using the path segments of its link.
    pub async fn get_log(&self, date: &str, scan: &str, check: &str) -> ArtifactResult<Bytes> {
        let key = StorageKey::from_segments(date, scan, check);
        Ok(self
            .store
            .get(&self.config.bucket_logs, &key.to_string())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{compression::gzip_decompress, object_store::memory::MemoryObjectStore};
    use chrono::{TimeZone, Utc};
    use url::Url;

    const SCAN_ID: &str = "9126034c-7caf-4acd-93f3-bee1941aa140";
    const CHECK_ID: &str = "e0c1ac1a-1036-4e0e-b5cc-d18ae6673eb0";
    const REPORT_KEY: &str =
        "dt=1984-04-04/scan=9126034c-7caf-4acd-93f3-bee1941aa140/e0c1ac1a-1036-4e0e-b5cc-d18ae6673eb0.json";

    fn config() -> StorageConfig {
        StorageConfig {
            bucket_vulnerable_reports: "vulnerable-reports-dev".into(),
            bucket_reports: "reports-dev".into(),
            bucket_logs: "logs-dev".into(),
            link_base: "https://results.example.com/v1".into(),
            region: None,
            endpoint: None,
            path_style: false,
        }
    }

    fn artifacts(config: StorageConfig) -> (ArtifactStore, MemoryObjectStore) {
        let memory = MemoryObjectStore::new();
        (ArtifactStore::new(config, Arc::new(memory.clone())), memory)
    }

    fn identity() -> ScanIdentity {
        ScanIdentity::new(
            SCAN_ID,
            CHECK_ID,
            Utc.with_ymd_and_hms(1984, 4, 4, 13, 0, 0).unwrap(),
        )
    }

    fn report(vulnerability_count: usize) -> ReportArtifact {
        ReportArtifact {
            raw_json: r#"{"status":"FINISHED"}"#.into(),
            vulnerability_count,
        }
    }

    /// `(date, scan, check)` path segments of a link.
    fn link_segments(link: &str) -> (String, String, String) {
        let url = Url::parse(link).unwrap();
        let segments: Vec<_> = url.path_segments().unwrap().collect();
        let n = segments.len();
        (
            segments[n - 3].to_string(),
            segments[n - 2].to_string(),
            segments[n - 1].to_string(),
        )
    }

    #[tokio::test]
    async fn clean_report_is_written_once() {
        let (artifacts, memory) = artifacts(config());
        let link = artifacts.save_report(&identity(), &report(0)).await.unwrap();

        assert_eq!(
            link,
            format!("https://results.example.com/v1/reports/{REPORT_KEY}")
        );
        assert_eq!(
            memory.writes(),
            vec![("reports-dev".to_string(), REPORT_KEY.to_string())]
        );
        let stored = memory.object("reports-dev", REPORT_KEY).unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("text/json"));
    }

    #[tokio::test]
    async fn vulnerable_report_is_written_twice() {
        let (artifacts, memory) = artifacts(config());
        artifacts.save_report(&identity(), &report(2)).await.unwrap();

        let gz_key = format!("{REPORT_KEY}.gz");
        assert_eq!(
            memory.writes(),
            vec![
                ("vulnerable-reports-dev".to_string(), gz_key.clone()),
                ("reports-dev".to_string(), REPORT_KEY.to_string()),
            ]
        );

        let compressed = memory.object("vulnerable-reports-dev", &gz_key).unwrap();
        assert_eq!(compressed.content_type.as_deref(), Some("gzip"));
        assert_eq!(
            gzip_decompress(&compressed.content).unwrap(),
            report(2).raw_json.into_bytes()
        );

        let plain = memory.object("reports-dev", REPORT_KEY).unwrap();
        assert_eq!(plain.content, report(2).to_bytes());
    }

    #[tokio::test]
    async fn broken_link_base_writes_nothing() {
        let mut config = config();
        config.link_base = "*&%$#!".into();
        let (artifacts, memory) = artifacts(config);

        let err = artifacts.save_report(&identity(), &report(0)).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Link(_)));

        let log = LogArtifact {
            payload: Bytes::from_static(b"output"),
        };
        let err = artifacts.save_log(&identity(), &log).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Link(_)));

        assert!(memory.writes().is_empty());
    }

    #[tokio::test]
    async fn failed_vulnerable_write_aborts() {
        let (artifacts, memory) = artifacts(config());
        memory.fail_puts_to("vulnerable-reports-dev");

        let err = artifacts.save_report(&identity(), &report(1)).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Store(ObjectStoreError::Backend(_))));
        assert!(memory.writes().is_empty());
    }

    #[tokio::test]
    async fn failed_primary_write_keeps_vulnerable_copy() {
        let (artifacts, memory) = artifacts(config());
        memory.fail_puts_to("reports-dev");

        let err = artifacts.save_report(&identity(), &report(1)).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Store(_)));
        assert!(
            memory
                .object("vulnerable-reports-dev", &format!("{REPORT_KEY}.gz"))
                .is_some()
        );
        assert!(memory.object("reports-dev", REPORT_KEY).is_none());
    }

    #[tokio::test]
    async fn report_round_trips_through_its_link() {
        let (artifacts, _memory) = artifacts(config());
        let artifact = report(1);
        let link = artifacts.save_report(&identity(), &artifact).await.unwrap();

        let (date, scan, check) = link_segments(&link);
        let content = artifacts.get_report(&date, &scan, &check).await.unwrap();
        assert_eq!(content, artifact.to_bytes());
    }

    #[tokio::test]
    async fn log_is_stored_uncompressed_without_content_type() {
        let (artifacts, memory) = artifacts(config());
        let log = LogArtifact {
            payload: Bytes::from_static(b"{}"),
        };
        let link = artifacts.save_log(&identity(), &log).await.unwrap();
        assert_eq!(
            link,
            format!("https://results.example.com/v1/logs/dt=1984-04-04/scan={SCAN_ID}/{CHECK_ID}.log")
        );

        let key = format!("dt=1984-04-04/scan={SCAN_ID}/{CHECK_ID}.log");
        let stored = memory.object("logs-dev", &key).unwrap();
        assert_eq!(stored.content, Bytes::from_static(b"{}"));
        assert_eq!(stored.content_type, None);
    }

    #[tokio::test]
    async fn get_log_reads_exact_key_from_logs_bucket() {
        let (artifacts, memory) = artifacts(config());
        let key = format!("dt=2019-11-16/scan={SCAN_ID}/{CHECK_ID}.log");
        memory
            .put("logs-dev", &key, Bytes::from_static(b"raw output"), None)
            .await
            .unwrap();

        let content = artifacts
            .get_log("dt=2019-11-16", &format!("scan={SCAN_ID}"), &format!("{CHECK_ID}.log"))
            .await
            .unwrap();
        assert_eq!(content, Bytes::from_static(b"raw output"));

        let err = artifacts
            .get_log("dt=2019-11-17", &format!("scan={SCAN_ID}"), &format!("{CHECK_ID}.log"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Store(ref e) if e.is_not_found()));

        let err = artifacts
            .get_report("dt=2019-11-16", &format!("scan={SCAN_ID}"), &format!("{CHECK_ID}.log"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Store(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn repeated_save_overwrites() {
        let (artifacts, memory) = artifacts(config());
        let first = artifacts.save_report(&identity(), &report(0)).await.unwrap();
        let second = artifacts.save_report(&identity(), &report(0)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(memory.writes().len(), 2);
        assert_eq!(
            memory.object("reports-dev", REPORT_KEY).unwrap().content,
            report(0).to_bytes()
        );
    }
}

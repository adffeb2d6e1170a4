use anyhow::{Result, bail};
use scan_results::{
    config::{AppConfig, Backend},
    routes::routes::app,
    services::{
        artifact_store::ArtifactStore,
        object_store::{
            ObjectStore, local::LocalObjectStore, memory::MemoryObjectStore, s3::S3ObjectStore,
        },
    },
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting scan-results with config: {:?}", cfg);

    if migrate && cfg.backend != Backend::Local {
        bail!("--migrate only applies to the local backend");
    }

    // --- Initialize object store ---
    let store: Arc<dyn ObjectStore> = match cfg.backend {
        Backend::Local => {
            let local = open_local_store(&cfg).await?;

            // --- Handle migration mode ---
            if migrate {
                tracing::info!("Database migration complete.");
                return Ok(()); // exit after migration
            }
            Arc::new(local)
        }
        Backend::S3 => Arc::new(S3ObjectStore::connect(&cfg.storage).await),
        Backend::Memory => {
            tracing::warn!("Using the in-memory backend; stored results are lost on exit");
            Arc::new(MemoryObjectStore::new())
        }
    };

    let artifacts = ArtifactStore::new(cfg.storage.clone(), store);

    // --- Build router ---
    let app = app(artifacts);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the SQLite metadata database, apply migrations and register every
/// configured bucket.
async fn open_local_store(cfg: &AppConfig) -> Result<LocalObjectStore> {
    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    let local = LocalObjectStore::new(db, cfg.storage_dir.clone());
    let statements = local.migrate().await?;
    tracing::info!("Applied {} migration statements", statements);

    for bucket in cfg.storage.buckets() {
        local.ensure_bucket(bucket).await?;
        tracing::debug!("Bucket {} ready", bucket);
    }

    Ok(local)
}

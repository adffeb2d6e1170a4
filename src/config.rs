use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use std::env;

/// Object store backend the service writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Local disk for payloads, SQLite for metadata.
    Local,
    /// S3 or an S3-compatible endpoint.
    S3,
    /// In-process map; nothing survives a restart.
    Memory,
}

/// Where artifacts go and how their links are built.
///
/// Read-only once the service has started.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket_vulnerable_reports: String,
    pub bucket_reports: String,
    pub bucket_logs: String,

    /// Base URL that links are built on, e.g. `https://results.example.com/v1`.
    pub link_base: String,

    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    /// Every configured bucket.
    pub fn buckets(&self) -> [&str; 3] {
        [
            self.bucket_vulnerable_reports.as_str(),
            self.bucket_reports.as_str(),
            self.bucket_logs.as_str(),
        ]
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub storage_dir: String,
    pub database_url: String,
    pub storage: StorageConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Scan results storage API")]
pub struct Args {
    /// Host to bind to (overrides RESULTS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RESULTS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store backend (overrides RESULTS_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Directory where the local backend keeps objects (overrides RESULTS_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Metadata database of the local backend (overrides RESULTS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket for compressed copies of vulnerable reports (overrides RESULTS_BUCKET_VULNERABLE_REPORTS)
    #[arg(long)]
    pub bucket_vulnerable_reports: Option<String>,

    /// Bucket for reports (overrides RESULTS_BUCKET_REPORTS)
    #[arg(long)]
    pub bucket_reports: Option<String>,

    /// Bucket for raw logs (overrides RESULTS_BUCKET_LOGS)
    #[arg(long)]
    pub bucket_logs: Option<String>,

    /// Base URL of returned links (overrides RESULTS_LINK_BASE)
    #[arg(long)]
    pub link_base: Option<String>,

    /// S3 region (overrides RESULTS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// S3 endpoint override (overrides RESULTS_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Force path-style S3 addressing (or RESULTS_PATH_STYLE=true)
    #[arg(long)]
    pub path_style: bool,

    /// Run local backend migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |name| env::var(name))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over `lookup` (an environment) over defaults.
    pub fn from_sources<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let var = |name: &str| -> Result<Option<String>> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };
        let string_or = |name: &str, default: &str| -> Result<String> {
            Ok(var(name)?.unwrap_or_else(|| default.to_string()))
        };

        // --- Environment fallback ---
        let env_port = match var("RESULTS_PORT")? {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing RESULTS_PORT value `{}`", value))?,
            None => 8080,
        };
        let env_backend = match var("RESULTS_BACKEND")? {
            Some(value) => Backend::from_str(&value, true)
                .map_err(|err| anyhow!(err))
                .with_context(|| format!("parsing RESULTS_BACKEND value `{}`", value))?,
            None => Backend::Local,
        };
        let env_path_style = match var("RESULTS_PATH_STYLE")? {
            Some(value) => value
                .parse::<bool>()
                .with_context(|| format!("parsing RESULTS_PATH_STYLE value `{}`", value))?,
            None => false,
        };

        // --- Merge ---
        let storage = StorageConfig {
            bucket_vulnerable_reports: match args.bucket_vulnerable_reports {
                Some(value) => value,
                None => string_or("RESULTS_BUCKET_VULNERABLE_REPORTS", "vulnerable-reports")?,
            },
            bucket_reports: match args.bucket_reports {
                Some(value) => value,
                None => string_or("RESULTS_BUCKET_REPORTS", "reports")?,
            },
            bucket_logs: match args.bucket_logs {
                Some(value) => value,
                None => string_or("RESULTS_BUCKET_LOGS", "logs")?,
            },
            link_base: match args.link_base {
                Some(value) => value,
                None => string_or("RESULTS_LINK_BASE", "http://localhost:8080/v1")?,
            },
            region: args.region.or(var("RESULTS_REGION")?),
            endpoint: args.endpoint.or(var("RESULTS_ENDPOINT")?),
            path_style: args.path_style || env_path_style,
        };

        Ok(Self {
            host: match args.host {
                Some(value) => value,
                None => string_or("RESULTS_HOST", "0.0.0.0")?,
            },
            port: args.port.unwrap_or(env_port),
            backend: args.backend.unwrap_or(env_backend),
            storage_dir: match args.storage_dir {
                Some(value) => value,
                None => string_or("RESULTS_STORAGE_DIR", "./data/objects")?,
            },
            database_url: match args.database_url {
                Some(value) => value,
                None => string_or("RESULTS_DATABASE_URL", "sqlite://./data/meta/results.db")?,
            },
            storage,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

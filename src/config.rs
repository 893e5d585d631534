use crate::services::object_store::{RetryPolicy, s3::S3Settings};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr, time::Duration};

/// Which blob backend holds the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectBackend {
    Fs,
    S3,
    Memory,
}

impl FromStr for ObjectBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fs" => Ok(Self::Fs),
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown object backend `{}` (expected fs, s3 or memory)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; CLI wins.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub object_backend: ObjectBackend,
    pub storage_dir: String,
    pub s3: S3Settings,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub io_timeout: Duration,
    pub storage_retries: u32,
    pub retry_backoff: Duration,
    pub max_upload_bytes: usize,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("object_backend", &self.object_backend)
            .field("storage_dir", &self.storage_dir)
            .field("s3", &self.s3)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("io_timeout", &self.io_timeout)
            .field("storage_retries", &self.storage_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// What the binary should do after loading config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Serve,
    /// Apply the schema and exit.
    Migrate,
    /// Print a bearer token for the owner and exit.
    IssueToken(String),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Encrypted file vault API")]
pub struct Args {
    /// Host to bind to (overrides VAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides VAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object store backend (overrides VAULT_OBJECT_BACKEND)
    #[arg(long, value_enum)]
    pub object_backend: Option<ObjectBackend>,

    /// Directory for the fs backend (overrides VAULT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// S3 endpoint URL (overrides VAULT_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// S3 bucket (overrides VAULT_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// S3 region (overrides VAULT_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// S3 access key id (overrides VAULT_S3_ACCESS_KEY_ID)
    #[arg(long)]
    pub s3_access_key_id: Option<String>,

    /// S3 secret access key (overrides VAULT_S3_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub s3_secret_access_key: Option<String>,

    /// Refuse plaintext http:// S3 endpoints (overrides VAULT_S3_ENFORCE_TLS)
    #[arg(long)]
    pub s3_enforce_tls: Option<bool>,

    /// Bearer token lifetime in seconds (overrides VAULT_TOKEN_TTL_SECS)
    #[arg(long)]
    pub token_ttl_secs: Option<u64>,

    /// Per-attempt storage and database timeout (overrides VAULT_IO_TIMEOUT_MS)
    #[arg(long)]
    pub io_timeout_ms: Option<u64>,

    /// Retries of transient object store failures (overrides VAULT_STORAGE_RETRIES)
    #[arg(long)]
    pub storage_retries: Option<u32>,

    /// First retry delay, doubled per retry (overrides VAULT_RETRY_BACKOFF_MS)
    #[arg(long)]
    pub retry_backoff_ms: Option<u64>,

    /// Request body limit in bytes (overrides VAULT_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// SQLite pool size (overrides VAULT_DB_MAX_CONNECTIONS)
    #[arg(long)]
    pub db_max_connections: Option<u32>,

    /// JWT signing secret (overrides VAULT_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Print a bearer token for this owner id and exit
    #[arg(long, value_name = "OWNER")]
    pub issue_token: Option<String>,
}

/// Read and parse an env var, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

/// CLI value if given, else the parsed env var, else `default`.
fn cli_or_env<T>(cli: Option<T>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match cli {
        Some(value) => Ok(value),
        None => env_parse(name, default),
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.into())
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, Mode)> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<(Self, Mode)> {
        // --- Environment fallback ---
        let env_port = env_parse("VAULT_PORT", 5000u16)?;
        let env_backend = env_parse("VAULT_OBJECT_BACKEND", ObjectBackend::Fs)?;

        let jwt_secret = match args.jwt_secret.or_else(|| env::var("VAULT_JWT_SECRET").ok()) {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!("a JWT secret is required (--jwt-secret or VAULT_JWT_SECRET)"),
        };

        // --- Merge ---
        let cfg = Self {
            host: args
                .host
                .unwrap_or_else(|| env_string("VAULT_HOST", "0.0.0.0")),
            port: args.port.unwrap_or(env_port),
            database_url: args
                .database_url
                .unwrap_or_else(|| env_string("VAULT_DATABASE_URL", "sqlite://./data/meta/vault.db")),
            db_max_connections: cli_or_env(
                args.db_max_connections,
                "VAULT_DB_MAX_CONNECTIONS",
                5u32,
            )?,
            object_backend: args.object_backend.unwrap_or(env_backend),
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| env_string("VAULT_STORAGE_DIR", "./data/objects")),
            s3: S3Settings {
                endpoint: args
                    .s3_endpoint
                    .unwrap_or_else(|| env_string("VAULT_S3_ENDPOINT", "")),
                region: args
                    .s3_region
                    .unwrap_or_else(|| env_string("VAULT_S3_REGION", "us-east-1")),
                bucket: args
                    .s3_bucket
                    .unwrap_or_else(|| env_string("VAULT_S3_BUCKET", "")),
                access_key_id: args
                    .s3_access_key_id
                    .unwrap_or_else(|| env_string("VAULT_S3_ACCESS_KEY_ID", "")),
                secret_access_key: args
                    .s3_secret_access_key
                    .unwrap_or_else(|| env_string("VAULT_S3_SECRET_ACCESS_KEY", "")),
                enforce_tls: cli_or_env(args.s3_enforce_tls, "VAULT_S3_ENFORCE_TLS", true)?,
            },
            jwt_secret,
            token_ttl: Duration::from_secs(cli_or_env(
                args.token_ttl_secs,
                "VAULT_TOKEN_TTL_SECS",
                3600u64,
            )?),
            io_timeout: Duration::from_millis(cli_or_env(
                args.io_timeout_ms,
                "VAULT_IO_TIMEOUT_MS",
                5000u64,
            )?),
            storage_retries: cli_or_env(args.storage_retries, "VAULT_STORAGE_RETRIES", 2u32)?,
            retry_backoff: Duration::from_millis(cli_or_env(
                args.retry_backoff_ms,
                "VAULT_RETRY_BACKOFF_MS",
                200u64,
            )?),
            max_upload_bytes: cli_or_env(
                args.max_upload_bytes,
                "VAULT_MAX_UPLOAD_BYTES",
                64 * 1024 * 1024usize,
            )?,
        };

        if cfg.object_backend == ObjectBackend::S3
            && (cfg.s3.endpoint.is_empty() || cfg.s3.bucket.is_empty())
        {
            bail!("the s3 backend needs VAULT_S3_ENDPOINT and VAULT_S3_BUCKET");
        }

        let mode = match (args.migrate, args.issue_token) {
            (_, Some(owner)) => Mode::IssueToken(owner),
            (true, None) => Mode::Migrate,
            (false, None) => Mode::Serve,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.storage_retries,
            base_backoff: self.retry_backoff,
            attempt_timeout: self.io_timeout,
        }
    }
}

use super::error::{Result, ServerError};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | /var/lib/care/server | Working directory (database, logs) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | development / staging / production |
/// | LOG_LEVEL | info | Default log level (overridden by RUST_LOG) |
/// | LOG_DIR | - | Enables daily rolling log files |
/// | REQUEST_TIMEOUT_MS | 30000 | Per-request timeout |
/// | DIRECTORY_FILE | - | JSON seed for the tenant directory |
/// | CLAIMS_PROCESSOR_URL | - | External claims endpoint (no-op when unset) |
/// | DISPATCH_MAX_RETRIES | 5 | Attempts before a job is dead-lettered |
/// | DISPATCH_RETRY_BASE_MS | 1000 | Backoff base |
/// | DISPATCH_RETRY_MAX_MS | 60000 | Backoff cap |
/// | DISPATCH_SCAN_INTERVAL_SECS | 30 | Pending queue scan interval |
///
/// ```ignore
/// WORK_DIR=/data/care HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub request_timeout_ms: u64,
    pub directory_file: Option<String>,
    pub claims_processor_url: Option<String>,
    pub dispatch: DispatchConfig,
}

/// Retry policy of the side-effect dispatch worker
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub scan_interval_secs: u64,
}

impl DispatchConfig {
    /// Delay after `n + 1` consecutive failures: base * 2^n, capped
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry_count);
        let ms = self.retry_base_ms.saturating_mul(factor).min(self.retry_max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_base_ms: 1000,
            retry_max_ms: 60_000,
            scan_interval_secs: 30,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = DispatchConfig::default();
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/care/server".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_opt("LOG_DIR"),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30_000),
            directory_file: env_opt("DIRECTORY_FILE"),
            claims_processor_url: env_opt("CLAIMS_PROCESSOR_URL"),
            dispatch: DispatchConfig {
                max_retries: env_parse("DISPATCH_MAX_RETRIES", defaults.max_retries),
                retry_base_ms: env_parse("DISPATCH_RETRY_BASE_MS", defaults.retry_base_ms),
                retry_max_ms: env_parse("DISPATCH_RETRY_MAX_MS", defaults.retry_max_ms),
                scan_interval_secs: env_parse(
                    "DISPATCH_SCAN_INTERVAL_SECS",
                    defaults.scan_interval_secs,
                ),
            },
        }
    }

    /// Override the work dir and port, keeping everything else from the environment
    ///
    /// Mostly for tests.
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(ServerError::Config("REQUEST_TIMEOUT_MS must be positive".into()));
        }
        if self.dispatch.max_retries == 0 {
            return Err(ServerError::Config("DISPATCH_MAX_RETRIES must be at least 1".into()));
        }
        if self.dispatch.scan_interval_secs == 0 {
            return Err(ServerError::Config(
                "DISPATCH_SCAN_INTERVAL_SECS must be positive".into(),
            ));
        }
        if self.dispatch.retry_max_ms < self.dispatch.retry_base_ms {
            return Err(ServerError::Config(
                "DISPATCH_RETRY_MAX_MS is below DISPATCH_RETRY_BASE_MS".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Create the directories the server writes into
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        if let Some(dir) = &self.log_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

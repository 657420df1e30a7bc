//! Logging infrastructure
//!
//! - Console output (pretty in development, JSON otherwise)
//! - With a log directory: daily rolling files split by target
//!   - `app/` everything except audit and security events, pruned after [`APP_LOG_RETENTION_DAYS`]
//!   - `audit/` order lifecycle trail (target `audit`), kept
//!   - `security/` identity rejections (target `security`), kept

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

pub const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console-only logger
pub fn init_logger(level: &str) -> anyhow::Result<()> {
    init_logger_with_file(level, false, None)
}

/// Initialize the global subscriber
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_line_number(true).boxed()
    });

    if let Some(dir) = log_dir {
        let root = Path::new(dir);
        layers.push(file_layer(root, "app", |target| {
            target != "audit" && target != "security"
        })?);
        layers.push(file_layer(root, "audit", |target| target == "audit")?);
        layers.push(file_layer(root, "security", |target| target == "security")?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;
    Ok(())
}

fn file_layer(root: &Path, name: &str, accept: fn(&str) -> bool) -> anyhow::Result<BoxedLayer> {
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
    Ok(fmt::layer()
        .json()
        .with_target(true)
        .with_ansi(false)
        .with_writer(appender)
        .with_filter(filter_fn(move |meta| accept(meta.target())))
        .boxed())
}

/// Delete rolled application logs older than `keep_days`
///
/// Rolled files are named `app.YYYY-MM-DD`. Audit and security logs are never
/// touched. Returns the number of deleted files.
pub fn cleanup_old_logs(log_dir: &Path, keep_days: i64) -> anyhow::Result<usize> {
    let app_dir = log_dir.join("app");
    if !app_dir.exists() {
        return Ok(0);
    }

    let cutoff = chrono::Utc::now().date_naive() - chrono::Duration::days(keep_days);
    let mut removed = 0;
    for entry in fs::read_dir(&app_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date) = name
            .strip_prefix("app.")
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if date < cutoff {
            fs::remove_file(&path)?;
            removed += 1;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }
    Ok(removed)
}

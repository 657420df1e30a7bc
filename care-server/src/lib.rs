//! Care server: clinical order lifecycle and cross-tenant handoff
//!
//! # Architecture
//!
//! - **Orders** (`orders`): validated status transitions over a redb store,
//!   with a per-order in-flight guard and a version compare-and-swap
//! - **Visibility** (`visibility`): per-viewer redaction from a declarative
//!   mask table
//! - **Handoff** (`handoff`): receiver resolution, counterparty assignment and
//!   the durable dispatch worker
//! - **Notifications** (`notifications`): append-mostly notification ledger
//! - **HTTP API** (`api`): axum routes over all of the above
//!
//! # Layout
//!
//! ```text
//! care-server/src/
//! ├── core/           # config, state, background tasks, event routing
//! ├── auth/           # gateway identity extractor
//! ├── api/            # HTTP routes and handlers
//! ├── orders/         # lifecycle engine and storage
//! ├── visibility/     # field masks and redaction
//! ├── handoff/        # tenant directory, router, claims, dispatch worker
//! ├── notifications/  # notification ledger
//! └── utils/          # logging
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod handoff;
pub mod notifications;
pub mod orders;
pub mod utils;
pub mod visibility;

pub use auth::CurrentActor;
pub use core::{Config, Server, ServerState};
pub use handoff::{HandoffRouter, TenantDirectory};
pub use notifications::NotificationLedger;
pub use orders::{OrderStorage, OrdersManager};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{cleanup_old_logs, init_logger_with_file};

/// Audit trail entry on the `audit` target
#[macro_export]
macro_rules! audit_log {
    ($($arg:tt)*) => {
        tracing::info!(target: "audit", $($arg)*)
    };
}

/// Security event on the `security` target
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// Load `.env`, prepare the work dir and install the logger
///
/// Logs are JSON everywhere except in development.
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.ensure_work_dir_structure()?;
    init_logger_with_file(
        &config.log_level,
        !config.is_development(),
        config.log_dir.as_deref(),
    )?;
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
   ______
  / ____/___ _________
 / /   / __ `/ ___/ _ \
/ /___/ /_/ / /  /  __/
\____/\__,_/_/   \___/
    "#
    );
}

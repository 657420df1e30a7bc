use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::event_router::run_audit_trail;
use crate::core::{BackgroundTasks, Config, EventRouter, Result, TaskKind};
use crate::handoff::{
    ClaimsProcessor, DispatchWorker, HandoffRouter, HttpClaimsProcessor, InMemoryDirectory,
    NoopClaimsProcessor, TenantDirectory,
};
use crate::notifications::NotificationLedger;
use crate::orders::OrdersManager;
use crate::utils::logger::{APP_LOG_RETENTION_DAYS, cleanup_old_logs};

/// Dispatch channel capacity (EventRouter → DispatchWorker)
const DISPATCH_CHANNEL_CAPACITY: usize = 1024;
/// Audit channel capacity; events are dropped when it is full
const AUDIT_CHANNEL_CAPACITY: usize = 4096;
/// How often old log files are swept
const LOG_CLEANUP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Shared service handles
///
/// Cloning is cheap; every service sits behind an `Arc`.
///
/// | Field | Purpose |
/// |-------|---------|
/// | config | Immutable configuration |
/// | orders | Lifecycle engine (redb) |
/// | notifications | Notification ledger (redb) |
/// | directory | Tenant registry |
/// | router | Handoff router |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub orders: Arc<OrdersManager>,
    pub notifications: Arc<NotificationLedger>,
    pub directory: Arc<dyn TenantDirectory>,
    pub router: Arc<HandoffRouter>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("orders", &self.orders)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Open the databases and wire the services together
    pub fn initialize(config: &Config) -> Result<Self> {
        config.validate()?;
        let db_dir = config.database_dir();
        std::fs::create_dir_all(&db_dir)?;

        let orders = Arc::new(OrdersManager::new(db_dir.join("orders.redb"))?);
        let notifications = Arc::new(NotificationLedger::open(db_dir.join("notifications.redb"))?);

        let directory: Arc<dyn TenantDirectory> = match &config.directory_file {
            Some(path) => Arc::new(InMemoryDirectory::load(path)?),
            None => {
                tracing::warn!("DIRECTORY_FILE not set, every handoff will need manual routing");
                Arc::new(InMemoryDirectory::new())
            }
        };

        let claims: Arc<dyn ClaimsProcessor> = match &config.claims_processor_url {
            Some(url) => {
                tracing::info!(url = %url, "Claims processor configured");
                Arc::new(HttpClaimsProcessor::new(url.clone(), config.request_timeout())?)
            }
            None => Arc::new(NoopClaimsProcessor),
        };

        Ok(Self::from_parts(config.clone(), orders, notifications, directory, claims))
    }

    /// Assemble a state from already-built services
    pub fn from_parts(
        config: Config,
        orders: Arc<OrdersManager>,
        notifications: Arc<NotificationLedger>,
        directory: Arc<dyn TenantDirectory>,
        claims: Arc<dyn ClaimsProcessor>,
    ) -> Self {
        let router = Arc::new(HandoffRouter::new(
            orders.clone(),
            directory.clone(),
            claims,
        ));
        Self {
            config,
            orders,
            notifications,
            directory,
            router,
        }
    }

    /// Start the event router, dispatch worker, audit trail and housekeeping
    ///
    /// ```text
    /// OrdersManager ── broadcast ──► EventRouter ─┬─► DispatchWorker
    ///                                             └─► audit trail
    /// ```
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let shutdown = tasks.shutdown_token();

        let (event_router, channels) =
            EventRouter::new(DISPATCH_CHANNEL_CAPACITY, AUDIT_CHANNEL_CAPACITY);
        let source = self.orders.subscribe();
        tasks.spawn(
            "event_router",
            TaskKind::Listener,
            until_cancelled(shutdown.clone(), event_router.run(source)),
        );

        let worker = DispatchWorker::new(
            self.orders.clone(),
            self.router.clone(),
            self.notifications.clone(),
            self.config.dispatch.clone(),
        );
        tasks.spawn(
            "dispatch_worker",
            TaskKind::Worker,
            worker.run(channels.dispatch_rx, shutdown.clone()),
        );

        tasks.spawn(
            "audit_trail",
            TaskKind::Listener,
            until_cancelled(shutdown.clone(), run_audit_trail(channels.audit_rx)),
        );

        if let Some(log_dir) = self.config.log_dir.clone() {
            tasks.spawn(
                "log_cleanup",
                TaskKind::Periodic,
                until_cancelled(shutdown, log_cleanup_loop(PathBuf::from(log_dir))),
            );
        }

        tasks.log_summary();
        tasks
    }
}

/// Run `future` until it finishes or `token` is cancelled
async fn until_cancelled<F>(token: tokio_util::sync::CancellationToken, future: F)
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = token.cancelled() => {}
        _ = future => {}
    }
}

async fn log_cleanup_loop(log_dir: PathBuf) {
    let mut interval = tokio::time::interval(LOG_CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        match cleanup_old_logs(&log_dir, APP_LOG_RETENTION_DAYS) {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "Old log files cleaned up"),
            Err(e) => tracing::warn!(error = %e, "Log cleanup failed"),
        }
    }
}

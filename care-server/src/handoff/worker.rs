//! Dispatch Worker - runs the side effects of committed order events
//!
//! Jobs are persisted in the same transaction as the mutation that caused
//! them. The worker receives fresh events from the EventRouter and scans the
//! pending table periodically for retries and for jobs left over from a
//! previous run.
//!
//! ```text
//! job
//!  ├─ routing pending? → HandoffRouter::route_on_transition
//!  │                      └─ needs manual routing → urgent alert to creator
//!  ├─ notification producers → ledger (idempotent per job)
//!  ├─ ok            → complete
//!  ├─ transient err → retry with backoff, dead letter after max_retries
//!  └─ other err     → dead letter
//! ```
//!
//! A dead-lettered job whose order is still waiting on its handoff flags the
//! order `needs_manual_routing` and alerts the creator.

use super::error::HandoffError;
use super::router::{HandoffRouter, RouteOutcome};
use crate::core::DispatchConfig;
use crate::notifications::{NotificationError, NotificationLedger, producers};
use crate::orders::{DispatchJob, ManagerError, OrdersManager};
use dashmap::DashMap;
use shared::order::{Order, OrderEvent, RoutingStatus};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

/// Jobs processed concurrently
const DISPATCH_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl DispatchError {
    fn is_transient(&self) -> bool {
        match self {
            DispatchError::Handoff(e) => e.is_transient(),
            DispatchError::Notification(NotificationError::Validation(_)) => false,
            DispatchError::Notification(_) => true,
        }
    }
}

/// Removes the job from the in-flight set on drop
struct JobGuard<'a> {
    in_flight: &'a DashMap<String, ()>,
    job_id: String,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.job_id);
    }
}

pub struct DispatchWorker {
    manager: Arc<OrdersManager>,
    router: Arc<HandoffRouter>,
    ledger: Arc<NotificationLedger>,
    config: DispatchConfig,
    in_flight: DashMap<String, ()>,
    semaphore: Arc<Semaphore>,
}

impl DispatchWorker {
    pub fn new(
        manager: Arc<OrdersManager>,
        router: Arc<HandoffRouter>,
        ledger: Arc<NotificationLedger>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            manager,
            router,
            ledger,
            config,
            in_flight: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(DISPATCH_CONCURRENCY)),
        }
    }

    /// Run until the channel closes or `shutdown` fires
    pub async fn run(
        self,
        mut event_rx: mpsc::Receiver<Arc<OrderEvent>>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(concurrency = DISPATCH_CONCURRENCY, "Dispatch worker started");
        let worker = Arc::new(self);

        // leftovers from the previous run
        worker.process_pending().await;

        let mut scan_interval =
            tokio::time::interval(Duration::from_secs(worker.config.scan_interval_secs.max(1)));
        scan_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Dispatch worker shutting down");
                    break;
                }
                event_opt = event_rx.recv() => {
                    let Some(event) = event_opt else {
                        tracing::info!("Dispatch channel closed, worker stopping");
                        break;
                    };
                    let w = Arc::clone(&worker);
                    tokio::spawn(async move {
                        let Ok(_permit) = w.semaphore.acquire().await else {
                            return;
                        };
                        w.process_event(&event).await;
                    });
                }
                _ = scan_interval.tick() => {
                    worker.process_pending().await;
                }
            }
        }
    }

    async fn process_event(&self, event: &OrderEvent) {
        match self.manager.storage().get_dispatch(&event.event_id) {
            Ok(Some(job)) => self.process_job(job).await,
            Ok(None) => {
                tracing::debug!(job_id = %event.event_id, "Dispatch job already handled");
            }
            Err(e) => {
                tracing::error!(job_id = %event.event_id, error = %e, "Failed to load dispatch job");
            }
        }
    }

    /// Process every pending job whose backoff has elapsed
    pub async fn process_pending(&self) {
        let pending = match self.manager.storage().get_pending_dispatches() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read pending dispatch queue");
                return;
            }
        };
        if pending.is_empty() {
            return;
        }
        tracing::debug!(count = pending.len(), "Scanning pending dispatch queue");

        let now = shared::util::now_millis();
        for job in pending {
            if job.retry_count >= self.config.max_retries {
                let error = job.last_error.clone().unwrap_or_else(|| "unknown error".into());
                self.exhaust(&job, job.retry_count, &error);
            } else if self.is_due(&job, now) {
                self.process_job(job).await;
            }
        }
    }

    fn is_due(&self, job: &DispatchJob, now: i64) -> bool {
        match job.last_attempt_at {
            None => true,
            Some(last) => {
                let delay = self.config.backoff(job.retry_count.saturating_sub(1));
                now >= last.saturating_add(delay.as_millis() as i64)
            }
        }
    }

    fn claim(&self, job_id: &str) -> Option<JobGuard<'_>> {
        if self.in_flight.insert(job_id.to_string(), ()).is_some() {
            return None;
        }
        Some(JobGuard {
            in_flight: &self.in_flight,
            job_id: job_id.to_string(),
        })
    }

    async fn process_job(&self, job: DispatchJob) {
        let Some(_guard) = self.claim(&job.job_id) else {
            return;
        };

        match self.execute(&job).await {
            Ok(()) => {
                if let Err(e) = self.manager.storage().complete_dispatch(&job.job_id) {
                    tracing::error!(job_id = %job.job_id, error = %e, "Failed to complete dispatch job");
                }
            }
            Err(e) if e.is_transient() => {
                let error = e.to_string();
                match self.manager.storage().mark_dispatch_failed(&job.job_id, &error) {
                    Ok(retries) if retries >= self.config.max_retries => {
                        self.exhaust(&job, retries, &error)
                    }
                    Ok(retries) => tracing::warn!(
                        job_id = %job.job_id,
                        order_id = %job.order_id,
                        retry_count = retries,
                        error = %error,
                        "Dispatch failed, will retry"
                    ),
                    Err(se) => {
                        tracing::error!(job_id = %job.job_id, error = %se, "Failed to record dispatch failure")
                    }
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job.job_id, order_id = %job.order_id, error = %e, "Dispatch failed permanently");
                self.exhaust(&job, job.retry_count + 1, &e.to_string());
            }
        }
    }

    async fn execute(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        let event = &job.event;

        if event.order.routing == RoutingStatus::Pending {
            match self.router.route_on_transition(event).await? {
                RouteOutcome::NeedsManualRouting { reason } => {
                    self.ledger.create_once(
                        &format!("{}:routing", job.job_id),
                        producers::routing_alert(&event.order, &reason),
                    )?;
                }
                outcome => {
                    tracing::debug!(order_id = %job.order_id, outcome = ?outcome, "Handoff done");
                }
            }
        }

        for (i, notification) in producers::notifications_for(event).into_iter().enumerate() {
            self.ledger
                .create_once(&format!("{}:{}", job.job_id, i), notification)?;
        }
        Ok(())
    }

    /// Dead-letter a job; a handoff that never happened becomes manual
    fn exhaust(&self, job: &DispatchJob, attempts: u32, error: &str) {
        if let Err(e) = self.manager.storage().move_to_dead_letter(&job.job_id, error) {
            tracing::error!(job_id = %job.job_id, error = %e, "Failed to dead-letter dispatch job");
            return;
        }

        let order = match self.manager.get(&job.order_id) {
            Ok(Some(order)) => order,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(order_id = %job.order_id, error = %e, "Failed to load order of dead job");
                return;
            }
        };
        if order.routing != RoutingStatus::Pending {
            return;
        }

        let reason = format!("handoff failed after {} attempts: {}", attempts, error);
        if let Err(e) = self.flag_for_manual_routing(&job.job_id, &order, &reason) {
            tracing::error!(order_id = %order.id, error = %e, "Failed to flag order for manual routing");
        }
    }

    fn flag_for_manual_routing(
        &self,
        job_id: &str,
        order: &Order,
        reason: &str,
    ) -> Result<(), DispatchError> {
        let flagged = self.manager.set_routing(
            &order.id,
            &RoutingStatus::Pending,
            RoutingStatus::NeedsManualRouting {
                reason: reason.to_string(),
            },
        );
        match flagged {
            Ok(_) => {}
            // resolved or closed while the job was retrying
            Err(ManagerError::Conflict(_)) => {
                tracing::info!(order_id = %order.id, "Routing settled before retries ran out");
                return Ok(());
            }
            Err(e) => return Err(HandoffError::from(e).into()),
        }
        self.ledger
            .create_once(&format!("{}:routing", job_id), producers::routing_alert(order, reason))?;
        tracing::warn!(order_id = %order.id, reason = %reason, "Order flagged for manual routing");
        Ok(())
    }
}

//! Event Router - fan-out of committed order events
//!
//! Decouples [`OrdersManager`](crate::orders::OrdersManager) from its
//! consumers; each consumer gets its own channel.
//!
//! ```text
//! OrdersManager (broadcast)
//!        │
//!        └── EventRouter
//!               ├── mpsc ──► DispatchWorker (events with side effects) [CRITICAL]
//!               └── mpsc ──► audit trail (all events) [best-effort]
//! ```
//!
//! The dispatch channel uses a blocking send. Losing an event there only
//! delays its side effects, since the job is already persisted and the
//! worker's periodic scan picks it up, but a full channel should still apply
//! back-pressure rather than drop. The audit channel drops when full.

use crate::orders::requires_dispatch;
use shared::order::OrderEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub struct EventChannels {
    pub dispatch_rx: mpsc::Receiver<Arc<OrderEvent>>,
    pub audit_rx: mpsc::Receiver<Arc<OrderEvent>>,
}

pub struct EventRouter {
    dispatch_tx: mpsc::Sender<Arc<OrderEvent>>,
    audit_tx: mpsc::Sender<Arc<OrderEvent>>,
}

impl EventRouter {
    pub fn new(dispatch_buffer: usize, audit_buffer: usize) -> (Self, EventChannels) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(dispatch_buffer);
        let (audit_tx, audit_rx) = mpsc::channel(audit_buffer);
        (
            Self {
                dispatch_tx,
                audit_tx,
            },
            EventChannels {
                dispatch_rx,
                audit_rx,
            },
        )
    }

    /// Run until the source channel closes
    pub async fn run(self, mut source: broadcast::Receiver<OrderEvent>) {
        tracing::info!("Event router started");

        loop {
            match source.recv().await {
                Ok(event) => self.dispatch(event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // persisted jobs are still picked up by the worker's scan
                    tracing::error!(skipped = n, "Event router lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Source channel closed, event router stopping");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, event: OrderEvent) {
        let event = Arc::new(event);

        if requires_dispatch(&event) && self.dispatch_tx.send(Arc::clone(&event)).await.is_err() {
            tracing::error!(order_id = %event.order_id(), "Dispatch channel closed");
        }

        match self.audit_tx.try_send(Arc::clone(&event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    order_id = %event.order_id(),
                    event_type = %event.event_type,
                    "Audit channel full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Audit channel closed");
            }
        }
    }
}

/// Write every committed event to the `audit` log target
pub async fn run_audit_trail(mut audit_rx: mpsc::Receiver<Arc<OrderEvent>>) {
    while let Some(event) = audit_rx.recv().await {
        crate::audit_log!(
            event = %event.event_type,
            order_id = %event.order_id(),
            kind = %event.order.kind,
            from = %event.previous_status.map(|s| s.as_str()).unwrap_or("-"),
            to = %event.new_status,
            actor_user_id = %event.actor.user_id,
            actor_tenant_id = %event.actor.tenant_id,
            actor_role = %event.actor.role,
            version = event.order.version
        );
    }
    tracing::debug!("Audit channel closed, audit trail stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{
        Actor, AppointmentPayload, Order, OrderEventType, OrderPayload, OrderStatus, Role,
        RoutingStatus,
    };

    fn make_event(event_type: OrderEventType, routing: RoutingStatus) -> OrderEvent {
        let mut order = Order::new(
            uuid::Uuid::new_v4().to_string(),
            "p-1".into(),
            OrderPayload::Appointment(AppointmentPayload {
                scheduled_at: 1,
                provider_name: "Dr. Adeyemi".into(),
                department: None,
                reason: None,
                clinical_notes: None,
            }),
            Actor::new("u-1", "h-1", Role::Receptionist),
            1,
        );
        order.routing = routing;
        OrderEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type,
            previous_status: None,
            new_status: OrderStatus::Scheduled,
            actor: order.created_by.clone(),
            timestamp: 1,
            order,
        }
    }

    #[tokio::test]
    async fn test_routing_by_side_effects() {
        let (router, mut channels) = EventRouter::new(16, 16);
        let (tx, rx) = broadcast::channel(16);
        tokio::spawn(router.run(rx));

        // plain appointment creation has no side effects
        tx.send(make_event(OrderEventType::Created, RoutingStatus::NotApplicable))
            .unwrap();
        assert!(channels.audit_rx.recv().await.is_some());

        let pending = make_event(OrderEventType::Transitioned, RoutingStatus::Pending);
        let pending_id = pending.event_id.clone();
        tx.send(pending).unwrap();
        assert!(channels.audit_rx.recv().await.is_some());

        let routed = channels.dispatch_rx.recv().await.unwrap();
        assert_eq!(routed.event_id, pending_id);
        assert!(channels.dispatch_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_audit_channel_does_not_block_dispatch() {
        let (router, mut channels) = EventRouter::new(16, 1);
        let (tx, rx) = broadcast::channel(16);
        tokio::spawn(router.run(rx));

        tx.send(make_event(OrderEventType::Created, RoutingStatus::NotApplicable))
            .unwrap();
        tx.send(make_event(OrderEventType::Created, RoutingStatus::NotApplicable))
            .unwrap();
        let pending = make_event(OrderEventType::Transitioned, RoutingStatus::Pending);
        let pending_id = pending.event_id.clone();
        tx.send(pending).unwrap();

        let routed = channels.dispatch_rx.recv().await.unwrap();
        assert_eq!(routed.event_id, pending_id);
    }
}

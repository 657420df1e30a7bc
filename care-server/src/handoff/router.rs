//! Handoff Router - links an order to its receiving tenant
//!
//! | Kind | Boundary status | Receiver |
//! |------|-----------------|----------|
//! | prescription | sent_to_pharmacy | patient's preferred pharmacy |
//! | lab_order | ordered | `performing_lab_id` |
//! | insurance_claim | submitted | `insurer_tenant_id`, then the claims processor |
//!
//! Only orders whose routing is `pending` are acted on, so replaying an event
//! is harmless.

use super::claims::ClaimsProcessor;
use super::directory::TenantDirectory;
use super::error::HandoffResult;
use crate::orders::{AssignOutcome, ManagerError, OrdersManager};
use shared::order::{Actor, Order, OrderEvent, OrderKind, RoutingStatus};
use shared::tenant::TenantKind;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No handoff due (not pending, terminal, or a kind without a receiver)
    NotApplicable,
    Routed { tenant_id: String },
    AlreadyRouted { tenant_id: String },
    NeedsManualRouting { reason: String },
}

/// Tenant kind that receives orders of `kind`
pub fn receiver_kind(kind: OrderKind) -> Option<TenantKind> {
    match kind {
        OrderKind::Appointment => None,
        OrderKind::Prescription => Some(TenantKind::Pharmacy),
        OrderKind::LabOrder => Some(TenantKind::Laboratory),
        OrderKind::InsuranceClaim => Some(TenantKind::Insurer),
    }
}

#[derive(Clone)]
pub struct HandoffRouter {
    manager: Arc<OrdersManager>,
    directory: Arc<dyn TenantDirectory>,
    claims: Arc<dyn ClaimsProcessor>,
}

impl std::fmt::Debug for HandoffRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffRouter").finish_non_exhaustive()
    }
}

impl HandoffRouter {
    pub fn new(
        manager: Arc<OrdersManager>,
        directory: Arc<dyn TenantDirectory>,
        claims: Arc<dyn ClaimsProcessor>,
    ) -> Self {
        Self {
            manager,
            directory,
            claims,
        }
    }

    pub fn directory(&self) -> &Arc<dyn TenantDirectory> {
        &self.directory
    }

    /// Run the handoff an event calls for
    ///
    /// The order is re-read, so a stale event never undoes newer state.
    pub async fn route_on_transition(&self, event: &OrderEvent) -> HandoffResult<RouteOutcome> {
        let order_id = event.order_id();
        let order = self
            .manager
            .get(order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;

        if order.routing != RoutingStatus::Pending {
            return Ok(match (&order.routing, order.counterparty_tenant_id) {
                (RoutingStatus::Routed, Some(tenant_id)) => RouteOutcome::AlreadyRouted { tenant_id },
                _ => RouteOutcome::NotApplicable,
            });
        }
        let pending = RoutingStatus::Pending;
        let Some(expected) = receiver_kind(order.kind) else {
            self.manager
                .set_routing(order_id, &pending, RoutingStatus::NotApplicable)?;
            return Ok(RouteOutcome::NotApplicable);
        };
        // covers claims whose submission is still being retried
        if order.is_terminal() {
            tracing::info!(order_id = %order_id, status = %order.status, "Order closed before handoff");
            self.manager
                .set_routing(order_id, &pending, RoutingStatus::NotApplicable)?;
            return Ok(RouteOutcome::NotApplicable);
        }

        let tenant_id = match self.resolve_receiver(&order, expected) {
            Ok(tenant_id) => tenant_id,
            Err(reason) => {
                tracing::warn!(order_id = %order_id, reason = %reason, "Order needs manual routing");
                self.manager.set_routing(
                    order_id,
                    &pending,
                    RoutingStatus::NeedsManualRouting {
                        reason: reason.clone(),
                    },
                )?;
                return Ok(RouteOutcome::NeedsManualRouting { reason });
            }
        };

        let routing = match order.kind {
            OrderKind::InsuranceClaim => RoutingStatus::Pending,
            _ => RoutingStatus::Routed,
        };
        let outcome = self.manager.assign_counterparty(order_id, &tenant_id, routing)?;

        if order.kind != OrderKind::InsuranceClaim {
            return Ok(match outcome {
                AssignOutcome::Assigned(_) => RouteOutcome::Routed { tenant_id },
                AssignOutcome::AlreadyAssigned(_) => RouteOutcome::AlreadyRouted { tenant_id },
            });
        }

        self.claims.submit(outcome.order()).await?;
        self.manager
            .set_routing(order_id, &pending, RoutingStatus::Routed)?;
        Ok(RouteOutcome::Routed { tenant_id })
    }

    /// Receiving tenant, or the reason none could be determined
    fn resolve_receiver(&self, order: &Order, expected: TenantKind) -> Result<String, String> {
        let candidate = match (&order.counterparty_tenant_id, order.kind) {
            (Some(existing), _) => Some(existing.clone()),
            (None, OrderKind::Prescription) => self.directory.preferred_pharmacy(&order.patient_id),
            (None, _) => order.payload.routing_target().map(str::to_string),
        };
        let Some(tenant_id) = candidate else {
            return Err(match order.kind {
                OrderKind::Prescription => {
                    format!("patient {} has no preferred pharmacy", order.patient_id)
                }
                OrderKind::LabOrder => "no performing laboratory named".to_string(),
                _ => "no insurer named".to_string(),
            });
        };

        if tenant_id == order.owner_tenant_id {
            return Err(format!("{} is the ordering tenant", tenant_id));
        }
        self.directory
            .require(&tenant_id, expected)
            .map(|t| t.id)
            .map_err(|e| e.to_string())
    }

    /// Resolve an order flagged for manual routing
    pub fn assign_manually(
        &self,
        order_id: &str,
        tenant_id: &str,
        actor: &Actor,
    ) -> HandoffResult<Order> {
        let order = self.manager.get_for(order_id, actor)?;
        let expected = receiver_kind(order.kind)
            .ok_or_else(|| ManagerError::RoutingNotRequired(order_id.to_string()))?;
        self.directory.require(tenant_id, expected)?;
        Ok(self
            .manager
            .assign_counterparty_manually(order_id, tenant_id, actor)?)
    }
}

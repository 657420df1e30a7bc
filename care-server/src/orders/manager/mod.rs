//! OrdersManager - validated order mutations and event generation
//!
//! Every mutation follows the same flow:
//!
//! ```text
//! mutate(order_id, request, actor)
//!     ├─ 1. Acquire the per-order in-flight guard (busy → Conflict)
//!     ├─ 2. Begin write transaction, load the order
//!     ├─ 3. Visibility check (unrelated tenant → NotFound)
//!     ├─ 4. Version compare-and-swap (stale → Conflict)
//!     ├─ 5. Validate against the transition table / payload rules
//!     ├─ 6. Apply, persist order + dispatch job
//!     ├─ 7. Commit
//!     ├─ 8. Release guard, broadcast event
//!     └─ 9. Return the committed order
//! ```
//!
//! Side effects (handoff, notifications) run in the dispatch worker after the
//! commit; their failure never rolls back a mutation.

mod error;
pub use error::*;

use super::storage::OrderStorage;
use crate::notifications::producers;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::order::{
    Actor, CorrectPayloadRequest, LabResult, Order, OrderEvent, OrderEventType, OrderKind,
    OrderPayload, OrderStatus, QueueEntry, Relationship, Role, RoutingStatus, StatusHistoryEntry,
    TransitionRequest, transitions,
};
use std::path::Path;
use tokio::sync::broadcast;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Whether a committed event has side effects for the dispatch worker
pub fn requires_dispatch(event: &OrderEvent) -> bool {
    event.order.routing == RoutingStatus::Pending || producers::triggers(event)
}

/// Result of linking an order to its receiving tenant
#[derive(Debug, Clone, PartialEq)]
pub enum AssignOutcome {
    Assigned(Order),
    /// Same tenant was already assigned; nothing written
    AlreadyAssigned(Order),
}

impl AssignOutcome {
    pub fn order(&self) -> &Order {
        match self {
            AssignOutcome::Assigned(o) | AssignOutcome::AlreadyAssigned(o) => o,
        }
    }
}

/// Held while a mutation on one order is in progress
pub(crate) struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, ()>,
    order_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.order_id);
    }
}

pub struct OrdersManager {
    storage: OrderStorage,
    event_tx: broadcast::Sender<OrderEvent>,
    in_flight: DashMap<String, ()>,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &"<OrderStorage>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl OrdersManager {
    /// Create a manager backed by the database at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> ManagerResult<Self> {
        let storage = OrderStorage::open(db_path)?;
        Ok(Self::with_storage(storage))
    }

    pub fn with_storage(storage: OrderStorage) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            event_tx,
            in_flight: DashMap::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.event_tx.subscribe()
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    pub(crate) fn acquire(&self, order_id: &str) -> ManagerResult<InFlightGuard<'_>> {
        match self.in_flight.entry(order_id.to_string()) {
            Entry::Occupied(_) => Err(ManagerError::Conflict(format!(
                "Order {} is being modified by another request",
                order_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard {
                    in_flight: &self.in_flight,
                    order_id: order_id.to_string(),
                })
            }
        }
    }

    fn broadcast(&self, event: OrderEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("Event broadcast skipped: no active receivers");
        }
    }

    fn build_event(
        event_type: OrderEventType,
        previous_status: Option<OrderStatus>,
        actor: &Actor,
        order: &Order,
        timestamp: i64,
    ) -> OrderEvent {
        OrderEvent {
            event_id: shared::util::new_id(),
            event_type,
            previous_status,
            new_status: order.status,
            actor: actor.clone(),
            timestamp,
            order: order.clone(),
        }
    }

    /// Persist `order`, enqueue its side effects and commit in one transaction
    fn commit(
        &self,
        txn: redb::WriteTransaction,
        order: &Order,
        event: &OrderEvent,
    ) -> ManagerResult<()> {
        self.storage.store_order(&txn, order)?;
        if requires_dispatch(event) {
            self.storage.enqueue_dispatch(&txn, event)?;
        }
        txn.commit().map_err(super::storage::StorageError::from)?;
        Ok(())
    }

    /// Load an order inside `txn`, hiding it from unrelated tenants
    fn load_related(
        &self,
        txn: &redb::WriteTransaction,
        order_id: &str,
        actor: &Actor,
    ) -> ManagerResult<(Order, Relationship)> {
        let order = self
            .storage
            .get_order_txn(txn, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;
        match order.relationship(&actor.tenant_id) {
            Relationship::Unrelated => Err(ManagerError::OrderNotFound(order_id.to_string())),
            rel => Ok((order, rel)),
        }
    }

    fn check_version(order: &Order, expected: Option<u64>) -> ManagerResult<()> {
        match expected {
            Some(v) if v != order.version => Err(ManagerError::Conflict(format!(
                "Order {} is at version {}, request expected {}",
                order.id, order.version, v
            ))),
            _ => Ok(()),
        }
    }

    // ========== Mutations ==========

    /// Create an order owned by the actor's tenant
    pub fn create_order(
        &self,
        patient_id: &str,
        payload: OrderPayload,
        actor: &Actor,
    ) -> ManagerResult<Order> {
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(ManagerError::Validation("patient_id is required".into()));
        }
        let kind = payload.kind();
        if !transitions::can_create(kind, actor.role) {
            return Err(ManagerError::RoleNotAllowed {
                role: actor.role,
                kind,
            });
        }
        payload
            .validate()
            .map_err(|field| ManagerError::Validation(format!("invalid or missing {}", field)))?;

        let now = shared::util::now_millis();
        let mut order = Order::new(
            shared::util::new_id(),
            patient_id.to_string(),
            payload,
            actor.clone(),
            now,
        );
        if transitions::is_handoff_boundary(kind, order.status) {
            order.routing = RoutingStatus::Pending;
        }

        let event = Self::build_event(OrderEventType::Created, None, actor, &order, now);
        let txn = self.storage.begin_write()?;
        self.commit(txn, &order, &event)?;

        tracing::info!(
            order_id = %order.id,
            kind = %kind,
            tenant_id = %actor.tenant_id,
            "Order created"
        );
        self.broadcast(event);
        Ok(order)
    }

    /// Move an order to `request.requested_status`
    pub fn apply_transition(
        &self,
        order_id: &str,
        request: TransitionRequest,
        actor: &Actor,
    ) -> ManagerResult<Order> {
        let _guard = self.acquire(order_id)?;

        let txn = self.storage.begin_write()?;
        let (mut order, relationship) = self.load_related(&txn, order_id, actor)?;
        Self::check_version(&order, request.expected_version)?;

        let from = order.status;
        let to = request.requested_status;
        let allowed = transitions::find_edge(order.kind, from, to)
            .is_some_and(|e| e.roles.contains(&actor.role) && e.party.admits(relationship));
        if !allowed {
            tracing::debug!(
                order_id = %order_id,
                from = %from,
                to = %to,
                role = %actor.role,
                relationship = ?relationship,
                "Transition rejected"
            );
            return Err(ManagerError::IllegalTransition { from, to });
        }

        let now = shared::util::now_millis();
        order.push_transition(StatusHistoryEntry {
            from_status: from,
            to_status: to,
            actor_user_id: actor.user_id.clone(),
            actor_role: actor.role,
            actor_tenant_id: actor.tenant_id.clone(),
            timestamp: now,
            note: request
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        });
        if transitions::is_handoff_boundary(order.kind, to) && order.counterparty_tenant_id.is_none()
        {
            order.routing = RoutingStatus::Pending;
        }

        let event = Self::build_event(OrderEventType::Transitioned, Some(from), actor, &order, now);
        self.commit(txn, &order, &event)?;

        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %to,
            version = order.version,
            "Order transitioned"
        );
        self.broadcast(event);
        Ok(order)
    }

    /// Replace the payload of a non-terminal order (owner tenant only)
    ///
    /// Correcting the routing target of an order flagged for manual routing
    /// re-queues its handoff.
    pub fn correct_payload(
        &self,
        order_id: &str,
        request: CorrectPayloadRequest,
        actor: &Actor,
    ) -> ManagerResult<Order> {
        let _guard = self.acquire(order_id)?;

        let txn = self.storage.begin_write()?;
        let (mut order, relationship) = self.load_related(&txn, order_id, actor)?;
        if relationship != Relationship::Owner {
            return Err(ManagerError::PermissionDenied(
                "Only the owning tenant can correct an order".into(),
            ));
        }
        if actor.role != Role::TenantAdmin && !transitions::can_create(order.kind, actor.role) {
            return Err(ManagerError::PermissionDenied(format!(
                "Role {} cannot correct {} orders",
                actor.role, order.kind
            )));
        }
        Self::check_version(&order, request.expected_version)?;
        if order.is_terminal() {
            return Err(ManagerError::OrderTerminal(order.status));
        }

        let mut payload = request.payload;
        if payload.kind() != order.kind {
            return Err(ManagerError::KindMismatch {
                expected: order.kind,
                actual: payload.kind(),
            });
        }
        payload
            .validate()
            .map_err(|field| ManagerError::Validation(format!("invalid or missing {}", field)))?;

        let target_changed = payload.routing_target() != order.payload.routing_target();
        if target_changed && order.counterparty_tenant_id.is_some() {
            let field = match order.kind {
                OrderKind::InsuranceClaim => "insurer_tenant_id",
                _ => "performing_lab_id",
            };
            return Err(ManagerError::FieldLocked(field));
        }

        // results are only written through record_lab_result
        if let (OrderPayload::LabOrder(new), OrderPayload::LabOrder(old)) =
            (&mut payload, &order.payload)
        {
            new.result = old.result.clone();
        }

        order.payload = payload;
        if target_changed && order.routing.needs_manual_routing() {
            order.routing = RoutingStatus::Pending;
        }
        let now = shared::util::now_millis();
        order.touch(now);

        let event = Self::build_event(
            OrderEventType::PayloadCorrected,
            Some(order.status),
            actor,
            &order,
            now,
        );
        self.commit(txn, &order, &event)?;

        tracing::info!(order_id = %order_id, version = order.version, "Order payload corrected");
        self.broadcast(event);
        Ok(order)
    }

    /// Attach a result to an in-progress lab order (performing laboratory only)
    pub fn record_lab_result(
        &self,
        order_id: &str,
        mut result: LabResult,
        actor: &Actor,
    ) -> ManagerResult<Order> {
        let _guard = self.acquire(order_id)?;

        let txn = self.storage.begin_write()?;
        let (mut order, relationship) = self.load_related(&txn, order_id, actor)?;
        if order.kind != OrderKind::LabOrder {
            return Err(ManagerError::KindMismatch {
                expected: OrderKind::LabOrder,
                actual: order.kind,
            });
        }
        if relationship != Relationship::Counterparty || actor.role != Role::LabTechnician {
            return Err(ManagerError::PermissionDenied(
                "Only a technician of the performing laboratory can record results".into(),
            ));
        }
        if order.status != OrderStatus::InProgress {
            return Err(ManagerError::WrongStatus {
                order_id: order_id.to_string(),
                expected: OrderStatus::InProgress,
                actual: order.status,
            });
        }
        if result.value.trim().is_empty() {
            return Err(ManagerError::Validation("result value is required".into()));
        }

        let now = shared::util::now_millis();
        result.recorded_at = now;
        if let OrderPayload::LabOrder(p) = &mut order.payload {
            p.result = Some(result);
        }
        order.touch(now);

        let event = Self::build_event(
            OrderEventType::ResultRecorded,
            Some(order.status),
            actor,
            &order,
            now,
        );
        self.commit(txn, &order, &event)?;

        tracing::info!(order_id = %order_id, "Lab result recorded");
        self.broadcast(event);
        Ok(order)
    }

    /// Resolve an order flagged for manual routing (owner tenant admin only)
    ///
    /// The caller has already checked `tenant_id` against the directory.
    pub fn assign_counterparty_manually(
        &self,
        order_id: &str,
        tenant_id: &str,
        actor: &Actor,
    ) -> ManagerResult<Order> {
        let _guard = self.acquire(order_id)?;

        let txn = self.storage.begin_write()?;
        let (mut order, relationship) = self.load_related(&txn, order_id, actor)?;
        if relationship != Relationship::Owner || actor.role != Role::TenantAdmin {
            return Err(ManagerError::PermissionDenied(
                "Only an administrator of the owning tenant can route an order".into(),
            ));
        }
        if let Some(existing) = &order.counterparty_tenant_id
            && existing != tenant_id
        {
            return Err(ManagerError::CounterpartyAlreadyAssigned {
                order_id: order_id.to_string(),
                tenant_id: existing.clone(),
            });
        }
        if !order.routing.needs_manual_routing() {
            return Err(ManagerError::RoutingNotRequired(order_id.to_string()));
        }
        if tenant_id == order.owner_tenant_id {
            return Err(ManagerError::Validation(
                "An order cannot be routed to its own tenant".into(),
            ));
        }

        let now = shared::util::now_millis();
        if order.counterparty_tenant_id.is_none() {
            order.counterparty_tenant_id = Some(tenant_id.to_string());
            self.storage
                .insert_queue_entry(&txn, &Self::queue_entry(&order, tenant_id, now))?;
        }
        // claims still have to reach the claims processor
        order.routing = match order.kind {
            OrderKind::InsuranceClaim => RoutingStatus::Pending,
            _ => RoutingStatus::Routed,
        };

        let event = Self::build_event(
            OrderEventType::ManuallyRouted,
            Some(order.status),
            actor,
            &order,
            now,
        );
        self.commit(txn, &order, &event)?;

        tracing::info!(order_id = %order_id, tenant_id = %tenant_id, "Order routed manually");
        self.broadcast(event);
        Ok(order)
    }

    // ========== Routing bookkeeping (dispatch worker) ==========

    fn queue_entry(order: &Order, tenant_id: &str, now: i64) -> QueueEntry {
        QueueEntry {
            tenant_id: tenant_id.to_string(),
            order_id: order.id.clone(),
            kind: order.kind,
            patient_id: order.patient_id.clone(),
            source_tenant_id: order.owner_tenant_id.clone(),
            queued_at: now,
        }
    }

    /// Link an order to its receiving tenant and queue it there, exactly once
    ///
    /// Neither `version` nor `updated_at` changes.
    pub fn assign_counterparty(
        &self,
        order_id: &str,
        tenant_id: &str,
        routing: RoutingStatus,
    ) -> ManagerResult<AssignOutcome> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;

        if let Some(existing) = order.counterparty_tenant_id.clone() {
            if existing == tenant_id {
                return Ok(AssignOutcome::AlreadyAssigned(order));
            }
            return Err(ManagerError::CounterpartyAlreadyAssigned {
                order_id: order_id.to_string(),
                tenant_id: existing,
            });
        }

        order.counterparty_tenant_id = Some(tenant_id.to_string());
        order.routing = routing;
        let entry = Self::queue_entry(&order, tenant_id, shared::util::now_millis());
        self.storage.insert_queue_entry(&txn, &entry)?;
        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(super::storage::StorageError::from)?;

        tracing::info!(order_id = %order_id, tenant_id = %tenant_id, "Counterparty assigned");
        Ok(AssignOutcome::Assigned(order))
    }

    /// Move the routing state from `expected` to `routing`
    ///
    /// `Conflict` when the stored state is no longer `expected`; nothing is
    /// written in that case.
    pub fn set_routing(
        &self,
        order_id: &str,
        expected: &RoutingStatus,
        routing: RoutingStatus,
    ) -> ManagerResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;
        if &order.routing != expected {
            return Err(ManagerError::Conflict(format!(
                "Order {} routing changed concurrently",
                order_id
            )));
        }
        order.routing = routing;
        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(super::storage::StorageError::from)?;
        Ok(order)
    }

    // ========== Reads ==========

    /// Raw order, without tenant checks
    pub fn get(&self, order_id: &str) -> ManagerResult<Option<Order>> {
        Ok(self.storage.get_order(order_id)?)
    }

    /// Order as far as `actor`'s tenant is allowed to know it exists
    pub fn get_for(&self, order_id: &str, actor: &Actor) -> ManagerResult<Order> {
        match self.storage.get_order(order_id)? {
            Some(order) if order.relationship(&actor.tenant_id) != Relationship::Unrelated => {
                Ok(order)
            }
            _ => Err(ManagerError::OrderNotFound(order_id.to_string())),
        }
    }

    /// Orders the actor's tenant owns or receives, optionally filtered
    pub fn list_orders(
        &self,
        actor: &Actor,
        patient_id: Option<&str>,
        kind: Option<OrderKind>,
    ) -> ManagerResult<Vec<Order>> {
        let mut orders = match patient_id {
            Some(patient_id) => self.storage.get_orders_for_patient(patient_id)?,
            None => {
                let mut orders = self.storage.get_orders_for_owner(&actor.tenant_id)?;
                for entry in self.storage.get_queue(&actor.tenant_id)? {
                    if let Some(order) = self.storage.get_order(&entry.order_id)? {
                        orders.push(order);
                    }
                }
                orders.sort_by_key(|o| o.created_at);
                orders
            }
        };
        orders.retain(|o| {
            o.relationship(&actor.tenant_id) != Relationship::Unrelated
                && kind.is_none_or(|k| o.kind == k)
        });
        Ok(orders)
    }

    /// Handoff queue of a receiving tenant
    pub fn tenant_queue(&self, tenant_id: &str) -> ManagerResult<Vec<QueueEntry>> {
        Ok(self.storage.get_queue(tenant_id)?)
    }
}

#[cfg(test)]
mod tests;

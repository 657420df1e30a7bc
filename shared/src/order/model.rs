//! Order record and its append-only history

use super::payload::OrderPayload;
use super::transitions;
use super::types::{Actor, OrderKind, OrderStatus, Relationship, Role};
use serde::{Deserialize, Serialize};

/// One applied transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub actor_user_id: String,
    pub actor_role: Role,
    pub actor_tenant_id: String,
    /// Unix millis
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Handoff state of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RoutingStatus {
    /// Kind has no handoff, or the boundary has not been reached yet
    #[default]
    NotApplicable,
    /// Boundary reached, side effects still running
    Pending,
    /// Counterparty assigned and queued
    Routed,
    /// Receiver could not be resolved; a tenant admin has to assign one
    NeedsManualRouting { reason: String },
}

impl RoutingStatus {
    pub fn needs_manual_routing(&self) -> bool {
        matches!(self, RoutingStatus::NeedsManualRouting { .. })
    }
}

/// A clinical order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub kind: OrderKind,
    pub owner_tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_tenant_id: Option<String>,
    pub patient_id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    pub payload: OrderPayload,
    pub created_by: Actor,
    #[serde(default)]
    pub routing: RoutingStatus,
    /// Incremented by every transition and payload correction
    pub version: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Build a fresh order in its kind's initial status
    pub fn new(
        id: String,
        patient_id: String,
        payload: OrderPayload,
        created_by: Actor,
        now: i64,
    ) -> Self {
        let kind = payload.kind();
        Self {
            id,
            kind,
            owner_tenant_id: created_by.tenant_id.clone(),
            counterparty_tenant_id: None,
            patient_id,
            status: transitions::initial_status(kind),
            status_history: Vec::new(),
            payload,
            created_by,
            routing: RoutingStatus::NotApplicable,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn relationship(&self, tenant_id: &str) -> Relationship {
        if self.owner_tenant_id == tenant_id {
            Relationship::Owner
        } else if self.counterparty_tenant_id.as_deref() == Some(tenant_id) {
            Relationship::Counterparty
        } else {
            Relationship::Unrelated
        }
    }

    pub fn is_terminal(&self) -> bool {
        transitions::is_terminal(self.kind, self.status)
    }

    /// Status implied by the history (initial status when empty)
    pub fn derived_status(&self) -> OrderStatus {
        self.status_history
            .last()
            .map(|e| e.to_status)
            .unwrap_or_else(|| transitions::initial_status(self.kind))
    }

    /// Append a history entry and move to its target status
    ///
    /// `updated_at` never goes backwards even if the clock does.
    pub fn push_transition(&mut self, entry: StatusHistoryEntry) {
        self.updated_at = self.updated_at.max(entry.timestamp);
        self.status = entry.to_status;
        self.status_history.push(entry);
        self.version += 1;
    }

    /// Record a non-status mutation (payload correction, lab result)
    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
        self.version += 1;
    }
}

/// Entry in a receiving tenant's work queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub tenant_id: String,
    pub order_id: String,
    pub kind: OrderKind,
    pub patient_id: String,
    pub source_tenant_id: String,
    pub queued_at: i64,
}

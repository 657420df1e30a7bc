//! Redacted projections of an order, as returned to a viewer

use super::model::RoutingStatus;
use super::types::{OrderKind, OrderStatus, Relationship, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// History entry as seen by a viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntryView {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    /// Withheld when the entry was written by the other party
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
    pub actor_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_tenant_id: Option<String>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Order projection for one (tenant, role)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderView {
    pub id: String,
    pub kind: OrderKind,
    pub patient_id: String,
    pub status: OrderStatus,
    pub relationship: Relationship,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty_tenant_id: Option<String>,
    pub status_history: Vec<HistoryEntryView>,
    /// Only the payload fields this viewer may read
    pub payload: Map<String, Value>,
    pub routing: RoutingStatus,
    pub version: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OrderView {
    pub fn payload_field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

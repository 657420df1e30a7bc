//! Request bodies for order operations

use super::payload::{LabResult, OrderPayload};
use super::types::{OrderKind, OrderStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub patient_id: String,
    pub payload: OrderPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub requested_status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Compare-and-swap token; rejected with a conflict when stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl TransitionRequest {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            requested_status: status,
            note: None,
            expected_version: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectPayloadRequest {
    pub payload: OrderPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResultRequest {
    pub result: LabResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualRouteRequest {
    pub tenant_id: String,
}

/// Query string of `GET /api/orders`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<OrderKind>,
}

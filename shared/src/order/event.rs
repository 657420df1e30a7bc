//! Order events - facts broadcast after a mutation commits

use super::model::Order;
use super::types::{Actor, OrderStatus};
use serde::{Deserialize, Serialize};

/// What happened to the order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventType {
    Created,
    Transitioned,
    PayloadCorrected,
    ResultRecorded,
    ManuallyRouted,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderEventType::Created => write!(f, "CREATED"),
            OrderEventType::Transitioned => write!(f, "TRANSITIONED"),
            OrderEventType::PayloadCorrected => write!(f, "PAYLOAD_CORRECTED"),
            OrderEventType::ResultRecorded => write!(f, "RESULT_RECORDED"),
            OrderEventType::ManuallyRouted => write!(f, "MANUALLY_ROUTED"),
        }
    }
}

/// Committed order change
///
/// Carries the order as it was committed so consumers never re-read a newer
/// version by accident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_id: String,
    pub event_type: OrderEventType,
    /// `None` for creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub actor: Actor,
    /// Server timestamp (Unix millis)
    pub timestamp: i64,
    pub order: Order,
}

impl OrderEvent {
    pub fn order_id(&self) -> &str {
        &self.order.id
    }

    /// Whether the status actually moved (creation counts as a move)
    pub fn is_status_change(&self) -> bool {
        matches!(
            self.event_type,
            OrderEventType::Created | OrderEventType::Transitioned
        )
    }
}

//! Notifications derived from order events
//!
//! | Event | Recipient | Priority |
//! |-------|-----------|----------|
//! | lab order → completed | ordering physician | from the result flag |
//! | prescription → filled | prescriber | normal |
//! | insurance claim → denied | creator | normal |
//! | routing failure | creator | urgent |

use shared::notification::{CreateNotification, NotificationPriority, NotificationSubject};
use shared::order::{
    Order, OrderEvent, OrderEventType, OrderKind, OrderPayload, OrderStatus, ResultFlag,
};

fn to_owner(order: &Order, user_id: &str, title: String, body: Option<String>) -> CreateNotification {
    CreateNotification {
        subject: NotificationSubject::Order(order.id.clone()),
        recipient_user_id: user_id.to_string(),
        recipient_tenant_id: order.owner_tenant_id.clone(),
        title,
        body,
        priority: NotificationPriority::Normal,
    }
}

/// Notifications an event should produce, in a stable order
pub fn notifications_for(event: &OrderEvent) -> Vec<CreateNotification> {
    if event.event_type != OrderEventType::Transitioned {
        return Vec::new();
    }
    let order = &event.order;

    match (order.kind, event.new_status, &order.payload) {
        (OrderKind::LabOrder, OrderStatus::Completed, OrderPayload::LabOrder(p)) => {
            let priority = match p.result.as_ref().map(|r| r.flag) {
                Some(ResultFlag::Critical) => NotificationPriority::Emergency,
                Some(ResultFlag::Abnormal) => NotificationPriority::Urgent,
                _ => NotificationPriority::Normal,
            };
            let body = p.result.as_ref().map(|r| match &r.unit {
                Some(unit) => format!("{} {}", r.value, unit),
                None => r.value.clone(),
            });
            let mut n = to_owner(
                order,
                &p.ordering_physician_user_id,
                format!("Lab result available: {}", p.test_name),
                body,
            );
            n.priority = priority;
            vec![n]
        }
        (OrderKind::Prescription, OrderStatus::Filled, OrderPayload::Prescription(p)) => {
            vec![to_owner(
                order,
                &p.prescriber_user_id,
                format!("Prescription filled: {}", p.medication),
                None,
            )]
        }
        (OrderKind::InsuranceClaim, OrderStatus::Denied, OrderPayload::InsuranceClaim(p)) => {
            vec![to_owner(
                order,
                &order.created_by.user_id,
                format!("Insurance claim denied: {}", p.policy_number),
                event
                    .order
                    .status_history
                    .last()
                    .and_then(|e| e.note.clone()),
            )]
        }
        _ => Vec::new(),
    }
}

/// Whether [`notifications_for`] yields anything for this event
pub fn triggers(event: &OrderEvent) -> bool {
    event.event_type == OrderEventType::Transitioned
        && matches!(
            (event.order.kind, event.new_status),
            (OrderKind::LabOrder, OrderStatus::Completed)
                | (OrderKind::Prescription, OrderStatus::Filled)
                | (OrderKind::InsuranceClaim, OrderStatus::Denied)
        )
}

/// Urgent alert to the creator of an order that could not be handed off
pub fn routing_alert(order: &Order, reason: &str) -> CreateNotification {
    CreateNotification {
        subject: NotificationSubject::Order(order.id.clone()),
        recipient_user_id: order.created_by.user_id.clone(),
        recipient_tenant_id: order.owner_tenant_id.clone(),
        title: format!("{} needs manual routing", order.kind),
        body: Some(reason.to_string()),
        priority: NotificationPriority::Urgent,
    }
}

use super::rules::{self, MaskRule};
use serde_json::{Map, Value};
use shared::order::{
    Actor, HistoryEntryView, Order, OrderView, Relationship, StatusHistoryEntry,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VisibilityError {
    #[error("Tenant {tenant_id} ({role}) may not view order {order_id}")]
    Forbidden {
        order_id: String,
        tenant_id: String,
        role: shared::Role,
    },

    #[error("Order payload could not be projected: {0}")]
    Projection(String),
}

impl From<VisibilityError> for shared::AppError {
    fn from(err: VisibilityError) -> Self {
        match err {
            VisibilityError::Forbidden { order_id, .. } => {
                shared::AppError::permission_denied(format!("Order {} is not visible", order_id))
                    .with_detail("order_id", order_id)
            }
            VisibilityError::Projection(msg) => shared::AppError::internal(msg),
        }
    }
}

/// Project `order` for `viewer`, withholding what their tenant and role may not read
pub fn redact(order: &Order, viewer: &Actor) -> Result<OrderView, VisibilityError> {
    let relationship = order.relationship(&viewer.tenant_id);
    let rule = rules::lookup(order.kind, relationship, viewer.role).ok_or_else(|| {
        VisibilityError::Forbidden {
            order_id: order.id.clone(),
            tenant_id: viewer.tenant_id.clone(),
            role: viewer.role,
        }
    })?;

    let payload = mask_payload(order, rule)?;
    let status_history = order
        .status_history
        .iter()
        .map(|entry| history_view(entry, viewer, relationship, rule))
        .collect();

    let (owner_tenant_id, counterparty_tenant_id) = match relationship {
        Relationship::Owner => (
            Some(order.owner_tenant_id.clone()),
            order.counterparty_tenant_id.clone(),
        ),
        _ => (
            rule.disclose_linked_tenant
                .then(|| order.owner_tenant_id.clone()),
            order.counterparty_tenant_id.clone(),
        ),
    };

    Ok(OrderView {
        id: order.id.clone(),
        kind: order.kind,
        patient_id: order.patient_id.clone(),
        status: order.status,
        relationship,
        owner_tenant_id,
        counterparty_tenant_id,
        status_history,
        payload,
        routing: order.routing.clone(),
        version: order.version,
        created_at: order.created_at,
        updated_at: order.updated_at,
    })
}

fn mask_payload(order: &Order, rule: &MaskRule) -> Result<Map<String, Value>, VisibilityError> {
    let value = serde_json::to_value(&order.payload)
        .map_err(|e| VisibilityError::Projection(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(VisibilityError::Projection(format!(
            "payload of order {} is not an object",
            order.id
        )));
    };
    Ok(fields
        .into_iter()
        .filter(|(name, _)| name == "kind" || rule.fields.allows(name))
        .collect())
}

fn history_view(
    entry: &StatusHistoryEntry,
    viewer: &Actor,
    relationship: Relationship,
    rule: &MaskRule,
) -> HistoryEntryView {
    let own_side = entry.actor_tenant_id == viewer.tenant_id;
    let reveal = own_side || relationship == Relationship::Owner;
    HistoryEntryView {
        from_status: entry.from_status,
        to_status: entry.to_status,
        actor_user_id: reveal.then(|| entry.actor_user_id.clone()),
        actor_role: entry.actor_role,
        actor_tenant_id: (reveal || rule.disclose_linked_tenant)
            .then(|| entry.actor_tenant_id.clone()),
        timestamp: entry.timestamp,
        // free text, so the payload mask cannot vouch for it
        note: entry.note.clone().filter(|_| reveal),
    }
}

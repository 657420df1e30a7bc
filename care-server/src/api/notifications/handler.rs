use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::notification::{
    CreateNotification, NotificationListQuery, NotificationRecord, NotificationSubject,
    UnreadCount,
};
use shared::order::Relationship;
use shared::{ApiResponse, AppError, AppResult};

use crate::auth::CurrentActor;
use crate::core::ServerState;

pub async fn list(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Query(query): Query<NotificationListQuery>,
) -> AppResult<Json<ApiResponse<Vec<NotificationRecord>>>> {
    let records = state.notifications.list_for(&actor, query.unread_only)?;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn unread_count(
    State(state): State<ServerState>,
    actor: CurrentActor,
) -> AppResult<Json<ApiResponse<UnreadCount>>> {
    let unread = state.notifications.unread_count(&actor)?;
    Ok(Json(ApiResponse::success(UnreadCount { unread })))
}

/// Send a notification to a user
///
/// Message notifications stay inside the sender's tenant. Order
/// notifications may cross tenants, but only between the two parties of
/// that order.
pub async fn create(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Json(payload): Json<CreateNotification>,
) -> AppResult<Json<ApiResponse<NotificationRecord>>> {
    match &payload.subject {
        NotificationSubject::Message(_) => {
            if payload.recipient_tenant_id != actor.tenant_id {
                return Err(AppError::permission_denied(
                    "Message notifications cannot leave the sender's tenant",
                ));
            }
        }
        NotificationSubject::Order(order_id) => {
            let order = state.orders.get_for(order_id, &actor)?;
            if order.relationship(&payload.recipient_tenant_id) == Relationship::Unrelated {
                return Err(AppError::permission_denied(format!(
                    "Tenant {} is not a party to order {}",
                    payload.recipient_tenant_id, order_id
                )));
            }
        }
    }

    let record = state.notifications.create(payload)?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn mark_read(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<NotificationRecord>>> {
    let record = state.notifications.mark_read(&id, &actor)?;
    Ok(Json(ApiResponse::success(record)))
}

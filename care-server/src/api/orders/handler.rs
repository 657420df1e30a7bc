//! Order API handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::order::{
    CorrectPayloadRequest, CreateOrderRequest, ManualRouteRequest, Order, OrderListQuery,
    OrderView, RecordResultRequest, TransitionRequest,
};
use shared::{ApiResponse, AppError, AppResult};

use crate::audit_log;
use crate::auth::CurrentActor;
use crate::core::ServerState;
use crate::visibility::{self, VisibilityError};

type ViewResponse = AppResult<Json<ApiResponse<OrderView>>>;

/// The caller's view of an order it has just acted on
fn respond(order: &Order, actor: &CurrentActor) -> ViewResponse {
    let view = visibility::redact(order, actor)?;
    Ok(Json(ApiResponse::success(view)))
}

/// Create an order
pub async fn create(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Json(payload): Json<CreateOrderRequest>,
) -> ViewResponse {
    let order = state
        .orders
        .create_order(&payload.patient_id, payload.payload, &actor)?;
    audit_log!(
        action = "order_created",
        order_id = %order.id,
        kind = %order.kind,
        user_id = %actor.user_id,
        tenant_id = %actor.tenant_id
    );
    respond(&order, &actor)
}

/// List the orders the caller's tenant owns or receives
///
/// Orders the caller's role has no view of are left out rather than
/// failing the whole list.
pub async fn list(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<Vec<OrderView>>>> {
    let patient_id = query
        .patient_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let orders = state.orders.list_orders(&actor, patient_id, query.kind)?;

    let mut views = Vec::with_capacity(orders.len());
    for order in &orders {
        match visibility::redact(order, &actor) {
            Ok(view) => views.push(view),
            Err(VisibilityError::Forbidden { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Json(ApiResponse::success(views)))
}

/// Get a single order
pub async fn get_by_id(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Path(id): Path<String>,
) -> ViewResponse {
    let order = state
        .orders
        .get(&id)?
        .ok_or_else(|| AppError::order_not_found(id.clone()))?;
    respond(&order, &actor)
}

/// Request a status change
pub async fn transition(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Path(id): Path<String>,
    Json(payload): Json<TransitionRequest>,
) -> ViewResponse {
    let to = payload.requested_status;
    let order = state.orders.apply_transition(&id, payload, &actor)?;
    audit_log!(
        action = "order_transitioned",
        order_id = %id,
        to = %to,
        version = order.version,
        user_id = %actor.user_id,
        tenant_id = %actor.tenant_id
    );
    respond(&order, &actor)
}

/// Replace the payload of an order
pub async fn correct_payload(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Path(id): Path<String>,
    Json(payload): Json<CorrectPayloadRequest>,
) -> ViewResponse {
    let order = state.orders.correct_payload(&id, payload, &actor)?;
    audit_log!(
        action = "order_payload_corrected",
        order_id = %id,
        version = order.version,
        user_id = %actor.user_id,
        tenant_id = %actor.tenant_id
    );
    respond(&order, &actor)
}

/// Attach a lab result
pub async fn record_result(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Path(id): Path<String>,
    Json(payload): Json<RecordResultRequest>,
) -> ViewResponse {
    let order = state.orders.record_lab_result(&id, payload.result, &actor)?;
    audit_log!(
        action = "lab_result_recorded",
        order_id = %id,
        user_id = %actor.user_id,
        tenant_id = %actor.tenant_id
    );
    respond(&order, &actor)
}

/// Assign the receiving tenant of an order flagged for manual routing
pub async fn route_manually(
    State(state): State<ServerState>,
    actor: CurrentActor,
    Path(id): Path<String>,
    Json(payload): Json<ManualRouteRequest>,
) -> ViewResponse {
    let tenant_id = payload.tenant_id.trim();
    if tenant_id.is_empty() {
        return Err(AppError::validation("tenant_id is required"));
    }
    let order = state.router.assign_manually(&id, tenant_id, &actor)?;
    audit_log!(
        action = "order_routed_manually",
        order_id = %id,
        counterparty = %tenant_id,
        user_id = %actor.user_id,
        tenant_id = %actor.tenant_id
    );
    respond(&order, &actor)
}

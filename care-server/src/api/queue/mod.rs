//! Handoff queue of the caller's tenant
//!
//! `GET /api/queue` lists the orders routed to the caller's tenant, oldest
//! first, each redacted for the caller's role.

use axum::{Json, Router, extract::State, routing::get};
use shared::order::OrderView;
use shared::{ApiResponse, AppResult};

use crate::auth::CurrentActor;
use crate::core::ServerState;
use crate::visibility::{self, VisibilityError};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/queue", get(list))
}

async fn list(
    State(state): State<ServerState>,
    actor: CurrentActor,
) -> AppResult<Json<ApiResponse<Vec<OrderView>>>> {
    let entries = state.orders.tenant_queue(&actor.tenant_id)?;

    let mut views = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(order) = state.orders.get(&entry.order_id)? else {
            tracing::warn!(order_id = %entry.order_id, "Queue entry without order");
            continue;
        };
        match visibility::redact(&order, &actor) {
            Ok(view) => views.push(view),
            // role has no view of this kind
            Err(VisibilityError::Forbidden { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Json(ApiResponse::success(views)))
}

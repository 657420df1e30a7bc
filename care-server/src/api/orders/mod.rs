//! Order API
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/orders | POST | Create an order owned by the caller's tenant |
//! | /api/orders | GET | List visible orders (`patient_id`, `kind`) |
//! | /api/orders/{id} | GET | Redacted order, 403 for unrelated tenants |
//! | /api/orders/{id}/transition | POST | Request a status change |
//! | /api/orders/{id}/payload | PUT | Correct the payload (owner tenant) |
//! | /api/orders/{id}/result | POST | Record a lab result (performing lab) |
//! | /api/orders/{id}/route | POST | Resolve manual routing (owner admin) |
//!
//! Every response carries the order as the caller is allowed to see it.

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/transition", post(handler::transition))
        .route("/{id}/payload", put(handler::correct_payload))
        .route("/{id}/result", post(handler::record_result))
        .route("/{id}/route", post(handler::route_manually))
}

//! Health check
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /api/health | GET | none |
//!
//! ```json
//! {
//!   "status": "ok",
//!   "version": "0.1.0",
//!   "orders": 12,
//!   "pending_dispatch": 0,
//!   "dead_letters": 0
//! }
//! ```
//!
//! `status` turns `degraded` when dead letters exist; they need an operator.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use shared::{ApiResponse, AppResult};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    orders: u64,
    pending_dispatch: u64,
    dead_letters: u64,
}

async fn health(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<HealthResponse>>> {
    let stats = state
        .orders
        .storage()
        .get_stats()
        .map_err(|e| shared::AppError::database(e.to_string()))?;

    let status = if stats.dead_letter_count > 0 {
        "degraded"
    } else {
        "ok"
    };
    Ok(Json(ApiResponse::success(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        orders: stats.order_count,
        pending_dispatch: stats.pending_dispatch_count,
        dead_letters: stats.dead_letter_count,
    })))
}

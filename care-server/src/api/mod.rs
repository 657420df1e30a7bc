//! HTTP API
//!
//! # Structure
//!
//! - [`health`] - liveness and dispatch backlog
//! - [`orders`] - order lifecycle
//! - [`queue`] - handoff queue of the caller's tenant
//! - [`notifications`] - the caller's notifications
//!
//! Every route except `/api/health` requires the gateway identity headers
//! (see [`crate::auth`]).

pub mod health;
pub mod notifications;
pub mod orders;
pub mod queue;


use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// HTTP access log
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();
    tracing::info!(target: "http_access", "{} {} {}", method, uri, status);

    response
}

/// Build the Axum router (without state)
pub fn build_app() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(queue::router())
        .merge(notifications::router())
}

/// Requests running past `timeout` are answered 408
fn timeout_layer(timeout: std::time::Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(http::StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Router with state and the HTTP middleware stack applied
pub fn build_router(state: ServerState) -> Router {
    let timeout = state.config.request_timeout();
    build_app()
        .with_state(state)
        .layer(timeout_layer(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_request))
}

//! Notification API
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/notifications | GET | The caller's notifications (`unread_only`) |
//! | /api/notifications | POST | Send a notification |
//! | /api/notifications/unread-count | GET | Unread count for badges |
//! | /api/notifications/{id}/read | POST | Mark read (recipient only) |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/notifications", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/unread-count", get(handler::unread_count))
        .route("/{id}/read", post(handler::mark_read))
}

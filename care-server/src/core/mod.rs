//! Server core: configuration, state, background tasks and event routing
//!
//! - [`Config`] - environment-driven configuration
//! - [`ServerState`] - shared service handles
//! - [`Server`] - HTTP server
//! - [`EventRouter`] - fan-out of committed order events
//! - [`BackgroundTasks`] - lifecycle of long-running tasks

pub mod config;
pub mod error;
pub mod event_router;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{Config, DispatchConfig};
pub use error::{Result, ServerError};
pub use event_router::{EventChannels, EventRouter};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};

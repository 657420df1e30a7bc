//! Client configuration

use shared::{Actor, Role};
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration for connecting to the care server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:3000")
    pub base_url: String,

    /// Identity forwarded in the gateway headers
    pub actor: Actor,

    /// Network read timeout; a timed-out read falls back to the cache
    pub timeout: Duration,

    /// Where the cache snapshot lives, if it should survive restarts
    pub snapshot_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            actor: Actor::new(user_id, tenant_id, role),
            timeout: Duration::from_secs(10),
            snapshot_path: None,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Persist the cache to `path`
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}

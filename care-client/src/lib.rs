//! Care Client - HTTP client for the care server
//!
//! - [`CareClient`] - typed API calls; reads are cached, mutations are not
//! - [`SyncCache`] - offline-degraded read cache with freshness flags
//! - [`Transport`] - wire seam; [`NetworkHttpClient`] talks reqwest

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheKey, Cached, Freshness, SyncCache};
pub use client::CareClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::{ApiReply, ApiRequest, NetworkHttpClient, Transport};

// Re-export shared types for convenience
pub use shared::order::{OrderListQuery, OrderView, TransitionRequest};
pub use shared::{ApiResponse, Actor, Role};

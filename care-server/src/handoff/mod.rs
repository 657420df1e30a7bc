//! Cross-tenant handoff
//!
//! - [`directory`] - tenant registry and preferred pharmacies
//! - [`claims`] - external claims processor
//! - [`router`] - assigns the receiving tenant at a handoff boundary
//! - [`worker`] - runs routing and notifications after commit, with retries

pub mod claims;
pub mod directory;
mod error;
pub mod router;
pub mod worker;

pub use claims::{ClaimsProcessor, HttpClaimsProcessor, NoopClaimsProcessor};
pub use directory::{InMemoryDirectory, TenantDirectory};
pub use error::{HandoffError, HandoffResult};
pub use router::{HandoffRouter, RouteOutcome};
pub use worker::DispatchWorker;

#[cfg(test)]
mod tests;

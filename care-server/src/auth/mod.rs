//! Caller identity
//!
//! Authentication happens upstream; the gateway forwards the resolved
//! identity in request headers and this module turns them into an
//! [`Actor`](shared::Actor).

mod extractor;

pub use extractor::{CurrentActor, ROLE_HEADER, TENANT_HEADER, USER_HEADER};

//! Per-viewer order projections
//!
//! A tenant sees an order only if it owns or receives it, and then only the
//! payload fields its role needs. The stored order is never modified.

mod resolver;
pub mod rules;

pub use resolver::{VisibilityError, redact};

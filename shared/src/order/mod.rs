//! Clinical order model
//!
//! - Types: kinds, statuses, roles and the caller identity
//! - Payloads: kind-specific order data
//! - Transitions: the per-kind table of legal status moves
//! - Events: facts broadcast after a mutation commits
//! - Views: per-viewer redacted projections

pub mod event;
pub mod model;
pub mod payload;
pub mod request;
pub mod transitions;
pub mod types;
pub mod view;

// Re-exports
pub use event::{OrderEvent, OrderEventType};
pub use model::{Order, QueueEntry, RoutingStatus, StatusHistoryEntry};
pub use payload::{
    AppointmentPayload, InsuranceClaimPayload, LabOrderPayload, LabResult, OrderPayload,
    PrescriptionPayload, ResultFlag,
};
pub use request::{
    CorrectPayloadRequest, CreateOrderRequest, ManualRouteRequest, OrderListQuery,
    RecordResultRequest, TransitionRequest,
};
pub use types::{Actor, OrderKind, OrderStatus, Party, Relationship, Role};
pub use view::{HistoryEntryView, OrderView};

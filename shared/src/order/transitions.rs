//! Transition table
//!
//! Every legal move of every order kind is listed here explicitly. A move that
//! is not listed is rejected. The table is shared by the server (which enforces
//! it) and clients (which use it to decide which actions to offer).

use super::types::{OrderKind, OrderStatus, Party, Role};
use OrderStatus::*;
use Role::*;

/// One legal edge of a kind's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub roles: &'static [Role],
    pub party: Party,
}

const fn edge(
    from: OrderStatus,
    to: OrderStatus,
    roles: &'static [Role],
    party: Party,
) -> Edge {
    Edge {
        from,
        to,
        roles,
        party,
    }
}

const FRONT_DESK: &[Role] = &[Receptionist, Nurse, Physician, TenantAdmin];

const APPOINTMENT_EDGES: &[Edge] = &[
    edge(Scheduled, Confirmed, FRONT_DESK, Party::Owner),
    edge(Confirmed, CheckedIn, FRONT_DESK, Party::Owner),
    edge(CheckedIn, InProgress, FRONT_DESK, Party::Owner),
    edge(InProgress, Completed, FRONT_DESK, Party::Owner),
    edge(Scheduled, NoShow, FRONT_DESK, Party::Owner),
    edge(Scheduled, Cancelled, FRONT_DESK, Party::Owner),
    edge(Confirmed, Cancelled, FRONT_DESK, Party::Owner),
    edge(CheckedIn, Cancelled, FRONT_DESK, Party::Owner),
    edge(InProgress, Cancelled, FRONT_DESK, Party::Owner),
];

const PRESCRIPTION_EDGES: &[Edge] = &[
    edge(Prescribed, SentToPharmacy, &[Nurse, TenantAdmin], Party::Owner),
    edge(SentToPharmacy, Filled, &[Pharmacist, TenantAdmin], Party::Counterparty),
    edge(Filled, PickedUp, &[Pharmacist, TenantAdmin], Party::Counterparty),
    edge(Prescribed, Cancelled, &[Physician, TenantAdmin], Party::Owner),
    edge(
        SentToPharmacy,
        Cancelled,
        &[Physician, Pharmacist, TenantAdmin],
        Party::Either,
    ),
    edge(Filled, Cancelled, &[Pharmacist, TenantAdmin], Party::Counterparty),
];

const LAB_ORDER_EDGES: &[Edge] = &[
    edge(Ordered, InProgress, &[LabTechnician], Party::Counterparty),
    edge(InProgress, Completed, &[LabTechnician], Party::Counterparty),
    edge(Completed, Reviewed, &[Physician, LabReviewer], Party::Either),
    edge(Ordered, Cancelled, &[Physician, TenantAdmin], Party::Owner),
];

const CLAIM_EDGES: &[Edge] = &[
    edge(Draft, Submitted, &[BillingStaff, Pharmacist, TenantAdmin], Party::Owner),
    edge(Submitted, Adjudicated, &[BillingStaff, TenantAdmin], Party::Counterparty),
    edge(Adjudicated, Paid, &[BillingStaff, TenantAdmin], Party::Counterparty),
    edge(Draft, Denied, &[BillingStaff, Pharmacist, TenantAdmin], Party::Either),
    edge(Submitted, Denied, &[BillingStaff, Pharmacist, TenantAdmin], Party::Either),
    edge(Adjudicated, Denied, &[BillingStaff, Pharmacist, TenantAdmin], Party::Either),
];

/// All edges of a kind
pub fn edges(kind: OrderKind) -> &'static [Edge] {
    match kind {
        OrderKind::Appointment => APPOINTMENT_EDGES,
        OrderKind::Prescription => PRESCRIPTION_EDGES,
        OrderKind::LabOrder => LAB_ORDER_EDGES,
        OrderKind::InsuranceClaim => CLAIM_EDGES,
    }
}

/// Status every new order of `kind` starts in
pub fn initial_status(kind: OrderKind) -> OrderStatus {
    match kind {
        OrderKind::Appointment => Scheduled,
        OrderKind::Prescription => Prescribed,
        OrderKind::LabOrder => Ordered,
        OrderKind::InsuranceClaim => Draft,
    }
}

pub fn terminal_statuses(kind: OrderKind) -> &'static [OrderStatus] {
    match kind {
        OrderKind::Appointment => &[Completed, Cancelled, NoShow],
        OrderKind::Prescription => &[PickedUp, Cancelled],
        OrderKind::LabOrder => &[Reviewed, Cancelled],
        OrderKind::InsuranceClaim => &[Paid, Denied],
    }
}

pub fn is_terminal(kind: OrderKind, status: OrderStatus) -> bool {
    terminal_statuses(kind).contains(&status)
}

/// Roles allowed to create an order of `kind`
pub fn creator_roles(kind: OrderKind) -> &'static [Role] {
    match kind {
        OrderKind::Appointment => FRONT_DESK,
        OrderKind::Prescription => &[Physician],
        OrderKind::LabOrder => &[Physician],
        OrderKind::InsuranceClaim => &[BillingStaff, Pharmacist, TenantAdmin],
    }
}

pub fn can_create(kind: OrderKind, role: Role) -> bool {
    creator_roles(kind).contains(&role)
}

/// Find the edge `from -> to` for `kind`, regardless of role
pub fn find_edge(kind: OrderKind, from: OrderStatus, to: OrderStatus) -> Option<&'static Edge> {
    edges(kind).iter().find(|e| e.from == from && e.to == to)
}

/// Pure legality check: is `role` allowed to move a `kind` order from `from` to `to`
pub fn is_allowed(kind: OrderKind, from: OrderStatus, to: OrderStatus, role: Role) -> bool {
    find_edge(kind, from, to).is_some_and(|e| e.roles.contains(&role))
}

/// Statuses reachable in one step for `role`
pub fn next_statuses(kind: OrderKind, from: OrderStatus, role: Role) -> Vec<OrderStatus> {
    edges(kind)
        .iter()
        .filter(|e| e.from == from && e.roles.contains(&role))
        .map(|e| e.to)
        .collect()
}

/// Statuses at which an order is handed to its receiving tenant
pub fn is_handoff_boundary(kind: OrderKind, status: OrderStatus) -> bool {
    matches!(
        (kind, status),
        (OrderKind::Prescription, SentToPharmacy)
            | (OrderKind::LabOrder, Ordered)
            | (OrderKind::InsuranceClaim, Submitted)
    )
}

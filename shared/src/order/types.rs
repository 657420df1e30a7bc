//! Core enums shared by every order kind

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Order Kind
// ============================================================================

/// Kind of clinical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Appointment,
    Prescription,
    LabOrder,
    InsuranceClaim,
}

impl OrderKind {
    pub const ALL: [OrderKind; 4] = [
        OrderKind::Appointment,
        OrderKind::Prescription,
        OrderKind::LabOrder,
        OrderKind::InsuranceClaim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Appointment => "appointment",
            OrderKind::Prescription => "prescription",
            OrderKind::LabOrder => "lab_order",
            OrderKind::InsuranceClaim => "insurance_claim",
        }
    }

    /// Whether orders of this kind are handed off to a second tenant
    pub fn requires_handoff(&self) -> bool {
        !matches!(self, OrderKind::Appointment)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown order kind: {}", s))
    }
}

// ============================================================================
// Order Status
// ============================================================================

/// Status of an order
///
/// One flat enum covers every kind; each kind only uses its own subset
/// (see [`super::transitions`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    // appointment
    Scheduled,
    Confirmed,
    CheckedIn,
    NoShow,

    // prescription
    Prescribed,
    SentToPharmacy,
    Filled,
    PickedUp,

    // lab order
    Ordered,
    Reviewed,

    // insurance claim
    Draft,
    Submitted,
    Adjudicated,
    Paid,
    Denied,

    // shared
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Scheduled => "scheduled",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::CheckedIn => "checked_in",
            OrderStatus::NoShow => "no_show",
            OrderStatus::Prescribed => "prescribed",
            OrderStatus::SentToPharmacy => "sent_to_pharmacy",
            OrderStatus::Filled => "filled",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Ordered => "ordered",
            OrderStatus::Reviewed => "reviewed",
            OrderStatus::Draft => "draft",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Adjudicated => "adjudicated",
            OrderStatus::Paid => "paid",
            OrderStatus::Denied => "denied",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Roles and Parties
// ============================================================================

/// Role of the acting user inside their tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Receptionist,
    Nurse,
    Physician,
    Pharmacist,
    LabTechnician,
    LabReviewer,
    BillingStaff,
    TenantAdmin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Receptionist,
        Role::Nurse,
        Role::Physician,
        Role::Pharmacist,
        Role::LabTechnician,
        Role::LabReviewer,
        Role::BillingStaff,
        Role::TenantAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Receptionist => "receptionist",
            Role::Nurse => "nurse",
            Role::Physician => "physician",
            Role::Pharmacist => "pharmacist",
            Role::LabTechnician => "lab_technician",
            Role::LabReviewer => "lab_reviewer",
            Role::BillingStaff => "billing_staff",
            Role::TenantAdmin => "tenant_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Which side of a handoff an edge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Owner,
    Counterparty,
    Either,
}

/// Relationship of a tenant to a given order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Owner,
    Counterparty,
    Unrelated,
}

impl Party {
    /// Whether a tenant with `relationship` may act on an edge owned by this party
    pub fn admits(&self, relationship: Relationship) -> bool {
        match (self, relationship) {
            (_, Relationship::Unrelated) => false,
            (Party::Either, _) => true,
            (Party::Owner, Relationship::Owner) => true,
            (Party::Counterparty, Relationship::Counterparty) => true,
            _ => false,
        }
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Identity context of the caller, supplied by the upstream gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub tenant_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            role,
        }
    }
}

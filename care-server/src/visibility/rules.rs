//! Mask table
//!
//! Rows are matched top to bottom on `(kind, relationship, role)`. The first
//! matching row decides which payload fields the viewer may read. A viewer
//! with no matching row may not see the order at all.

use shared::order::{OrderKind, Relationship, Role};

/// Payload fields a row exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSet {
    All,
    Only(&'static [&'static str]),
    AllExcept(&'static [&'static str]),
}

impl FieldSet {
    pub fn allows(&self, field: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Only(fields) => fields.contains(&field),
            FieldSet::AllExcept(fields) => !fields.contains(&field),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MaskRule {
    pub kind: OrderKind,
    pub relationship: Relationship,
    /// `None` matches any role
    pub roles: Option<&'static [Role]>,
    pub fields: FieldSet,
    /// Whether the viewer learns which tenant sits on the other side
    pub disclose_linked_tenant: bool,
}

impl MaskRule {
    fn matches(&self, kind: OrderKind, relationship: Relationship, role: Role) -> bool {
        self.kind == kind
            && self.relationship == relationship
            && self.roles.is_none_or(|roles| roles.contains(&role))
    }
}

const fn row(
    kind: OrderKind,
    relationship: Relationship,
    roles: Option<&'static [Role]>,
    fields: FieldSet,
    disclose_linked_tenant: bool,
) -> MaskRule {
    MaskRule {
        kind,
        relationship,
        roles,
        fields,
        disclose_linked_tenant,
    }
}

use OrderKind::*;
use Relationship::{Counterparty, Owner};
use Role::*;

const FRONT_OFFICE: &[Role] = &[Receptionist, BillingStaff];

const PHARMACY_FIELDS: &[&str] = &[
    "medication",
    "dosage",
    "frequency",
    "quantity",
    "refills",
    "prescriber_name",
    "facility_name",
    "instructions",
];

const PHARMACY_BILLING_FIELDS: &[&str] =
    &["medication", "quantity", "prescriber_name", "facility_name"];

const LAB_FIELDS: &[&str] = &[
    "test_name",
    "test_code",
    "performing_lab_id",
    "ordering_physician_name",
    "facility_name",
    "clinical_indication",
    "result",
];

const LAB_BILLING_FIELDS: &[&str] = &["test_name", "test_code", "facility_name"];

const INSURER_FIELDS: &[&str] = &[
    "insurer_tenant_id",
    "policy_number",
    "amount",
    "currency",
    "service_codes",
    "diagnosis_codes",
    "facility_name",
];

pub const MASK_TABLE: &[MaskRule] = &[
    // appointment
    row(Appointment, Owner, Some(FRONT_OFFICE), FieldSet::AllExcept(&["clinical_notes"]), true),
    row(Appointment, Owner, None, FieldSet::All, true),
    // prescription
    row(Prescription, Owner, Some(FRONT_OFFICE), FieldSet::AllExcept(&["diagnosis"]), true),
    row(Prescription, Owner, None, FieldSet::All, true),
    row(
        Prescription,
        Counterparty,
        Some(&[Pharmacist, Physician, TenantAdmin]),
        FieldSet::Only(PHARMACY_FIELDS),
        true,
    ),
    row(
        Prescription,
        Counterparty,
        Some(&[BillingStaff]),
        FieldSet::Only(PHARMACY_BILLING_FIELDS),
        false,
    ),
    // lab order
    row(
        LabOrder,
        Owner,
        Some(FRONT_OFFICE),
        FieldSet::AllExcept(&["clinical_indication", "result"]),
        true,
    ),
    row(LabOrder, Owner, None, FieldSet::All, true),
    row(
        LabOrder,
        Counterparty,
        Some(&[LabTechnician, LabReviewer, Physician, TenantAdmin]),
        FieldSet::Only(LAB_FIELDS),
        true,
    ),
    row(
        LabOrder,
        Counterparty,
        Some(&[BillingStaff]),
        FieldSet::Only(LAB_BILLING_FIELDS),
        false,
    ),
    // insurance claim
    row(
        InsuranceClaim,
        Owner,
        Some(&[Receptionist]),
        FieldSet::AllExcept(&["diagnosis_codes"]),
        true,
    ),
    row(InsuranceClaim, Owner, None, FieldSet::All, true),
    row(
        InsuranceClaim,
        Counterparty,
        Some(&[BillingStaff, Pharmacist, TenantAdmin]),
        FieldSet::Only(INSURER_FIELDS),
        true,
    ),
];

/// First row admitting the viewer
pub fn lookup(kind: OrderKind, relationship: Relationship, role: Role) -> Option<&'static MaskRule> {
    MASK_TABLE
        .iter()
        .find(|rule| rule.matches(kind, relationship, role))
}

use super::*;
use crate::orders::storage::OrderStorage;
use rust_decimal::Decimal;
use shared::order::{
    AppointmentPayload, InsuranceClaimPayload, LabOrderPayload, PrescriptionPayload, ResultFlag,
};

mod test_concurrency;
mod test_lab;

const HOSPITAL: &str = "h-1";
const OTHER_HOSPITAL: &str = "h-2";
const PHARMACY: &str = "ph-1";
const LAB: &str = "lab-1";
const INSURER: &str = "ins-1";

fn create_test_manager() -> OrdersManager {
    let storage = OrderStorage::open_in_memory().unwrap();
    OrdersManager::with_storage(storage)
}

fn actor(tenant: &str, role: Role) -> Actor {
    Actor::new(format!("{}-{}", tenant, role), tenant, role)
}

fn physician() -> Actor {
    actor(HOSPITAL, Role::Physician)
}

fn nurse() -> Actor {
    actor(HOSPITAL, Role::Nurse)
}

fn receptionist() -> Actor {
    actor(HOSPITAL, Role::Receptionist)
}

fn hospital_admin() -> Actor {
    actor(HOSPITAL, Role::TenantAdmin)
}

fn pharmacist() -> Actor {
    actor(PHARMACY, Role::Pharmacist)
}

fn lab_technician() -> Actor {
    actor(LAB, Role::LabTechnician)
}

fn appointment_payload() -> OrderPayload {
    OrderPayload::Appointment(AppointmentPayload {
        scheduled_at: 1_760_000_000_000,
        provider_name: "Dr. Haddad".into(),
        department: Some("Cardiology".into()),
        reason: Some("Follow-up".into()),
        clinical_notes: Some("BP trending up".into()),
    })
}

fn prescription_payload() -> OrderPayload {
    OrderPayload::Prescription(PrescriptionPayload {
        medication: "Amoxicillin".into(),
        dosage: "500mg".into(),
        frequency: Some("3x daily".into()),
        quantity: Some(21),
        refills: 0,
        prescriber_user_id: physician().user_id,
        prescriber_name: "Dr. Haddad".into(),
        facility_name: "General Hospital".into(),
        diagnosis: Some("Acute sinusitis".into()),
        instructions: Some("Take with food".into()),
    })
}

fn lab_payload(performing_lab_id: Option<&str>) -> OrderPayload {
    OrderPayload::LabOrder(LabOrderPayload {
        test_name: "Complete blood count".into(),
        test_code: Some("CBC".into()),
        performing_lab_id: performing_lab_id.map(str::to_string),
        ordering_physician_user_id: physician().user_id,
        ordering_physician_name: "Dr. Haddad".into(),
        facility_name: "General Hospital".into(),
        clinical_indication: Some("Fatigue".into()),
        result: None,
    })
}

fn claim_payload(insurer_tenant_id: Option<&str>) -> OrderPayload {
    OrderPayload::InsuranceClaim(InsuranceClaimPayload {
        insurer_tenant_id: insurer_tenant_id.map(str::to_string),
        policy_number: "POL-123".into(),
        amount: Decimal::new(12550, 2),
        currency: "USD".into(),
        service_codes: vec!["99213".into()],
        diagnosis_codes: vec!["J01.90".into()],
        facility_name: "General Hospital".into(),
    })
}

fn lab_result(flag: ResultFlag) -> LabResult {
    LabResult {
        value: "13.2".into(),
        unit: Some("g/dL".into()),
        reference_range: Some("12.0-15.5".into()),
        flag,
        notes: None,
        recorded_at: 0,
    }
}

fn create_prescription(manager: &OrdersManager) -> Order {
    manager
        .create_order("patient-1", prescription_payload(), &physician())
        .unwrap()
}

/// Prescription sent by a nurse and linked to the pharmacy
fn routed_prescription(manager: &OrdersManager) -> Order {
    let order = create_prescription(manager);
    manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::SentToPharmacy), &nurse())
        .unwrap();
    manager
        .assign_counterparty(&order.id, PHARMACY, RoutingStatus::Routed)
        .unwrap()
        .order()
        .clone()
}

/// Lab order linked to the lab and started by a technician
fn started_lab_order(manager: &OrdersManager) -> Order {
    let order = manager
        .create_order("patient-1", lab_payload(Some(LAB)), &physician())
        .unwrap();
    manager
        .assign_counterparty(&order.id, LAB, RoutingStatus::Routed)
        .unwrap();
    manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::InProgress), &lab_technician())
        .unwrap()
}

fn assert_history_consistent(order: &Order) {
    assert_eq!(order.status, order.derived_status());
    for pair in order.status_history.windows(2) {
        assert_eq!(pair[0].to_status, pair[1].from_status);
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

use super::*;
use crate::core::DispatchConfig;
use crate::notifications::{NotificationLedger, NotificationStorage};
use crate::orders::{OrderStorage, OrdersManager};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::order::{
    Actor, InsuranceClaimPayload, LabOrderPayload, Order, OrderEvent, OrderPayload, OrderStatus,
    PrescriptionPayload, Role, RoutingStatus, TransitionRequest,
};
use shared::tenant::{TenantKind, TenantRecord};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

mod test_worker;

const HOSPITAL: &str = "h-1";
const PHARMACY: &str = "ph-1";
const LAB: &str = "lab-1";
const INSURER: &str = "ins-1";
/// Has a preferred pharmacy on file
const PATIENT: &str = "patient-1";
/// Has none
const WALK_IN_PATIENT: &str = "patient-2";

/// Fails the first `failures` submissions
struct FlakyClaims {
    failures: u32,
    calls: AtomicU32,
}

#[async_trait]
impl ClaimsProcessor for FlakyClaims {
    async fn submit(&self, _order: &Order) -> HandoffResult<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(HandoffError::Transient("claims processor offline".into()));
        }
        Ok(())
    }
}

struct Harness {
    manager: Arc<OrdersManager>,
    router: Arc<HandoffRouter>,
    ledger: Arc<NotificationLedger>,
    claims: Arc<FlakyClaims>,
    worker: DispatchWorker,
}

fn tenant(id: &str, kind: TenantKind) -> TenantRecord {
    TenantRecord {
        id: id.into(),
        name: id.to_uppercase(),
        kind,
    }
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_tenant(tenant(HOSPITAL, TenantKind::Hospital))
        .with_tenant(tenant(PHARMACY, TenantKind::Pharmacy))
        .with_tenant(tenant(LAB, TenantKind::Laboratory))
        .with_tenant(tenant(INSURER, TenantKind::Insurer))
        .with_preferred_pharmacy(PATIENT, PHARMACY)
}

/// Zero backoff so every scan retries immediately
fn dispatch_config(max_retries: u32) -> DispatchConfig {
    DispatchConfig {
        max_retries,
        retry_base_ms: 0,
        retry_max_ms: 0,
        scan_interval_secs: 1,
    }
}

fn harness(claim_failures: u32) -> Harness {
    let manager = Arc::new(OrdersManager::with_storage(
        OrderStorage::open_in_memory().unwrap(),
    ));
    let claims = Arc::new(FlakyClaims {
        failures: claim_failures,
        calls: AtomicU32::new(0),
    });
    let router = Arc::new(HandoffRouter::new(
        manager.clone(),
        Arc::new(directory()),
        claims.clone(),
    ));
    let ledger = Arc::new(NotificationLedger::new(
        NotificationStorage::open_in_memory().unwrap(),
    ));
    let worker = DispatchWorker::new(
        manager.clone(),
        router.clone(),
        ledger.clone(),
        dispatch_config(3),
    );
    Harness {
        manager,
        router,
        ledger,
        claims,
        worker,
    }
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

fn hospital_admin() -> Actor {
    actor(HOSPITAL, Role::TenantAdmin)
}

fn billing() -> Actor {
    actor(HOSPITAL, Role::BillingStaff)
}

fn pharmacist() -> Actor {
    actor(PHARMACY, Role::Pharmacist)
}

fn lab_technician() -> Actor {
    actor(LAB, Role::LabTechnician)
}

fn prescription_payload() -> OrderPayload {
    OrderPayload::Prescription(PrescriptionPayload {
        medication: "Lisinopril".into(),
        dosage: "10mg".into(),
        frequency: Some("daily".into()),
        quantity: Some(30),
        refills: 2,
        prescriber_user_id: physician().user_id,
        prescriber_name: "Dr. Osei".into(),
        facility_name: "General Hospital".into(),
        diagnosis: Some("Hypertension".into()),
        instructions: None,
    })
}

fn lab_payload(performing_lab_id: Option<&str>) -> OrderPayload {
    OrderPayload::LabOrder(LabOrderPayload {
        test_name: "Basic metabolic panel".into(),
        test_code: Some("BMP".into()),
        performing_lab_id: performing_lab_id.map(str::to_string),
        ordering_physician_user_id: physician().user_id,
        ordering_physician_name: "Dr. Osei".into(),
        facility_name: "General Hospital".into(),
        clinical_indication: None,
        result: None,
    })
}

fn claim_payload(insurer_tenant_id: Option<&str>) -> OrderPayload {
    OrderPayload::InsuranceClaim(InsuranceClaimPayload {
        insurer_tenant_id: insurer_tenant_id.map(str::to_string),
        policy_number: "POL-77".into(),
        amount: Decimal::new(8000, 2),
        currency: "USD".into(),
        service_codes: vec!["80048".into()],
        diagnosis_codes: vec!["I10".into()],
        facility_name: "General Hospital".into(),
    })
}

/// Prescription moved to the pharmacy boundary by a nurse
fn sent_prescription(manager: &OrdersManager, patient_id: &str) -> Order {
    let order = manager
        .create_order(patient_id, prescription_payload(), &physician())
        .unwrap();
    manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::SentToPharmacy), &nurse())
        .unwrap()
}

/// Claim submitted by billing staff
fn submitted_claim(manager: &OrdersManager) -> Order {
    let order = manager
        .create_order(PATIENT, claim_payload(Some(INSURER)), &billing())
        .unwrap();
    manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Submitted), &billing())
        .unwrap()
}

/// Event of the newest pending job of an order
fn pending_event(manager: &OrdersManager, order_id: &str) -> OrderEvent {
    manager
        .storage()
        .get_pending_dispatches()
        .unwrap()
        .into_iter()
        .rfind(|job| job.order_id == order_id)
        .expect("no pending job for order")
        .event
}

fn reload(manager: &OrdersManager, order_id: &str) -> Order {
    manager.get(order_id).unwrap().unwrap()
}

use super::*;
use shared::notification::{NotificationPriority, NotificationSubject};
use shared::order::{LabResult, ResultFlag};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn stats(h: &Harness) -> crate::orders::StorageStats {
    h.manager.storage().get_stats().unwrap()
}

#[tokio::test]
async fn test_pending_job_is_routed_and_completed() {
    let h = harness(0);
    let order = sent_prescription(&h.manager, PATIENT);
    assert_eq!(stats(&h).pending_dispatch_count, 1);

    h.worker.process_pending().await;

    let stored = reload(&h.manager, &order.id);
    assert_eq!(stored.counterparty_tenant_id.as_deref(), Some(PHARMACY));
    assert_eq!(stored.routing, RoutingStatus::Routed);
    let stats = stats(&h);
    assert_eq!(stats.pending_dispatch_count, 0);
    assert_eq!(stats.dead_letter_count, 0);
}

#[tokio::test]
async fn test_unroutable_order_alerts_creator() {
    let h = harness(0);
    let order = sent_prescription(&h.manager, WALK_IN_PATIENT);

    h.worker.process_pending().await;

    assert!(reload(&h.manager, &order.id).routing.needs_manual_routing());
    let alerts = h.ledger.list_for(&physician(), false).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].priority, NotificationPriority::Urgent);
    assert_eq!(alerts[0].subject, NotificationSubject::Order(order.id.clone()));

    // handled, not failed
    let stats = stats(&h);
    assert_eq!(stats.pending_dispatch_count, 0);
    assert_eq!(stats.dead_letter_count, 0);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let h = harness(1);
    let order = submitted_claim(&h.manager);

    h.worker.process_pending().await;
    let job = h.manager.storage().get_pending_dispatches().unwrap();
    assert_eq!(job.len(), 1);
    assert_eq!(job[0].retry_count, 1);
    assert!(job[0].last_error.as_deref().unwrap().contains("offline"));
    assert_eq!(reload(&h.manager, &order.id).routing, RoutingStatus::Pending);

    h.worker.process_pending().await;
    assert_eq!(reload(&h.manager, &order.id).routing, RoutingStatus::Routed);
    assert_eq!(stats(&h).pending_dispatch_count, 0);
    assert_eq!(h.claims.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_exhausted_job_is_dead_lettered_and_flagged() {
    let h = harness(u32::MAX);
    let order = submitted_claim(&h.manager);

    for _ in 0..3 {
        h.worker.process_pending().await;
    }

    let stats = stats(&h);
    assert_eq!(stats.pending_dispatch_count, 0);
    assert_eq!(stats.dead_letter_count, 1);
    let dead = h.manager.storage().get_dead_letters().unwrap();
    assert_eq!(dead[0].order_id, order.id);
    assert_eq!(dead[0].retry_count, 3);

    let stored = reload(&h.manager, &order.id);
    let RoutingStatus::NeedsManualRouting { reason } = &stored.routing else {
        panic!("expected manual routing, got {:?}", stored.routing);
    };
    assert!(reason.contains("3 attempts"));
    // status is untouched by handoff failures
    assert_eq!(stored.status, OrderStatus::Submitted);

    let alerts = h.ledger.list_for(&billing(), true).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].priority, NotificationPriority::Urgent);
}

#[tokio::test]
async fn test_critical_lab_result_notifies_physician() {
    let h = harness(0);
    let order = h
        .manager
        .create_order(PATIENT, lab_payload(Some(LAB)), &physician())
        .unwrap();
    h.worker.process_pending().await;

    let tech = lab_technician();
    h.manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::InProgress), &tech)
        .unwrap();
    h.manager
        .record_lab_result(
            &order.id,
            LabResult {
                value: "6.9".into(),
                unit: Some("mmol/L".into()),
                reference_range: Some("3.5-5.1".into()),
                flag: ResultFlag::Critical,
                notes: None,
                recorded_at: 0,
            },
            &tech,
        )
        .unwrap();
    assert_eq!(stats(&h).pending_dispatch_count, 0);

    h.manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Completed), &tech)
        .unwrap();
    assert_eq!(stats(&h).pending_dispatch_count, 1);
    h.worker.process_pending().await;

    let inbox = h.ledger.list_for(&physician(), true).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].priority, NotificationPriority::Emergency);
    assert!(inbox[0].title.contains("Basic metabolic panel"));
    assert_eq!(h.ledger.unread_count(&physician()).unwrap(), 1);
    // nothing for the lab side
    assert!(h.ledger.list_for(&tech, false).unwrap().is_empty());
}

#[tokio::test]
async fn test_filled_prescription_notifies_prescriber() {
    let h = harness(0);
    let order = sent_prescription(&h.manager, PATIENT);
    h.worker.process_pending().await;

    h.manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Filled), &pharmacist())
        .unwrap();
    h.worker.process_pending().await;

    let inbox = h.ledger.list_for(&physician(), false).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].priority, NotificationPriority::Normal);
    assert_eq!(inbox[0].recipient_tenant_id, HOSPITAL);
}

#[tokio::test]
async fn test_run_handles_events_until_cancelled() {
    let h = harness(0);
    let order = sent_prescription(&h.manager, PATIENT);
    let event = pending_event(&h.manager, &order.id);

    let (tx, rx) = mpsc::channel(8);
    let token = CancellationToken::new();
    let handle = tokio::spawn(h.worker.run(rx, token.clone()));
    tx.send(Arc::new(event)).await.unwrap();

    let mut routed = false;
    for _ in 0..100 {
        if reload(&h.manager, &order.id).routing == RoutingStatus::Routed {
            routed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(routed);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

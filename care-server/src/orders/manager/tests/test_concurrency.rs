use super::*;
use std::sync::Arc;

#[test]
fn test_in_flight_guard_rejects_second_writer() {
    let manager = create_test_manager();
    let order = routed_prescription(&manager);

    let guard = manager.acquire(&order.id).unwrap();
    let err = manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Filled), &pharmacist())
        .unwrap_err();
    assert!(matches!(err, ManagerError::Conflict(_)));

    // other orders are not blocked
    let other = create_prescription(&manager);
    manager
        .apply_transition(&other.id, TransitionRequest::to(OrderStatus::Cancelled), &physician())
        .unwrap();

    drop(guard);
    let filled = manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Filled), &pharmacist())
        .unwrap();
    assert_eq!(filled.status_history.len(), 2);
}

#[test]
fn test_duplicate_filled_with_stale_version_conflicts() {
    let manager = create_test_manager();
    let order = routed_prescription(&manager);
    let seen_version = manager.get(&order.id).unwrap().unwrap().version;

    let first = manager
        .apply_transition(
            &order.id,
            TransitionRequest::to(OrderStatus::Filled).expecting(seen_version),
            &pharmacist(),
        )
        .unwrap();
    let err = manager
        .apply_transition(
            &order.id,
            TransitionRequest::to(OrderStatus::Filled).expecting(seen_version),
            &actor(PHARMACY, Role::TenantAdmin),
        )
        .unwrap_err();
    assert!(matches!(err, ManagerError::Conflict(_)));

    let stored = manager.get(&order.id).unwrap().unwrap();
    assert_eq!(stored.version, first.version);
    assert_eq!(stored.status_history.len(), first.status_history.len());
    assert_history_consistent(&stored);
}

#[test]
fn test_concurrent_writers_apply_exactly_once() {
    let manager = Arc::new(create_test_manager());
    let order = manager
        .create_order("patient-1", appointment_payload(), &receptionist())
        .unwrap();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let order_id = order.id.clone();
                s.spawn(move || {
                    manager.apply_transition(
                        &order_id,
                        TransitionRequest::to(OrderStatus::Confirmed).expecting(order.version),
                        &receptionist(),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ManagerError::Conflict(_)))
    );

    let stored = manager.get(&order.id).unwrap().unwrap();
    assert_eq!(stored.status_history.len(), 1);
    assert_eq!(stored.version, order.version + 1);
    assert_history_consistent(&stored);
}

use super::*;

#[test]
fn test_record_result_on_in_progress_order() {
    let manager = create_test_manager();
    let order = started_lab_order(&manager);

    let updated = manager
        .record_lab_result(&order.id, lab_result(ResultFlag::Abnormal), &lab_technician())
        .unwrap();
    assert_eq!(updated.version, order.version + 1);
    assert_eq!(updated.status, OrderStatus::InProgress);
    match &updated.payload {
        OrderPayload::LabOrder(p) => {
            let result = p.result.as_ref().unwrap();
            assert_eq!(result.flag, ResultFlag::Abnormal);
            assert!(result.recorded_at > 0);
        }
        other => panic!("unexpected payload {:?}", other),
    }

    let completed = manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Completed), &lab_technician())
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert_history_consistent(&completed);
}

#[test]
fn test_record_result_rules() {
    let manager = create_test_manager();
    let order = manager
        .create_order("patient-1", lab_payload(Some(LAB)), &physician())
        .unwrap();
    manager
        .assign_counterparty(&order.id, LAB, RoutingStatus::Routed)
        .unwrap();

    // still ordered
    let err = manager
        .record_lab_result(&order.id, lab_result(ResultFlag::Normal), &lab_technician())
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::WrongStatus {
            expected: OrderStatus::InProgress,
            actual: OrderStatus::Ordered,
            ..
        }
    ));

    manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::InProgress), &lab_technician())
        .unwrap();

    let err = manager
        .record_lab_result(&order.id, lab_result(ResultFlag::Normal), &physician())
        .unwrap_err();
    assert!(matches!(err, ManagerError::PermissionDenied(_)));

    let mut blank = lab_result(ResultFlag::Normal);
    blank.value = " ".into();
    let err = manager
        .record_lab_result(&order.id, blank, &lab_technician())
        .unwrap_err();
    assert!(matches!(err, ManagerError::Validation(_)));
}

#[test]
fn test_record_result_on_other_kind() {
    let manager = create_test_manager();
    let order = routed_prescription(&manager);
    let err = manager
        .record_lab_result(&order.id, lab_result(ResultFlag::Normal), &pharmacist())
        .unwrap_err();
    assert!(matches!(err, ManagerError::KindMismatch { .. }));
}

#[test]
fn test_completion_has_side_effects() {
    let manager = create_test_manager();
    let order = started_lab_order(&manager);
    let mut rx = manager.subscribe();

    manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Completed), &lab_technician())
        .unwrap();
    let event = rx.try_recv().unwrap();
    assert!(requires_dispatch(&event));

    let reviewed = manager
        .apply_transition(&order.id, TransitionRequest::to(OrderStatus::Reviewed), &physician())
        .unwrap();
    assert!(reviewed.is_terminal());
    let event = rx.try_recv().unwrap();
    assert!(!requires_dispatch(&event));
}

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use uuid::Uuid;

use queue_cell::*;

use super::{at, time, MockStore, QueueFixture};

#[tokio::test]
async fn test_queueing_assigns_position_eta_and_start_time() {
    let fixture = QueueFixture::new().await;
    let first = fixture.queue_patient("Asha Rao").await;

    fixture.clock.advance(Duration::minutes(5));
    let second = fixture.queue_patient("Vikram Das").await;

    assert_eq!(first.status, AppointmentStatus::InQueue);
    assert_eq!(first.queue_position, 1);
    assert_eq!(first.eta, Some(time(18, 10)));
    assert_eq!(first.queue_start_time, Some(at(10, 0)));

    assert_eq!(second.queue_position, 2);
    assert_eq!(second.eta, Some(time(18, 20)));
    assert_eq!(second.queue_start_time, Some(at(10, 5)));
}

#[tokio::test]
async fn test_completed_patients_do_not_push_eta_back() {
    let fixture = QueueFixture::new().await;
    let service = fixture.service();

    let first = fixture.queue_patient("Asha Rao").await;
    service
        .update_status(fixture.hospital.id, first.id, AppointmentStatus::Done)
        .await
        .unwrap();

    let second = fixture.queue_patient("Vikram Das").await;

    // Position counts the finished consult, the ETA does not.
    assert_eq!(second.queue_position, 2);
    assert_eq!(second.eta, Some(time(18, 10)));
}

#[tokio::test]
async fn test_completion_sets_completed_at_and_audit_time() {
    let fixture = QueueFixture::new().await;
    let appointment = fixture.queue_patient("Asha Rao").await;

    fixture.clock.set(at(18, 12));
    let update = fixture
        .service()
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Done)
        .await
        .unwrap();

    assert_eq!(update.appointment.status, AppointmentStatus::Done);
    assert_eq!(update.appointment.completed_at, Some(at(18, 12)));
    assert_eq!(update.audit.action, AuditAction::Completed);
    assert_eq!(update.audit.completion_time, Some(at(18, 12)));
    assert_eq!(update.audit.from_status, AppointmentStatus::InQueue);
    assert_eq!(update.audit.to_status, AppointmentStatus::Done);
    assert_eq!(update.audit.token_num, appointment.token_num);
}

#[tokio::test]
async fn test_registered_to_done_is_rejected_without_audit() {
    let fixture = QueueFixture::new().await;
    let appointment = fixture.register("Asha Rao").await;

    let result = fixture
        .service()
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Done)
        .await;

    assert_matches!(
        result,
        Err(QueueError::InvalidStatusTransition {
            from: AppointmentStatus::Registered,
            to: AppointmentStatus::Done,
            ..
        })
    );
    assert_eq!(fixture.store.audit_log_len().await, 0);

    let stored = fixture
        .store
        .get_appointment(fixture.hospital.id, appointment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AppointmentStatus::Registered);
}

#[tokio::test]
async fn test_done_to_cancelled_is_rejected() {
    let fixture = QueueFixture::new().await;
    let service = fixture.service();
    let appointment = fixture.queue_patient("Asha Rao").await;
    service
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Done)
        .await
        .unwrap();

    let result = service
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Cancelled)
        .await;

    assert_matches!(result, Err(QueueError::InvalidStatusTransition { .. }));
    assert_eq!(fixture.store.audit_log_len().await, 2);
}

#[tokio::test]
async fn test_every_accepted_transition_writes_one_audit_row() {
    use AppointmentStatus::*;

    for from in AppointmentStatus::ALL {
        for to in AppointmentStatus::ALL {
            if matches!((from, to), (Registered, Done) | (Done, Cancelled)) {
                continue;
            }

            let fixture = QueueFixture::new().await;
            let doctor = fixture.doctor.clone();
            let appointment = fixture.seed(&doctor, from, 1).await;

            let update = fixture
                .service()
                .update_status(fixture.hospital.id, appointment.id, to)
                .await
                .unwrap_or_else(|e| panic!("{} -> {} failed: {}", from, to, e));

            assert_eq!(update.appointment.status, to);
            assert_eq!(fixture.store.audit_log_len().await, 1, "{} -> {}", from, to);
            assert_eq!(update.audit.action, audit_action_for(from, to));
        }
    }
}

#[tokio::test]
async fn test_requeue_keeps_original_start_time() {
    let fixture = QueueFixture::new().await;
    let service = fixture.service();
    let appointment = fixture.queue_patient("Asha Rao").await;

    service
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    fixture.clock.set(at(11, 30));
    let update = service
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::InQueue)
        .await
        .unwrap();

    assert_eq!(update.audit.action, AuditAction::Queued);
    assert_eq!(update.appointment.queue_start_time, Some(at(10, 0)));
}

#[tokio::test]
async fn test_cancel_writes_cancelled_audit_row() {
    let fixture = QueueFixture::new().await;
    let appointment = fixture.register("Asha Rao").await;

    let update = fixture
        .service()
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    assert_eq!(update.audit.action, AuditAction::Cancelled);
    assert!(update.audit.completion_time.is_none());
}

#[tokio::test]
async fn test_update_status_of_unknown_appointment() {
    let fixture = QueueFixture::new().await;
    let missing = Uuid::new_v4();

    let result = fixture
        .service()
        .update_status(fixture.hospital.id, missing, AppointmentStatus::InQueue)
        .await;

    assert_matches!(result, Err(QueueError::AppointmentNotFound(id)) if id == missing);
}

#[tokio::test]
async fn test_appointments_are_invisible_to_other_hospitals() {
    let fixture = QueueFixture::new().await;
    let appointment = fixture.register("Asha Rao").await;

    let result = fixture
        .service()
        .update_status(Uuid::new_v4(), appointment.id, AppointmentStatus::InQueue)
        .await;

    assert_matches!(result, Err(QueueError::AppointmentNotFound(_)));
}

#[tokio::test]
async fn test_call_patient_sets_flag_without_audit() {
    let fixture = QueueFixture::new().await;
    let appointment = fixture.queue_patient("Asha Rao").await;

    let called = fixture
        .service()
        .call_patient(fixture.hospital.id, appointment.id)
        .await
        .unwrap();

    assert!(called.called);
    assert_eq!(called.status, AppointmentStatus::InQueue);
    assert_eq!(fixture.store.audit_log_len().await, 1);
}

#[tokio::test]
async fn test_audit_history_is_oldest_first() {
    let fixture = QueueFixture::new().await;
    let service = fixture.service();
    let appointment = fixture.queue_patient("Asha Rao").await;

    fixture.clock.advance(Duration::minutes(30));
    service
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Done)
        .await
        .unwrap();

    let history = service
        .audit_history(fixture.hospital.id, appointment.id)
        .await
        .unwrap();

    let actions: Vec<AuditAction> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Queued, AuditAction::Completed]);
    assert!(history[0].created_at < history[1].created_at);

    let missing = service.audit_history(fixture.hospital.id, Uuid::new_v4()).await;
    assert_matches!(missing, Err(QueueError::AppointmentNotFound(_)));
}

#[tokio::test]
async fn test_failed_audit_append_leaves_row_untouched() {
    let fixture = QueueFixture::new().await;
    let doctor = fixture.doctor.clone();
    let appointment = fixture.seed(&doctor, AppointmentStatus::InQueue, 1).await;

    let mut store = MockStore::new();
    let stored = appointment.clone();
    store
        .expect_get_appointment()
        .returning(move |_, _| Ok(Some(stored.clone())));
    store
        .expect_append_audit_entry()
        .times(1)
        .returning(|_| Err(QueueError::StoreError("audit table unavailable".to_string())));
    store.expect_update_appointment().times(0);

    let service = QueueService::new(Arc::new(store), fixture.clock.clone());
    let result = service
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Done)
        .await;

    assert_matches!(result, Err(QueueError::StoreError(_)));
}

#[tokio::test]
async fn test_call_patient_only_touches_called_flag() {
    let fixture = QueueFixture::new().await;
    let service = fixture.service();
    let appointment = fixture.queue_patient("Asha Rao").await;

    fixture.clock.set(at(18, 15));
    service
        .update_status(fixture.hospital.id, appointment.id, AppointmentStatus::Done)
        .await
        .unwrap();

    let called = service.call_patient(fixture.hospital.id, appointment.id).await.unwrap();

    assert!(called.called);
    assert_eq!(called.status, AppointmentStatus::Done);
    assert_eq!(called.completed_at, Some(at(18, 15)));

    let missing = service.call_patient(fixture.hospital.id, Uuid::new_v4()).await;
    assert_matches!(missing, Err(QueueError::AppointmentNotFound(_)));
}

use assert_matches::assert_matches;
use uuid::Uuid;

use queue_cell::*;

use super::{time, today, QueueFixture};

#[tokio::test]
async fn test_register_assigns_position_token_and_eta() {
    let fixture = QueueFixture::new().await;

    let first = fixture.register("Asha Rao").await;
    let second = fixture.register("Vikram Das").await;

    assert_eq!(first.status, AppointmentStatus::Registered);
    assert_eq!(first.appointment_on, today());
    assert_eq!(first.queue_position, 1);
    assert_eq!(second.queue_position, 2);
    assert_eq!(first.eta, Some(time(18, 10)));
    assert_eq!(second.eta, Some(time(18, 20)));
    assert!(!first.called);
    assert!(first.queue_start_time.is_none());

    assert_eq!(first.token_num.len(), 4);
    assert!(first
        .token_num
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}

#[tokio::test]
async fn test_register_honours_supplied_position() {
    let fixture = QueueFixture::new().await;
    let mut request = fixture.registration("Asha Rao");
    request.queue_position = Some(7);

    let appointment = fixture
        .service()
        .register_appointment(fixture.hospital.id, request)
        .await
        .unwrap();

    assert_eq!(appointment.queue_position, 7);
    assert_eq!(appointment.eta, Some(time(19, 10)));
}

#[tokio::test]
async fn test_register_for_future_date_uses_start_time() {
    let fixture = QueueFixture::new().await;
    let mut request = fixture.registration("Asha Rao");
    request.appointment_on = today().succ_opt();

    let appointment = fixture
        .service()
        .register_appointment(fixture.hospital.id, request)
        .await
        .unwrap();

    assert_eq!(appointment.appointment_on, today().succ_opt().unwrap());
    assert_eq!(appointment.queue_position, 1);
    assert_eq!(appointment.eta, Some(time(18, 10)));
}

#[tokio::test]
async fn test_register_rejects_bad_mobile_numbers() {
    let fixture = QueueFixture::new().await;

    for mobile in ["98765", "98765432101", "98765-4321", "abcdefghij", ""] {
        let mut request = fixture.registration("Asha Rao");
        request.mobile_num = mobile.to_string();

        let result = fixture
            .service()
            .register_appointment(fixture.hospital.id, request)
            .await;
        assert_matches!(result, Err(QueueError::ValidationError(_)), "mobile {:?}", mobile);
    }
}

#[tokio::test]
async fn test_register_rejects_blank_patient_name() {
    let fixture = QueueFixture::new().await;

    let result = fixture
        .service()
        .register_appointment(fixture.hospital.id, fixture.registration("   "))
        .await;

    assert_matches!(result, Err(QueueError::ValidationError(_)));
}

#[tokio::test]
async fn test_register_rejects_duplicate_patient_for_same_day() {
    let fixture = QueueFixture::new().await;
    let request = fixture.registration("Asha Rao");

    fixture
        .service()
        .register_appointment(fixture.hospital.id, request.clone())
        .await
        .unwrap();
    let result = fixture
        .service()
        .register_appointment(fixture.hospital.id, request)
        .await;

    assert_matches!(result, Err(QueueError::Conflict(_)));
}

#[tokio::test]
async fn test_register_with_doctor_of_another_hospital() {
    let fixture = QueueFixture::new().await;

    let result = fixture
        .service()
        .register_appointment(Uuid::new_v4(), fixture.registration("Asha Rao"))
        .await;

    assert_matches!(result, Err(QueueError::DoctorNotFound(id)) if id == fixture.doctor.id);
}

#[tokio::test]
async fn test_register_with_inactive_doctor() {
    let fixture = QueueFixture::new().await;
    let mut inactive = fixture.add_doctor("Dr. Rao", time(9, 0), 10).await;
    inactive.is_active = false;
    fixture.store.add_doctor(inactive.clone()).await;

    let mut request = fixture.registration("Asha Rao");
    request.doctor_id = inactive.id;

    let result = fixture
        .service()
        .register_appointment(fixture.hospital.id, request)
        .await;

    assert_matches!(result, Err(QueueError::ValidationError(_)));
}

#[tokio::test]
async fn test_eta_preview_and_prediction() {
    let fixture = QueueFixture::new().await;
    fixture.queue_patient("Asha Rao").await;
    fixture.register("Vikram Das").await;

    let preview = fixture
        .service()
        .preview_eta(fixture.hospital.id, fixture.doctor.id, None)
        .await
        .unwrap();
    assert_eq!(preview.appointment_on, today());
    assert_eq!(preview.next_pos, 2);
    assert_eq!(preview.completed_count, 0);
    assert_eq!(preview.eta, Some(time(18, 20)));
    assert_eq!(preview.eta_display, "18:20");

    let prediction = fixture
        .service()
        .predict_eta(fixture.hospital.id, fixture.doctor.id, Some("10-09-2025"))
        .await
        .unwrap();
    assert_eq!(prediction.appointment_on, today());
    assert_eq!(prediction.queued, 2);
    assert_eq!(prediction.eta, Some(time(18, 30)));
}

#[tokio::test]
async fn test_eta_preview_for_future_date_ignores_todays_queue() {
    let fixture = QueueFixture::new().await;
    fixture.queue_patient("Asha Rao").await;

    let preview = fixture
        .service()
        .preview_eta(fixture.hospital.id, fixture.doctor.id, Some("2025-09-11"))
        .await
        .unwrap();

    assert_eq!(preview.next_pos, 1);
    assert_eq!(preview.eta, Some(time(18, 10)));
}

#[test]
fn test_generated_tokens_use_uppercase_alphanumerics() {
    for _ in 0..100 {
        let token = generate_token();
        assert_eq!(token.len(), 4);
        assert!(token.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }
}

#[test]
fn test_mobile_number_validation() {
    assert!(validate_mobile_number("9876543210").is_ok());
    assert!(validate_mobile_number("987654321").is_err());
}

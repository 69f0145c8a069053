use assert_matches::assert_matches;

use queue_cell::*;

use super::{time, QueueFixture};

#[tokio::test]
async fn test_public_display_lists_queued_patients_by_doctor() {
    let fixture = QueueFixture::new().await;
    let early = fixture.add_doctor("Dr. Banerjee", time(9, 0), 15).await;

    fixture.queue_patient("Asha Rao").await;
    fixture.queue_patient("Vikram Das").await;
    fixture.register("Not Yet Queued").await;
    fixture.seed(&early, AppointmentStatus::InQueue, 1).await;
    fixture.seed(&early, AppointmentStatus::Done, 2).await;

    let display = fixture.service().display_for_slug("city-care").await.unwrap();

    assert_eq!(display.hospital_name, "City Care Clinic");
    assert!(display.slug_mode);

    let rows: Vec<(&str, u32)> = display
        .entries
        .iter()
        .map(|e| (e.doctor_name.as_str(), e.queue_position))
        .collect();
    assert_eq!(
        rows,
        vec![("Dr. Banerjee", 1), ("Dr. Mehta", 1), ("Dr. Mehta", 2)]
    );
    assert_eq!(display.entries[1].eta_window, "06:00 PM – 06:30 PM");
    assert_eq!(display.entries[0].eta_window, "N/A");
}

#[tokio::test]
async fn test_display_shows_called_flag() {
    let fixture = QueueFixture::new().await;
    let appointment = fixture.queue_patient("Asha Rao").await;
    fixture
        .service()
        .call_patient(fixture.hospital.id, appointment.id)
        .await
        .unwrap();

    let display = fixture
        .service()
        .display_for_hospital(fixture.hospital.id)
        .await
        .unwrap();

    assert!(!display.slug_mode);
    assert_eq!(display.entries.len(), 1);
    assert!(display.entries[0].called);
    assert_eq!(display.entries[0].token_num, appointment.token_num);
}

#[tokio::test]
async fn test_unknown_slug() {
    let fixture = QueueFixture::new().await;

    let result = fixture.service().display_for_slug("nowhere").await;

    assert_matches!(result, Err(QueueError::HospitalNotFound(slug)) if slug == "nowhere");
}

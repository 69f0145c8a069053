use queue_cell::*;

use super::{at, time, today, MockStore, QueueFixture};

#[tokio::test]
async fn test_empty_queue_starts_at_one() {
    let fixture = QueueFixture::new().await;

    let position = next_queue_position(fixture.store.as_ref(), &fixture.scope()).await.unwrap();

    assert_eq!(position.next_pos, 1);
    assert_eq!(position.completed_count, 0);
    assert_eq!(position.position_ahead(), 1);
}

#[tokio::test]
async fn test_next_position_counts_queued_and_done_only() {
    let fixture = QueueFixture::new().await;
    let doctor = fixture.doctor.clone();

    fixture.seed(&doctor, AppointmentStatus::InQueue, 1).await;
    fixture.seed(&doctor, AppointmentStatus::InQueue, 2).await;
    fixture.seed(&doctor, AppointmentStatus::Done, 3).await;
    fixture.seed(&doctor, AppointmentStatus::Registered, 4).await;
    fixture.seed(&doctor, AppointmentStatus::Cancelled, 5).await;

    let position = next_queue_position(fixture.store.as_ref(), &fixture.scope()).await.unwrap();

    assert_eq!(position.next_pos, 4);
    assert_eq!(position.completed_count, 1);
    assert_eq!(position.position_ahead(), 3);
}

#[tokio::test]
async fn test_positions_are_scoped_per_doctor() {
    let fixture = QueueFixture::new().await;
    let other = fixture.add_doctor("Dr. Iyer", time(9, 0), 15).await;

    fixture.seed(&other, AppointmentStatus::InQueue, 1).await;
    fixture.seed(&other, AppointmentStatus::Done, 2).await;

    let position = next_queue_position(fixture.store.as_ref(), &fixture.scope()).await.unwrap();
    assert_eq!(position.next_pos, 1);
}

#[tokio::test]
async fn test_registration_position_counts_every_status() {
    let fixture = QueueFixture::new().await;
    let doctor = fixture.doctor.clone();

    for (i, status) in AppointmentStatus::ALL.into_iter().enumerate() {
        fixture.seed(&doctor, status, i as u32 + 1).await;
    }

    let position = registration_queue_position(fixture.store.as_ref(), &fixture.scope())
        .await
        .unwrap();

    assert_eq!(position.total_count, 4);
    assert_eq!(position.next_pos, 5);
}

#[tokio::test]
async fn test_prediction_today_counts_registered_and_queued() {
    let fixture = QueueFixture::new().await;
    let doctor = fixture.doctor.clone();

    fixture.seed(&doctor, AppointmentStatus::Registered, 1).await;
    fixture.seed(&doctor, AppointmentStatus::InQueue, 2).await;
    fixture.seed(&doctor, AppointmentStatus::Done, 3).await;

    let (eta, queued) = predict_eta_for_registration(fixture.store.as_ref(), &doctor, today(), at(10, 0)).await;

    assert_eq!(queued, 2);
    // Three consults of ten minutes from 18:00.
    assert_eq!(eta, Some(time(18, 30)));
}

#[tokio::test]
async fn test_prediction_for_another_day_counts_registered_only() {
    let fixture = QueueFixture::new().await;
    let doctor = fixture.doctor.clone();
    fixture.seed(&doctor, AppointmentStatus::InQueue, 1).await;

    let tomorrow = today().succ_opt().unwrap();
    let (eta, queued) = predict_eta_for_registration(fixture.store.as_ref(), &doctor, tomorrow, at(10, 0)).await;

    assert_eq!(queued, 0);
    assert_eq!(eta, Some(time(18, 10)));
}

#[tokio::test]
async fn test_prediction_after_start_time_counts_from_now() {
    let fixture = QueueFixture::new().await;
    let doctor = fixture.doctor.clone();
    fixture.seed(&doctor, AppointmentStatus::InQueue, 1).await;

    let (eta, _) = predict_eta_for_registration(fixture.store.as_ref(), &doctor, today(), at(19, 2)).await;

    // 19:02 + 20 minutes rounds to 19:20.
    assert_eq!(eta, Some(time(19, 20)));
}

#[tokio::test]
async fn test_prediction_degrades_when_store_fails() {
    let fixture = QueueFixture::new().await;

    let mut store = MockStore::new();
    store
        .expect_count_appointments()
        .times(1)
        .returning(|_, _| Err(QueueError::StoreError("connection reset".to_string())));

    let prediction = predict_eta_for_registration(&store, &fixture.doctor, today(), at(10, 0)).await;

    assert_eq!(prediction, (None, 0));
}

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::services::eta::calculate_eta_time;
use crate::{AppointmentStatus, AppointmentStore, Doctor, QueueError, QueuePosition, QueueScope, RegistrationPosition};

// Positions are read-count-then-write with no isolation: two concurrent
// callers in the same scope can be handed the same position.

/// Next position for a patient moving into the queue: everyone already in
/// the queue or seen, plus one.
pub async fn next_queue_position<S>(store: &S, scope: &QueueScope) -> Result<QueuePosition, QueueError>
where
    S: AppointmentStore + ?Sized,
{
    let in_queue_count = store
        .count_appointments(scope, &[AppointmentStatus::InQueue])
        .await?;
    let completed_count = store
        .count_appointments(scope, &[AppointmentStatus::Done])
        .await?;

    let position = QueuePosition {
        next_pos: in_queue_count + completed_count + 1,
        completed_count,
    };
    debug!(
        in_queue_count,
        completed_count,
        next_pos = position.next_pos,
        "Computed next queue position"
    );
    Ok(position)
}

/// Position handed out at registration: every appointment in scope, plus one.
pub async fn registration_queue_position<S>(
    store: &S,
    scope: &QueueScope,
) -> Result<RegistrationPosition, QueueError>
where
    S: AppointmentStore + ?Sized,
{
    let total_count = store.count_appointments(scope, &[]).await?;
    Ok(RegistrationPosition {
        next_pos: total_count + 1,
        total_count,
    })
}

/// ETA and waiting count for a patient about to register.
///
/// Today both registered and queued patients are waiting; on later dates
/// only registered ones are. Store failures degrade to `(None, 0)`.
pub async fn predict_eta_for_registration<S>(
    store: &S,
    doctor: &Doctor,
    appointment_on: NaiveDate,
    now: NaiveDateTime,
) -> (Option<NaiveTime>, u32)
where
    S: AppointmentStore + ?Sized,
{
    let statuses: &[AppointmentStatus] = if appointment_on == now.date() {
        &[AppointmentStatus::Registered, AppointmentStatus::InQueue]
    } else {
        &[AppointmentStatus::Registered]
    };

    let scope = QueueScope {
        hospital_id: doctor.hospital_id,
        doctor_id: doctor.id,
        appointment_on,
    };

    match store.count_appointments(&scope, statuses).await {
        Ok(queued) => {
            let eta = calculate_eta_time(
                Some(doctor.consult_start_time.into()),
                i64::from(doctor.average_consult_minutes),
                i64::from(queued) + 1,
                appointment_on,
                now,
            );
            (eta, queued)
        }
        Err(e) => {
            warn!("ETA prediction failed for doctor {}: {}", doctor.id, e);
            (None, 0)
        }
    }
}

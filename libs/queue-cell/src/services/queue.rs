use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::services::eta::{calculate_eta_time, format_eta, format_eta_window, parse_date_flexible};
use crate::{
    audit_action_for, enters_queue, next_queue_position, predict_eta_for_registration,
    registration_queue_position, validate_status_transition, Appointment, AppointmentFilter,
    AppointmentStatus, AppointmentStore, AuditLogEntry, Clock, DashboardQuery, DashboardRow, Doctor,
    EtaPrediction, EtaPreview, Hospital, NotificationStatus, QueueDisplay, QueueDisplayEntry, QueueError,
    QueueNotifier, QueueScope, RegisterAppointmentRequest, RescheduleOutcome, RescheduleRequest,
    RescheduleSummary, StatusUpdate, TemplateMessage, RESCHEDULE_TEMPLATE,
};

const MOBILE_PATTERN: &str = r"^\d{10}$";
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LENGTH: usize = 4;
const MAX_RESCHEDULE_DELAY_MINUTES: i64 = 12 * 60;

/// Receipt token, e.g. `7KQ2`.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LENGTH)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

pub fn validate_mobile_number(mobile: &str) -> Result<(), QueueError> {
    let pattern = Regex::new(MOBILE_PATTERN).map_err(|e| QueueError::ValidationError(e.to_string()))?;
    if !pattern.is_match(mobile) {
        return Err(QueueError::ValidationError(
            "Mobile number must be exactly 10 digits".to_string(),
        ));
    }
    Ok(())
}

/// Who is looking at the dashboard. Doctors only ever see their own patients.
#[derive(Debug, Clone, Copy)]
pub struct DashboardViewer {
    pub hospital_id: Uuid,
    pub doctor_id: Option<Uuid>,
}

/// Front-desk and doctor operations on a hospital's daily queues.
pub struct QueueService {
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn QueueNotifier>>,
}

impl QueueService {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn QueueNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    async fn doctor(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<Doctor, QueueError> {
        self.store
            .get_doctor(hospital_id, doctor_id)
            .await?
            .ok_or(QueueError::DoctorNotFound(doctor_id))
    }

    async fn appointment(&self, hospital_id: Uuid, appointment_id: Uuid) -> Result<Appointment, QueueError> {
        self.store
            .get_appointment(hospital_id, appointment_id)
            .await?
            .ok_or(QueueError::AppointmentNotFound(appointment_id))
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id))]
    pub async fn register_appointment(
        &self,
        hospital_id: Uuid,
        request: RegisterAppointmentRequest,
    ) -> Result<Appointment, QueueError> {
        validate_mobile_number(&request.mobile_num)?;
        let patient_name = request.patient_name.trim();
        if patient_name.is_empty() {
            return Err(QueueError::ValidationError("Patient name is required".to_string()));
        }

        let doctor = self.doctor(hospital_id, request.doctor_id).await?;
        if !doctor.is_active {
            return Err(QueueError::ValidationError(format!(
                "Dr. {} is not accepting appointments",
                doctor.doctor_name
            )));
        }

        let now = self.clock.now();
        let appointment_on = request.appointment_on.unwrap_or_else(|| now.date());
        let scope = QueueScope {
            hospital_id,
            doctor_id: doctor.id,
            appointment_on,
        };

        let queue_position = match request.queue_position.filter(|p| *p > 0) {
            Some(position) => position,
            None => registration_queue_position(self.store.as_ref(), &scope).await?.next_pos,
        };

        let eta = calculate_eta_time(
            Some(doctor.consult_start_time.into()),
            i64::from(doctor.average_consult_minutes),
            i64::from(queue_position),
            appointment_on,
            now,
        );

        let appointment = Appointment {
            id: Uuid::new_v4(),
            hospital_id,
            doctor_id: doctor.id,
            patient_id: request.patient_id,
            patient_name: patient_name.to_string(),
            mobile_num: request.mobile_num,
            appointment_on,
            token_num: generate_token(),
            queue_position,
            eta,
            status: AppointmentStatus::Registered,
            called: false,
            queue_start_time: None,
            completed_at: None,
            created_at: now,
        };

        let saved = self.store.insert_appointment(&appointment).await?;
        info!(
            appointment_id = %saved.id,
            token = %saved.token_num,
            queue_position = saved.queue_position,
            eta = %format_eta(saved.eta),
            "Patient registered"
        );
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn preview_eta(
        &self,
        hospital_id: Uuid,
        doctor_id: Uuid,
        date: Option<&str>,
    ) -> Result<EtaPreview, QueueError> {
        let doctor = self.doctor(hospital_id, doctor_id).await?;
        let now = self.clock.now();
        let appointment_on = parse_date_flexible(date, now.date());

        let scope = QueueScope {
            hospital_id,
            doctor_id,
            appointment_on,
        };
        let position = next_queue_position(self.store.as_ref(), &scope).await?;

        let eta = calculate_eta_time(
            Some(doctor.consult_start_time.into()),
            i64::from(doctor.average_consult_minutes),
            position.position_ahead(),
            appointment_on,
            now,
        );

        Ok(EtaPreview {
            doctor_id,
            appointment_on,
            next_pos: position.next_pos,
            completed_count: position.completed_count,
            eta,
            eta_display: format_eta(eta),
        })
    }

    #[instrument(skip(self))]
    pub async fn predict_eta(
        &self,
        hospital_id: Uuid,
        doctor_id: Uuid,
        date: Option<&str>,
    ) -> Result<EtaPrediction, QueueError> {
        let doctor = self.doctor(hospital_id, doctor_id).await?;
        let now = self.clock.now();
        let appointment_on = parse_date_flexible(date, now.date());

        let (eta, queued) = predict_eta_for_registration(self.store.as_ref(), &doctor, appointment_on, now).await;

        Ok(EtaPrediction {
            doctor_id,
            appointment_on,
            queued,
            eta,
            eta_display: format_eta(eta),
        })
    }

    /// Moves an appointment to `new_status` and appends one audit row.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<StatusUpdate, QueueError> {
        let mut appointment = self.appointment(hospital_id, appointment_id).await?;
        let old_status = appointment.status;

        validate_status_transition(old_status, new_status)?;

        let now = self.clock.now();

        if enters_queue(old_status, new_status) {
            let doctor = self.doctor(hospital_id, appointment.doctor_id).await?;
            let position = next_queue_position(self.store.as_ref(), &appointment.scope()).await?;

            appointment.queue_position = position.next_pos;
            appointment.eta = calculate_eta_time(
                Some(doctor.consult_start_time.into()),
                i64::from(doctor.average_consult_minutes),
                position.position_ahead(),
                appointment.appointment_on,
                now,
            );
            if appointment.queue_start_time.is_none() {
                appointment.queue_start_time = Some(now);
            }
        }

        if old_status == AppointmentStatus::InQueue && new_status == AppointmentStatus::Done {
            appointment.completed_at = Some(now);
        }

        appointment.status = new_status;

        // Audit row first; a failed append leaves the stored row untouched.
        let action = audit_action_for(old_status, new_status);
        let audit = AuditLogEntry::record(&appointment, action, old_status, now);
        self.store.append_audit_entry(&audit).await?;
        self.store.update_appointment(&appointment).await?;

        info!(
            token = %appointment.token_num,
            action = action.as_str(),
            queue_position = appointment.queue_position,
            "Appointment moved {} -> {}", old_status, new_status
        );

        Ok(StatusUpdate { appointment, audit })
    }

    /// Flags the patient as called into the consulting room.
    #[instrument(skip(self))]
    pub async fn call_patient(&self, hospital_id: Uuid, appointment_id: Uuid) -> Result<Appointment, QueueError> {
        let appointment = self.store.mark_called(hospital_id, appointment_id).await?;

        info!(token = %appointment.token_num, "Patient called");
        Ok(appointment)
    }

    /// Today's appointments, waiting patients first.
    #[instrument(skip(self))]
    pub async fn dashboard(
        &self,
        viewer: DashboardViewer,
        query: &DashboardQuery,
    ) -> Result<Vec<DashboardRow>, QueueError> {
        let today = self.clock.now().date();

        let filter = match viewer.doctor_id {
            Some(doctor_id) => AppointmentFilter {
                hospital_id: viewer.hospital_id,
                appointment_on: Some(today),
                doctor_id: Some(doctor_id),
                ..Default::default()
            },
            None => {
                let status = query
                    .status
                    .map(|code| {
                        AppointmentStatus::from_code(code)
                            .ok_or_else(|| QueueError::ValidationError(format!("Unknown status code {}", code)))
                    })
                    .transpose()?;

                AppointmentFilter {
                    hospital_id: viewer.hospital_id,
                    appointment_on: Some(today),
                    doctor_id: query.doctor_id,
                    status,
                    patient_name: query
                        .patient
                        .as_deref()
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                }
            }
        };

        let mut appointments = self.store.list_appointments(&filter).await?;
        appointments.sort_by_key(|a| (a.status.display_rank(), a.queue_position));

        Ok(appointments
            .into_iter()
            .map(|appointment| DashboardRow {
                status_label: appointment.status.label().to_string(),
                eta_display: format_eta(appointment.eta),
                appointment,
            })
            .collect())
    }

    /// Public waiting-room board for a hospital slug.
    #[instrument(skip(self))]
    pub async fn display_for_slug(&self, slug: &str) -> Result<QueueDisplay, QueueError> {
        let hospital = self
            .store
            .find_hospital_by_slug(slug)
            .await?
            .ok_or_else(|| QueueError::HospitalNotFound(slug.to_string()))?;

        self.queue_display(hospital, true).await
    }

    /// Staff waiting-room board for the caller's own hospital.
    #[instrument(skip(self))]
    pub async fn display_for_hospital(&self, hospital_id: Uuid) -> Result<QueueDisplay, QueueError> {
        let hospital = self
            .store
            .get_hospital(hospital_id)
            .await?
            .ok_or_else(|| QueueError::HospitalNotFound(hospital_id.to_string()))?;

        self.queue_display(hospital, false).await
    }

    async fn queue_display(&self, hospital: Hospital, slug_mode: bool) -> Result<QueueDisplay, QueueError> {
        let filter = AppointmentFilter {
            hospital_id: hospital.id,
            appointment_on: Some(self.clock.now().date()),
            status: Some(AppointmentStatus::InQueue),
            ..Default::default()
        };
        let appointments = self.store.list_appointments(&filter).await?;

        let doctor_names: HashMap<Uuid, String> = self
            .store
            .list_doctors(hospital.id)
            .await?
            .into_iter()
            .map(|d| (d.id, d.doctor_name))
            .collect();

        let mut entries: Vec<QueueDisplayEntry> = appointments
            .into_iter()
            .map(|a| QueueDisplayEntry {
                appointment_id: a.id,
                doctor_name: doctor_names
                    .get(&a.doctor_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown doctor".to_string()),
                patient_name: a.patient_name,
                token_num: a.token_num,
                queue_position: a.queue_position,
                eta: a.eta,
                eta_window: format_eta_window(a.eta),
                called: a.called,
            })
            .collect();
        entries.sort_by(|a, b| {
            a.doctor_name
                .cmp(&b.doctor_name)
                .then(a.queue_position.cmp(&b.queue_position))
        });

        Ok(QueueDisplay {
            hospital_name: hospital.hospital_name,
            slug_mode,
            entries,
        })
    }

    /// Pushes back every queued patient of a doctor today by `delay_minutes`
    /// and tells each of them over WhatsApp. One failed message does not
    /// stop the others.
    #[instrument(skip(self))]
    pub async fn reschedule(
        &self,
        hospital_id: Uuid,
        request: &RescheduleRequest,
    ) -> Result<RescheduleSummary, QueueError> {
        let delay = request.delay_minutes;
        if delay == 0 || delay.abs() > MAX_RESCHEDULE_DELAY_MINUTES {
            return Err(QueueError::ValidationError(format!(
                "Delay must be a non-zero number of minutes within ±{}",
                MAX_RESCHEDULE_DELAY_MINUTES
            )));
        }

        let doctor = self.doctor(hospital_id, request.doctor_id).await?;

        let filter = AppointmentFilter {
            hospital_id,
            appointment_on: Some(self.clock.now().date()),
            doctor_id: Some(doctor.id),
            status: Some(AppointmentStatus::InQueue),
            ..Default::default()
        };
        let mut queued = self.store.list_appointments(&filter).await?;
        queued.sort_by_key(|a| a.queue_position);

        let mut results = Vec::with_capacity(queued.len());

        for mut appointment in queued {
            // Only the ETA is written back; the status may change while messages go out.
            if let Some(eta) = appointment.eta {
                let (shifted, _) = eta.overflowing_add_signed(Duration::minutes(delay));
                appointment.eta = Some(shifted);
                self.store.set_eta(hospital_id, appointment.id, appointment.eta).await?;
            }

            let (status, error) = match &self.notifier {
                None => (NotificationStatus::Skipped, None),
                Some(notifier) => {
                    let message = TemplateMessage {
                        template_name: RESCHEDULE_TEMPLATE.to_string(),
                        recipient_number: appointment.mobile_num.clone(),
                        placeholders: vec![
                            appointment.patient_name.clone(),
                            doctor.doctor_name.clone(),
                            delay.to_string(),
                            appointment.token_num.clone(),
                            appointment
                                .eta
                                .map(|t| t.format("%H:%M").to_string())
                                .unwrap_or_else(|| "TBD".to_string()),
                        ],
                    };

                    match notifier.send_template(&message).await {
                        Ok(_) => (NotificationStatus::Sent, None),
                        Err(e) => {
                            warn!(token = %appointment.token_num, "Reschedule message failed: {}", e);
                            (NotificationStatus::Failed, Some(e.to_string()))
                        }
                    }
                }
            };

            results.push(RescheduleOutcome {
                appointment_id: appointment.id,
                patient_name: appointment.patient_name,
                token_num: appointment.token_num,
                new_eta: appointment.eta,
                status,
                error,
            });
        }

        let summary = RescheduleSummary::from_results(doctor.id, delay, results);
        info!(
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            "Rescheduled queue for Dr. {} by {} minutes", doctor.doctor_name, delay
        );
        Ok(summary)
    }

    #[instrument(skip(self))]
    pub async fn audit_history(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, QueueError> {
        self.appointment(hospital_id, appointment_id).await?;

        let mut entries = self.store.list_audit_entries(hospital_id, appointment_id).await?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}

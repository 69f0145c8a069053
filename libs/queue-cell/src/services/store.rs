use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{
    Appointment, AppointmentFilter, AppointmentStatus, AuditLogEntry, Doctor, Hospital, QueueError,
    QueueScope,
};

/// Relational store behind the queue. Every lookup is tenant scoped: a row
/// belonging to another hospital is reported as absent.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments in `scope` whose status is one of `statuses`; all
    /// statuses when the slice is empty.
    async fn count_appointments(
        &self,
        scope: &QueueScope,
        statuses: &[AppointmentStatus],
    ) -> Result<u32, QueueError>;

    async fn get_appointment(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, QueueError>;

    /// Fails with `Conflict` when the patient already has an appointment
    /// with the same doctor on the same date.
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, QueueError>;

    async fn update_appointment(&self, appointment: &Appointment) -> Result<(), QueueError>;

    /// Writes only the `eta` column.
    async fn set_eta(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
        eta: Option<NaiveTime>,
    ) -> Result<(), QueueError>;

    /// Writes only the `called` column and returns the row as stored.
    async fn mark_called(&self, hospital_id: Uuid, appointment_id: Uuid) -> Result<Appointment, QueueError>;

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, QueueError>;

    async fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), QueueError>;

    /// Oldest first.
    async fn list_audit_entries(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, QueueError>;

    async fn get_doctor(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<Option<Doctor>, QueueError>;

    /// Active doctors only.
    async fn list_doctors(&self, hospital_id: Uuid) -> Result<Vec<Doctor>, QueueError>;

    async fn get_hospital(&self, hospital_id: Uuid) -> Result<Option<Hospital>, QueueError>;

    async fn find_hospital_by_slug(&self, slug: &str) -> Result<Option<Hospital>, QueueError>;
}

#[derive(Default)]
struct InMemoryState {
    hospitals: HashMap<Uuid, Hospital>,
    doctors: HashMap<Uuid, Doctor>,
    appointments: Vec<Appointment>,
    audit_log: Vec<AuditLogEntry>,
}

/// Store kept entirely in process memory, for tests and local runs.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    state: RwLock<InMemoryState>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_hospital(&self, hospital: Hospital) {
        self.state.write().await.hospitals.insert(hospital.id, hospital);
    }

    pub async fn add_doctor(&self, doctor: Doctor) {
        self.state.write().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn audit_log_len(&self) -> usize {
        self.state.read().await.audit_log.len()
    }
}

fn matches_filter(appointment: &Appointment, filter: &AppointmentFilter) -> bool {
    appointment.hospital_id == filter.hospital_id
        && filter.appointment_on.map_or(true, |d| appointment.appointment_on == d)
        && filter.doctor_id.map_or(true, |id| appointment.doctor_id == id)
        && filter.status.map_or(true, |s| appointment.status == s)
        && filter.patient_name.as_deref().map_or(true, |needle| {
            appointment
                .patient_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        })
}

fn find_mut(
    appointments: &mut [Appointment],
    hospital_id: Uuid,
    appointment_id: Uuid,
) -> Result<&mut Appointment, QueueError> {
    appointments
        .iter_mut()
        .find(|a| a.id == appointment_id && a.hospital_id == hospital_id)
        .ok_or(QueueError::AppointmentNotFound(appointment_id))
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn count_appointments(
        &self,
        scope: &QueueScope,
        statuses: &[AppointmentStatus],
    ) -> Result<u32, QueueError> {
        let state = self.state.read().await;
        let count = state
            .appointments
            .iter()
            .filter(|a| a.scope() == *scope)
            .filter(|a| statuses.is_empty() || statuses.contains(&a.status))
            .count();

        debug!("Counted {} appointments in scope {:?} for {:?}", count, scope, statuses);
        u32::try_from(count).map_err(|_| QueueError::StoreError("appointment count overflow".to_string()))
    }

    async fn get_appointment(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .iter()
            .find(|a| a.id == appointment_id && a.hospital_id == hospital_id)
            .cloned())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, QueueError> {
        let mut state = self.state.write().await;

        let duplicate = state.appointments.iter().any(|a| {
            a.scope() == appointment.scope() && a.patient_id == appointment.patient_id
        });
        if duplicate {
            return Err(QueueError::Conflict(format!(
                "Patient {} already has an appointment with this doctor on {}",
                appointment.patient_id, appointment.appointment_on
            )));
        }

        state.appointments.push(appointment.clone());
        Ok(appointment.clone())
    }

    async fn update_appointment(&self, appointment: &Appointment) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        let slot = find_mut(&mut state.appointments, appointment.hospital_id, appointment.id)?;
        *slot = appointment.clone();
        Ok(())
    }

    async fn set_eta(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
        eta: Option<NaiveTime>,
    ) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        let slot = find_mut(&mut state.appointments, hospital_id, appointment_id)?;
        slot.eta = eta;
        Ok(())
    }

    async fn mark_called(&self, hospital_id: Uuid, appointment_id: Uuid) -> Result<Appointment, QueueError> {
        let mut state = self.state.write().await;
        let slot = find_mut(&mut state.appointments, hospital_id, appointment_id)?;
        slot.called = true;
        Ok(slot.clone())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .iter()
            .filter(|a| matches_filter(a, filter))
            .cloned()
            .collect())
    }

    async fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), QueueError> {
        self.state.write().await.audit_log.push(entry.clone());
        Ok(())
    }

    async fn list_audit_entries(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .audit_log
            .iter()
            .filter(|e| e.hospital_id == hospital_id && e.appointment_id == appointment_id)
            .cloned()
            .collect())
    }

    async fn get_doctor(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<Option<Doctor>, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .doctors
            .get(&doctor_id)
            .filter(|d| d.hospital_id == hospital_id)
            .cloned())
    }

    async fn list_doctors(&self, hospital_id: Uuid) -> Result<Vec<Doctor>, QueueError> {
        let state = self.state.read().await;
        let mut doctors: Vec<Doctor> = state
            .doctors
            .values()
            .filter(|d| d.hospital_id == hospital_id && d.is_active)
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.doctor_name.cmp(&b.doctor_name));
        Ok(doctors)
    }

    async fn get_hospital(&self, hospital_id: Uuid) -> Result<Option<Hospital>, QueueError> {
        Ok(self.state.read().await.hospitals.get(&hospital_id).cloned())
    }

    async fn find_hospital_by_slug(&self, slug: &str) -> Result<Option<Hospital>, QueueError> {
        let state = self.state.read().await;
        Ok(state.hospitals.values().find(|h| h.slug == slug).cloned())
    }
}

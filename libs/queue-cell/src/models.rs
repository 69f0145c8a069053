use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::services::eta::default_start_time;

// ==============================================================================
// STATUS
// ==============================================================================

/// Appointment status, stored and sent on the wire as its integer code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "i16", into = "i16")]
pub enum AppointmentStatus {
    Registered,
    InQueue,
    Done,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Registered,
        AppointmentStatus::InQueue,
        AppointmentStatus::Done,
        AppointmentStatus::Cancelled,
    ];

    pub fn code(self) -> i16 {
        match self {
            AppointmentStatus::Registered => -1,
            AppointmentStatus::InQueue => 0,
            AppointmentStatus::Done => 1,
            AppointmentStatus::Cancelled => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            -1 => Some(AppointmentStatus::Registered),
            0 => Some(AppointmentStatus::InQueue),
            1 => Some(AppointmentStatus::Done),
            2 => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Registered => "Registered",
            AppointmentStatus::InQueue => "In Queue",
            AppointmentStatus::Done => "Done",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    /// Row order on the dashboard: waiting patients first, closed ones last.
    pub fn display_rank(self) -> u8 {
        match self {
            AppointmentStatus::Registered => 1,
            AppointmentStatus::InQueue => 2,
            AppointmentStatus::Done => 3,
            AppointmentStatus::Cancelled => 4,
        }
    }
}

impl TryFrom<i16> for AppointmentStatus {
    type Error = String;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        AppointmentStatus::from_code(code).ok_or_else(|| format!("unknown appointment status code {}", code))
    }
}

impl From<AppointmentStatus> for i16 {
    fn from(status: AppointmentStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ==============================================================================
// ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hospital {
    pub id: Uuid,
    pub hospital_name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_name: String,
    #[serde(default = "default_start_time")]
    pub consult_start_time: NaiveTime,
    pub average_consult_minutes: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub mobile_num: String,
    pub appointment_on: NaiveDate,
    pub token_num: String,
    pub queue_position: u32,
    pub eta: Option<NaiveTime>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub called: bool,
    pub queue_start_time: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Appointment {
    pub fn scope(&self) -> QueueScope {
        QueueScope {
            hospital_id: self.hospital_id,
            doctor_id: self.doctor_id,
            appointment_on: self.appointment_on,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Queued,
    Completed,
    Cancelled,
    StatusChanged,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Queued => "queued",
            AuditAction::Completed => "completed",
            AuditAction::Cancelled => "cancelled",
            AuditAction::StatusChanged => "status_changed",
        }
    }
}

/// Append-only record of a status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub action: AuditAction,
    pub from_status: AppointmentStatus,
    pub to_status: AppointmentStatus,
    pub token_num: String,
    pub queue_position: u32,
    pub eta: Option<NaiveTime>,
    pub completion_time: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl AuditLogEntry {
    /// Snapshot of `appointment` after the transition was applied.
    pub fn record(
        appointment: &Appointment,
        action: AuditAction,
        from_status: AppointmentStatus,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            hospital_id: appointment.hospital_id,
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            action,
            from_status,
            to_status: appointment.status,
            token_num: appointment.token_num.clone(),
            queue_position: appointment.queue_position,
            eta: appointment.eta,
            completion_time: match action {
                AuditAction::Completed => appointment.completed_at,
                _ => None,
            },
            created_at: now,
        }
    }
}

// ==============================================================================
// QUEUE ARITHMETIC
// ==============================================================================

/// A doctor's queue on one date in one hospital.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct QueueScope {
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_on: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuePosition {
    pub next_pos: u32,
    pub completed_count: u32,
}

impl QueuePosition {
    /// Patients still ahead once the completed ones are discounted.
    pub fn position_ahead(&self) -> i64 {
        i64::from(self.next_pos) - i64::from(self.completed_count)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationPosition {
    pub next_pos: u32,
    pub total_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub hospital_id: Uuid,
    pub appointment_on: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Case-insensitive substring of the patient name.
    pub patient_name: Option<String>,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub mobile_num: String,
    pub appointment_on: Option<NaiveDate>,
    pub queue_position: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtaQuery {
    pub doctor_id: Uuid,
    /// `YYYY-MM-DD` or `DD-MM-YYYY`; today when absent.
    pub date: Option<String>,
}

/// Dashboard filters. Form submissions send empty fields (`status=`) for "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub doctor_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<i16>,
    pub patient: Option<String>,
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) if !text.trim().is_empty() => text.trim().parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub doctor_id: Uuid,
    pub delay_minutes: i64,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub appointment: Appointment,
    pub audit: AuditLogEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtaPreview {
    pub doctor_id: Uuid,
    pub appointment_on: NaiveDate,
    pub next_pos: u32,
    pub completed_count: u32,
    pub eta: Option<NaiveTime>,
    pub eta_display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtaPrediction {
    pub doctor_id: Uuid,
    pub appointment_on: NaiveDate,
    pub queued: u32,
    pub eta: Option<NaiveTime>,
    pub eta_display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardRow {
    pub appointment: Appointment,
    pub status_label: String,
    pub eta_display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDisplayEntry {
    pub appointment_id: Uuid,
    pub doctor_name: String,
    pub patient_name: String,
    pub token_num: String,
    pub queue_position: u32,
    pub eta: Option<NaiveTime>,
    pub eta_window: String,
    pub called: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDisplay {
    pub hospital_name: String,
    pub slug_mode: bool,
    pub entries: Vec<QueueDisplayEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleOutcome {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub token_num: String,
    pub new_eta: Option<NaiveTime>,
    pub status: NotificationStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleSummary {
    pub doctor_id: Uuid,
    pub delay_minutes: i64,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<RescheduleOutcome>,
}

impl RescheduleSummary {
    pub fn from_results(doctor_id: Uuid, delay_minutes: i64, results: Vec<RescheduleOutcome>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            doctor_id,
            delay_minutes,
            sent: count(NotificationStatus::Sent),
            failed: count(NotificationStatus::Failed),
            skipped: count(NotificationStatus::Skipped),
            results,
        }
    }
}

use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::AppointmentStatus;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid status transition from {from} to {to}: {reason}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
        reason: &'static str,
    },

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Hospital not found: {0}")]
    HospitalNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Notification failed: {0}")]
    NotificationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidStatusTransition { .. } | QueueError::ValidationError(_) => {
                AppError::BadRequest(err.to_string())
            }
            QueueError::AppointmentNotFound(_)
            | QueueError::DoctorNotFound(_)
            | QueueError::HospitalNotFound(_) => AppError::NotFound(err.to_string()),
            QueueError::Conflict(msg) => AppError::Conflict(msg),
            QueueError::StoreError(msg) => AppError::Database(msg),
            QueueError::NotificationError(msg) => AppError::ExternalService(msg),
            QueueError::SerializationError(e) => AppError::Internal(e.to_string()),
        }
    }
}

use tracing::{debug, warn};

use crate::{AppointmentStatus, AuditAction, QueueError};

/// Checks a status change requested from the queue board.
///
/// Only two moves are blocked: skipping the queue (Registered -> Done) and
/// cancelling a finished consult (Done -> Cancelled).
pub fn validate_status_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), QueueError> {
    use AppointmentStatus::*;

    let reason = match (from, to) {
        (Registered, Done) => Some("the patient must be moved to the queue before being marked done"),
        (Done, Cancelled) => Some("a completed appointment cannot be cancelled"),
        _ => None,
    };

    if let Some(reason) = reason {
        warn!("Rejected status transition {} -> {}: {}", from, to, reason);
        return Err(QueueError::InvalidStatusTransition { from, to, reason });
    }

    debug!("Status transition validated: {} -> {}", from, to);
    Ok(())
}

/// Audit action recorded for an accepted transition.
pub fn audit_action_for(from: AppointmentStatus, to: AppointmentStatus) -> AuditAction {
    use AppointmentStatus::*;

    match (from, to) {
        (_, Cancelled) => AuditAction::Cancelled,
        (InQueue, Done) => AuditAction::Completed,
        (from, InQueue) if from != InQueue => AuditAction::Queued,
        _ => AuditAction::StatusChanged,
    }
}

/// Whether the transition puts the patient at the back of the queue, which
/// reassigns their position and ETA.
pub fn enters_queue(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    to == AppointmentStatus::InQueue && from != AppointmentStatus::InQueue
}
